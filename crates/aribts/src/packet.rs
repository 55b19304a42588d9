//! MPEG2-TSのパケット。

use std::fmt;
use std::io::{self, Read};

use crate::pid::Pid;
use crate::sync::Synchronizer;

/// 同期バイト。
pub const SYNC_BYTE: u8 = 0x47;
/// TSパケットの大きさ。
pub const PACKET_SIZE: usize = 188;

/// MPEG2-TSのパケット。
///
/// 同期バイトの検査は[`Synchronizer`]による再同期時のみ行われ、
/// パケット単体では検査しない。
#[derive(Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Packet(pub [u8; PACKET_SIZE]);

impl Packet {
    /// 188バイトの配列を`Packet`として参照する。
    #[inline]
    pub fn from_bytes(bytes: &[u8; PACKET_SIZE]) -> &Packet {
        // Safety: `Packet`は`repr(transparent)`で`[u8; PACKET_SIZE]`と互換
        unsafe { &*(bytes as *const [u8; PACKET_SIZE] as *const Packet) }
    }

    /// `r`から同期を取りつつTSパケットを順次読み込むイテレーターを生成する。
    ///
    /// # サンプル
    ///
    /// ```
    /// # fn main() -> std::io::Result<()> {
    /// # let file = &mut (&[] as &[u8]);
    /// for packet in aribts::Packet::iter(file) {
    ///     let packet = packet?;
    ///     println!("{:?}", packet.pid());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    #[inline]
    #[must_use]
    pub fn iter<R: Read>(r: R) -> PacketIter<R> {
        PacketIter {
            sync: Synchronizer::new(r),
        }
    }

    /// パケットの生のバイト列を返す。
    #[inline]
    pub fn as_bytes(&self) -> &[u8; PACKET_SIZE] {
        &self.0
    }

    /// 同期バイトを返す。
    #[inline]
    pub fn sync_byte(&self) -> u8 {
        self.0[0]
    }

    /// トランスポートエラーインジケーターを返す。
    #[inline]
    pub fn error_indicator(&self) -> bool {
        self.0[1] & 0b10000000 != 0
    }

    /// ペイロードユニット開始インジケーターを返す。
    #[inline]
    pub fn unit_start_indicator(&self) -> bool {
        self.0[1] & 0b01000000 != 0
    }

    /// トランスポート優先度を返す。
    #[inline]
    pub fn priority(&self) -> bool {
        self.0[1] & 0b00100000 != 0
    }

    /// PIDを返す。
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid::read(&self.0[1..])
    }

    /// トランスポートスクランブル制御（2ビット）を返す。
    #[inline]
    pub fn scrambling_control(&self) -> u8 {
        (self.0[3] & 0b11000000) >> 6
    }

    /// パケットがスクランブル処理されているかを返す。
    ///
    /// 未定義値`0b01`もスクランブルとして扱う。
    #[inline]
    pub fn is_scrambled(&self) -> bool {
        self.scrambling_control() != 0
    }

    /// アダプテーションフィールド制御（2ビット）を返す。
    #[inline]
    pub fn adaptation_field_control(&self) -> u8 {
        (self.0[3] & 0b00110000) >> 4
    }

    /// 連続性指標（4ビット）を返す。
    #[inline]
    pub fn continuity_counter(&self) -> u8 {
        self.0[3] & 0b00001111
    }

    /// パケットがアダプテーションフィールドを含むかどうかを返す。
    #[inline]
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control() & 0b10 != 0
    }

    /// パケットがペイロードを含むかどうかを返す。
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control() & 0b01 != 0
    }

    /// アダプテーションフィールドがある場合、adaptation_field_lengthを返す。
    #[inline]
    pub fn adaptation_field_length(&self) -> Option<u8> {
        self.has_adaptation_field().then(|| self.0[4])
    }

    /// アダプテーションフィールドを返す。
    ///
    /// 長さがパケットに収まらない場合は`None`を返す。
    pub fn adaptation_field(&self) -> Option<AdaptationField> {
        let length = self.adaptation_field_length()?;
        let max = if self.has_payload() { 182 } else { 183 };
        if length == 0 || length > max {
            return None;
        }
        Some(AdaptationField(&self.0[5..5 + length as usize]))
    }

    /// ペイロードを返す。
    ///
    /// ペイロードがない場合や、アダプテーションフィールド長が異常な場合は`None`を返す。
    pub fn payload(&self) -> Option<&[u8]> {
        if !self.has_payload() {
            return None;
        }

        match self.adaptation_field_length() {
            Some(afl) if afl > 182 => None,
            Some(afl) => Some(&self.0[5 + afl as usize..]),
            None => Some(&self.0[4..]),
        }
    }

    /// 前回の連続性指標である`last_cc`を元にパケット順の正当性を確認する。
    ///
    /// `last_cc`の初期値は`0x10`以上とする。
    pub fn validate_cc(&self, last_cc: &mut u8) -> bool {
        let cc = if self.has_payload() {
            self.continuity_counter()
        } else {
            0x10
        };
        let is_discontinuity = self
            .adaptation_field()
            .map_or(false, |af| af.discontinuity_indicator());
        let cc_ok = self.pid() == Pid::NULL
            || is_discontinuity
            || cc >= 0x10
            || *last_cc >= 0x10
            || (*last_cc + 1) & 0x0F == cc;
        *last_cc = cc;

        cc_ok
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Packet")
            .field("error_indicator", &self.error_indicator())
            .field("unit_start_indicator", &self.unit_start_indicator())
            .field("pid", &self.pid())
            .field("scrambling_control", &self.scrambling_control())
            .field("adaptation_field_control", &self.adaptation_field_control())
            .field("continuity_counter", &self.continuity_counter())
            .finish_non_exhaustive()
    }
}

/// TSパケット内のアダプテーションフィールド。
///
/// 長さ1以上であることが生成時に保証される。
#[derive(Debug)]
pub struct AdaptationField<'a>(&'a [u8]);

impl<'a> AdaptationField<'a> {
    /// 不連続性インジケーターを返す。
    #[inline]
    pub fn discontinuity_indicator(&self) -> bool {
        self.0[0] & 0b10000000 != 0
    }

    /// ランダムアクセスインジケーターを返す。
    #[inline]
    pub fn random_access_indicator(&self) -> bool {
        self.0[0] & 0b01000000 != 0
    }

    /// PCRフラグを返す。
    #[inline]
    pub fn pcr_flag(&self) -> bool {
        self.0[0] & 0b00010000 != 0
    }

    /// 27MHz単位のPCRを返す。
    pub fn pcr(&self) -> Option<u64> {
        if !self.pcr_flag() {
            return None;
        }

        let b = self.0.get(1..7)?;
        let base = (b[0] as u64) << 25
            | (b[1] as u64) << 17
            | (b[2] as u64) << 9
            | (b[3] as u64) << 1
            | (b[4] as u64) >> 7;
        let ext = ((b[4] & 0x01) as u64) << 8 | b[5] as u64;
        Some(base * 300 + ext)
    }
}

/// [`Packet::iter`]から返される。TSパケットを順次読み込むイテレーター。
#[derive(Debug)]
pub struct PacketIter<R> {
    sync: Synchronizer<R>,
}

impl<R: Read> Iterator for PacketIter<R> {
    type Item = io::Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.sync.advance() {
            Ok(true) => self.sync.packet().cloned().map(Ok),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // https://youzaka.hatenablog.com/entry/2011/11/09/001615
    pub const PACKET_EIT: Packet = Packet(hex_literal::hex!(
        "
47 40 12 18 00 4F F0 CC 01 26 FF 01 01 43 11 00
04 01 4F 44 4D DA 15 17 25 00 00 05 00 10 B1 4D
78 6A 70 6E 10 AA A6 C1 CE 3F 40 4D 4D 1B 24 2A
3B 1B 7D FA D6 63 30 61 42 58 A8 CE 35 28 40 61
21 22 32 46 49 7E F2 3C 7D 47 3C B9 EB 41 30 CB
E4 EB B3 C8 C8 CF 1B 7E BF 1B 7D E4 E9 BA CB 3C
7D 47 3C B9 EB C8 33 32 43 6E AC 49 7E F2 39 53
E9 B7 C6 B7 DE A6 B3 C8 E2 21 26 21 26 21 26 40
35 B7 A4 32 46 49 7E 3C 7D 47 3C 4A 7D 4B 21 F2
3E 52 32 70 B7 DE B9 21 23 50 06 F1 03 00 6A 70
6E 54 06 22 FF 2F FF 84 FF C1 02 A4 01 C4 11 F2
03 10 0F FF 6F 6A 70 6E 25 39 25 46
"
    ));

    const PACKET_PCR: Packet = Packet(hex_literal::hex!(
        "
47 01 11 20 B7 10 D2 2D 74 82 80 F9 FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF FF
FF FF FF FF FF FF FF FF FF FF FF FF
"
    ));

    /// テスト用に、ヘッダ4バイトとペイロードからパケットを組み立てる。
    ///
    /// ペイロードが184バイトに満たない場合は0xFFで埋める。
    pub fn make_packet(pid: u16, start: bool, cc: u8, payload: &[u8]) -> Packet {
        assert!(payload.len() <= PACKET_SIZE - 4);

        let mut packet = Packet([0xFF; PACKET_SIZE]);
        packet.0[0] = SYNC_BYTE;
        packet.0[1] = (if start { 0x40 } else { 0x00 }) | (pid >> 8) as u8;
        packet.0[2] = pid as u8;
        packet.0[3] = 0b0001_0000 | (cc & 0x0F);
        packet.0[4..4 + payload.len()].copy_from_slice(payload);
        packet
    }

    #[test]
    fn test_packet_accessor() {
        let p = &PACKET_EIT;
        assert_eq!(p.sync_byte(), SYNC_BYTE);
        assert!(!p.error_indicator());
        assert!(p.unit_start_indicator());
        assert!(!p.priority());
        assert_eq!(p.pid(), Pid::EIT);
        assert_eq!(p.scrambling_control(), 0b00);
        assert!(!p.is_scrambled());
        assert_eq!(p.adaptation_field_control(), 0b01);
        assert_eq!(p.continuity_counter(), 8);
        assert_eq!(p.adaptation_field_length(), None);
        assert_matches!(p.adaptation_field(), None);
        assert_eq!(p.payload(), Some(&p.0[4..]));

        let p = &PACKET_PCR;
        assert!(!p.unit_start_indicator());
        assert_eq!(p.pid(), Pid::new(0x0111));
        assert_eq!(p.adaptation_field_control(), 0b10);
        assert_eq!(p.adaptation_field_length(), Some(183));
        let af = p.adaptation_field().unwrap();
        assert!(!af.discontinuity_indicator());
        assert!(!af.random_access_indicator());
        assert_eq!(af.pcr(), Some(7052388613 * 300 + 249));
        assert_eq!(p.payload(), None);
    }

    #[test]
    fn test_packet_payload_bounds() {
        let mut p = make_packet(0x0100, false, 0, &[]);
        p.0[3] = 0b0011_0000;
        p.0[4] = 182;
        assert_eq!(p.payload().map(<[u8]>::len), Some(1));
        p.0[4] = 183;
        assert_eq!(p.payload(), None);
        assert_matches!(p.adaptation_field(), None);

        p.0[3] = 0b0000_0000;
        assert!(!p.has_payload());
        assert_eq!(p.payload(), None);
    }

    #[test]
    fn test_packet_validate_cc() {
        let mut last_cc = 0x10;
        assert!(make_packet(0x0100, true, 5, &[]).validate_cc(&mut last_cc));
        assert!(make_packet(0x0100, false, 6, &[]).validate_cc(&mut last_cc));
        assert!(!make_packet(0x0100, false, 8, &[]).validate_cc(&mut last_cc));
        assert!(make_packet(0x0100, false, 9, &[]).validate_cc(&mut last_cc));

        let mut last_cc = 15;
        assert!(make_packet(0x0100, false, 0, &[]).validate_cc(&mut last_cc));
    }

    #[test]
    fn test_packet_from_bytes() {
        let bytes = PACKET_EIT.0;
        assert_eq!(Packet::from_bytes(&bytes), &PACKET_EIT);
    }

    #[test]
    fn test_packet_iter() {
        let data = [PACKET_EIT.0, PACKET_PCR.0].concat();
        let mut iter = Packet::iter(&*data);
        assert_eq!(iter.next().unwrap().unwrap(), PACKET_EIT);
        assert_eq!(iter.next().unwrap().unwrap(), PACKET_PCR);
        assert_matches!(iter.next(), None);
    }
}
