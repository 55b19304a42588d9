//! MPEG2-TSのパケットを分離し、PSIセクションやPESパケットを再構成するためのモジュール。

use std::collections::VecDeque;

use fxhash::FxHashMap;
use thiserror::Error;

use crate::packet::Packet;
use crate::pid::{Pid, PidTable};
use crate::psi::{Section, SectionError};
use crate::utils::BytesExt;

// バッファサイズはLibISDBから
const PSI_CAPACITY: usize = 4096 + 184;
const PES_CAPACITY: usize = 0x10005;

/// PESパケットの開始コード。
const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// [`Demuxer`]の設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// セクションシンタクスを持つPSIセクションのCRC32を検証するかどうか。
    pub verify_crc: bool,
    /// 連続性指標の不連続を検出するかどうか。
    pub check_continuity: bool,
}

impl Options {
    /// 既定の設定。
    pub const DEFAULT: Options = Options {
        verify_crc: true,
        check_continuity: true,
    };
}

impl Default for Options {
    #[inline]
    fn default() -> Options {
        Options::DEFAULT
    }
}

/// 再構成された単位の種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// PSIセクション。
    Section,
    /// PESパケット。
    Pes,
}

/// 再構成されたPSIセクションまたはPESパケット。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// 単位を運んだパケットのPID。
    pub pid: Pid,
    /// 単位の種類。
    pub kind: UnitKind,
    /// 単位のバイト列。
    ///
    /// PSIセクションであれば`3 + section_length`バイト、
    /// PESパケットであれば`PES_packet_length`が0でない限り`6 + PES_packet_length`バイトとなる。
    pub data: Box<[u8]>,
}

impl Unit {
    /// PSIセクションであれば[`Section`]として返す。
    pub fn section(&self) -> Option<Section> {
        match self.kind {
            UnitKind::Section => Section::parse(&self.data, false).ok(),
            UnitKind::Pes => None,
        }
    }
}

/// 分離中に発生するエラー。
///
/// いずれも単位ごとのエラーであり、分離は継続される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DemuxError {
    /// pointer_fieldがペイロードの範囲外を指している。
    #[error("pointer field {pointer} exceeds payload of {available} bytes")]
    InvalidPointer {
        /// pointer_fieldの値。
        pointer: u8,
        /// pointer_fieldの後に続くバイト数。
        available: usize,
    },

    /// パケットがスクランブルされている。
    #[error("scrambled packet")]
    Scrambled,

    /// トランスポートエラーインジケーターが立っている。
    #[error("transport error indicator set")]
    TransportError,

    /// 連続性指標が不連続で、再構成中の単位が破棄された。
    #[error("continuity counter discontinuity")]
    Discontinuity,

    /// PESパケットがPES_packet_lengthに満たない。
    #[error("PES packet is truncated ({actual} of {expected} bytes)")]
    PesLength {
        /// PES_packet_lengthから求めた長さ。
        expected: usize,
        /// 実際に蓄積された長さ。
        actual: usize,
    },

    /// PSIセクションが不正。
    #[error(transparent)]
    Section(#[from] SectionError),
}

/// [`Demuxer`]から取り出される結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 再構成が完了した単位。
    Unit(Unit),
    /// 分離中に発生したエラー。
    Error {
        /// エラーが発生したPID。
        pid: Pid,
        /// エラー内容。
        error: DemuxError,
    },
}

/// TSパケットをPIDごとに分離し、PSIセクションやPESパケットに再構成する。
///
/// 単位はその長さが次の開始パケットか[`flush`][Demuxer::flush]によって確定した時点で取り出せるようになる。
///
/// # サンプル
///
/// ```
/// use aribts::demux::{Demuxer, Event};
/// use aribts::Pid;
///
/// let mut demuxer = Demuxer::new();
/// demuxer.track(Pid::PAT);
/// # let packets: Vec<aribts::Packet> = Vec::new();
/// for packet in &packets {
///     demuxer.feed(packet);
///     while let Some(event) = demuxer.next_event() {
///         if let Event::Unit(unit) = event {
///             println!("{:?}: {} bytes", unit.pid, unit.data.len());
///         }
///     }
/// }
/// ```
pub struct Demuxer {
    options: Options,
    tracked: PidTable<bool>,
    buffers: FxHashMap<Pid, Buffer>,
    events: VecDeque<Event>,
}

impl Demuxer {
    /// 何も追跡しない`Demuxer`を既定の設定で生成する。
    #[inline]
    pub fn new() -> Demuxer {
        Demuxer::with_options(Options::DEFAULT)
    }

    /// 何も追跡しない`Demuxer`を`options`で生成する。
    pub fn with_options(options: Options) -> Demuxer {
        Demuxer {
            options,
            tracked: PidTable::from_fn(|_| false),
            buffers: FxHashMap::default(),
            events: VecDeque::new(),
        }
    }

    /// 設定を返す。
    #[inline]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// `pid`を追跡対象にする。
    #[inline]
    pub fn track(&mut self, pid: Pid) {
        self.tracked[pid] = true;
    }

    /// ヌルパケットを除く全てのPIDを追跡対象にする。
    pub fn track_all(&mut self) {
        self.tracked = PidTable::from_fn(|pid| pid != Pid::NULL);
    }

    /// `pid`を追跡対象から外し、再構成中の単位を破棄する。
    pub fn untrack(&mut self, pid: Pid) {
        self.tracked[pid] = false;
        self.buffers.remove(&pid);
    }

    /// `pid`が追跡対象かどうかを返す。
    #[inline]
    pub fn is_tracked(&self, pid: Pid) -> bool {
        self.tracked[pid]
    }

    /// パケットを1つ処理する。
    pub fn feed(&mut self, packet: &Packet) {
        let pid = packet.pid();
        if !self.tracked[pid] {
            return;
        }

        if packet.error_indicator() {
            self.push_error(pid, DemuxError::TransportError);
            return;
        }
        if packet.is_scrambled() {
            self.push_error(pid, DemuxError::Scrambled);
            return;
        }
        let Some(payload) = packet.payload().filter(|p| !p.is_empty()) else {
            return;
        };

        let mut out = Output {
            pid,
            options: &self.options,
            events: &mut self.events,
        };
        let buffer = self.buffers.entry(pid).or_insert_with(Buffer::new);

        if out.options.check_continuity && !packet.validate_cc(&mut buffer.last_cc) {
            buffer.discard();
            out.error(DemuxError::Discontinuity);
        }

        if !packet.unit_start_indicator() {
            if buffer.accumulating {
                buffer.extend(pid, payload);
            }
            return;
        }

        if payload.starts_with(&PES_START_CODE) {
            buffer.finalize(&mut out);
            buffer.begin(pid, Mode::Pes, payload);
            return;
        }

        let pointer = payload[0];
        let available = payload.len() - 1;
        if pointer as usize > available {
            buffer.discard();
            out.error(DemuxError::InvalidPointer { pointer, available });
            return;
        }

        let (prev, next) = payload[1..].split_at(pointer as usize);
        if buffer.accumulating && buffer.mode == Mode::Psi {
            buffer.extend(pid, prev);
        }
        buffer.finalize(&mut out);
        buffer.begin(pid, Mode::Psi, next);
    }

    /// 取り出せる結果があれば古い順に返す。
    #[inline]
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// 再構成中の全ての単位を確定させる。
    ///
    /// ストリームの終端で呼び出すことを想定している。
    pub fn flush(&mut self) {
        let mut pids: Vec<Pid> = self.buffers.keys().copied().collect();
        pids.sort_unstable();

        for pid in pids {
            let Some(buffer) = self.buffers.get_mut(&pid) else {
                continue;
            };
            buffer.finalize(&mut Output {
                pid,
                options: &self.options,
                events: &mut self.events,
            });
        }
    }

    fn push_error(&mut self, pid: Pid, error: DemuxError) {
        self.events.push_back(Event::Error { pid, error });
    }
}

impl Default for Demuxer {
    #[inline]
    fn default() -> Demuxer {
        Demuxer::new()
    }
}

impl std::fmt::Debug for Demuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Demuxer")
            .field("options", &self.options)
            .field("buffers", &self.buffers.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

/// 確定した結果の出力先。
struct Output<'a> {
    pid: Pid,
    options: &'a Options,
    events: &'a mut VecDeque<Event>,
}

impl Output<'_> {
    fn unit(&mut self, kind: UnitKind, data: &[u8]) {
        log::trace!("{:?} {:?} of {} bytes", self.pid, kind, data.len());
        self.events.push_back(Event::Unit(Unit {
            pid: self.pid,
            kind,
            data: data.into(),
        }));
    }

    fn error(&mut self, error: DemuxError) {
        self.events.push_back(Event::Error {
            pid: self.pid,
            error,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Psi,
    Pes,
}

impl Mode {
    #[inline]
    fn capacity(self) -> usize {
        match self {
            Mode::Psi => PSI_CAPACITY,
            Mode::Pes => PES_CAPACITY,
        }
    }
}

/// PIDごとの再構成用バッファ。
struct Buffer {
    mode: Mode,
    data: Vec<u8>,
    accumulating: bool,
    last_cc: u8,
}

impl Buffer {
    fn new() -> Buffer {
        Buffer {
            mode: Mode::Psi,
            data: Vec::new(),
            accumulating: false,
            last_cc: 0x10,
        }
    }

    fn begin(&mut self, pid: Pid, mode: Mode, data: &[u8]) {
        self.mode = mode;
        self.data.clear();
        self.accumulating = true;
        self.extend(pid, data);
    }

    fn discard(&mut self) {
        self.data.clear();
        self.accumulating = false;
    }

    fn extend(&mut self, pid: Pid, data: &[u8]) {
        // バッファに収まる形でdataを追記
        let remaining = self.mode.capacity().saturating_sub(self.data.len());
        let len = std::cmp::min(remaining, data.len());
        if len < data.len() {
            log::debug!("{:?}: buffer full, {} bytes dropped", pid, data.len() - len);
        }

        self.data.extend_from_slice(&data[..len]);
    }

    fn finalize(&mut self, out: &mut Output) {
        if !self.accumulating {
            return;
        }
        self.accumulating = false;

        match self.mode {
            Mode::Psi => split_sections(&self.data, out),
            Mode::Pes => finalize_pes(&self.data, out),
        }
        self.data.clear();
    }
}

fn split_sections(mut buf: &[u8], out: &mut Output) {
    while let Some(&table_id) = buf.first() {
        // スタッフィング
        if table_id == 0xFF {
            break;
        }

        match Section::parse(buf, out.options.verify_crc) {
            Ok(section) => {
                out.unit(UnitKind::Section, section.as_bytes());
                buf = &buf[section.len()..];
            }
            Err(e) => {
                out.error(e.into());
                break;
            }
        }
    }
}

fn finalize_pes(buf: &[u8], out: &mut Output) {
    if buf.len() < 6 {
        out.error(DemuxError::PesLength {
            expected: 6,
            actual: buf.len(),
        });
        return;
    }

    let pes_packet_length = buf[4..=5].read_be_16() as usize;
    if pes_packet_length == 0 {
        out.unit(UnitKind::Pes, buf);
        return;
    }

    let expected = 6 + pes_packet_length;
    match buf.get(..expected) {
        Some(pes) => out.unit(UnitKind::Pes, pes),
        None => out.error(DemuxError::PesLength {
            expected,
            actual: buf.len(),
        }),
    }
}
