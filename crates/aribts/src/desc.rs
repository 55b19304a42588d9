//! ARIB STD-B10で規定される記述子とその関連。

use std::fmt;

use crate::eight::str::AribStr;
use crate::utils::{BytesExt, SliceExt};

/// 記述子タグ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DescriptorTag(pub u8);

impl DescriptorTag {
    /// 限定受信方式記述子。
    pub const CONDITIONAL_ACCESS: DescriptorTag = DescriptorTag(0x09);
    /// ネットワーク名記述子。
    pub const NETWORK_NAME: DescriptorTag = DescriptorTag(0x40);
    /// サービスリスト記述子。
    pub const SERVICE_LIST: DescriptorTag = DescriptorTag(0x41);
    /// 衛星分配システム記述子。
    pub const SATELLITE_DELIVERY_SYSTEM: DescriptorTag = DescriptorTag(0x43);
    /// 有線分配システム記述子。
    pub const CABLE_DELIVERY_SYSTEM: DescriptorTag = DescriptorTag(0x44);
    /// ブーケ名記述子。
    pub const BOUQUET_NAME: DescriptorTag = DescriptorTag(0x47);
    /// サービス記述子。
    pub const SERVICE: DescriptorTag = DescriptorTag(0x48);
    /// リンク記述子。
    pub const LINKAGE: DescriptorTag = DescriptorTag(0x4A);
    /// 短形式イベント記述子。
    pub const SHORT_EVENT: DescriptorTag = DescriptorTag(0x4D);
    /// 拡張形式イベント記述子。
    pub const EXTENDED_EVENT: DescriptorTag = DescriptorTag(0x4E);
    /// コンポーネント記述子。
    pub const COMPONENT: DescriptorTag = DescriptorTag(0x50);
    /// ストリーム識別記述子。
    pub const STREAM_ID: DescriptorTag = DescriptorTag(0x52);
    /// コンテント記述子。
    pub const CONTENT: DescriptorTag = DescriptorTag(0x54);
    /// パレンタルレート記述子。
    pub const PARENTAL_RATING: DescriptorTag = DescriptorTag(0x55);
    /// ローカル時間オフセット記述子。
    pub const LOCAL_TIME_OFFSET: DescriptorTag = DescriptorTag(0x58);
    /// デジタルコピー制御記述子。
    pub const DIGITAL_COPY_CONTROL: DescriptorTag = DescriptorTag(0xC1);
    /// 音声コンポーネント記述子。
    pub const AUDIO_COMPONENT: DescriptorTag = DescriptorTag(0xC4);
    /// TS情報記述子。
    pub const TS_INFORMATION: DescriptorTag = DescriptorTag(0xCD);
    /// イベントグループ記述子。
    pub const EVENT_GROUP: DescriptorTag = DescriptorTag(0xD6);
    /// 地上分配システム記述子。
    pub const TERRESTRIAL_DELIVERY_SYSTEM: DescriptorTag = DescriptorTag(0xFA);
    /// 部分受信記述子。
    pub const PARTIAL_RECEPTION: DescriptorTag = DescriptorTag(0xFB);
}

/// 記述子を表すトレイト。
pub trait Descriptor<'a>: Sized {
    /// この記述子のタグ。
    const TAG: DescriptorTag;

    /// `data`から記述子を読み取る。
    ///
    /// `data`には`descriptor_tag`と`descriptor_length`は含まない。
    fn read(data: &'a [u8]) -> Option<Self>;
}

/// パース前の記述子。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    /// 記述子のタグ。
    pub tag: DescriptorTag,

    /// 記述子の内容。
    pub data: &'a [u8],
}

impl<'a> fmt::Debug for RawDescriptor<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RawDescriptor")
            .field("tag", &crate::utils::UpperHex(self.tag.0))
            .field("len", &self.data.len())
            .finish()
    }
}

/// 複数の記述子からなる記述子群。
#[derive(Clone, Copy)]
pub struct DescriptorBlock<'a>(&'a [u8]);

impl<'a> DescriptorBlock<'a> {
    /// 記述子が連続する`block`から`DescriptorBlock`を生成する。
    #[inline]
    pub fn new(block: &'a [u8]) -> DescriptorBlock<'a> {
        DescriptorBlock(block)
    }

    /// `data`から`length`バイト分の記述子群を読み取り後続データと共に返す。
    ///
    /// データ長が不足している場合は`None`を返す。
    pub fn read_with_len(data: &'a [u8], length: u16) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        let (block, rem) = data.split_at_checked(length as usize)?;
        Some((DescriptorBlock(block), rem))
    }

    /// 先頭4ビットを予約とする12ビットの記述子長に続く記述子群を読み取り、後続データと共に返す。
    ///
    /// データ長が不足している場合は`None`を返す。
    #[inline]
    pub fn read(data: &'a [u8]) -> Option<(DescriptorBlock<'a>, &'a [u8])> {
        if data.len() < 2 {
            return None;
        }

        let length = data[0..=1].read_be_16() & 0x0FFF;
        DescriptorBlock::read_with_len(&data[2..], length)
    }

    /// 記述子群のバイト列を返す。
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// 内包する記述子群のイテレーターを返す。
    ///
    /// 記述子長が残りのバイト数を超える記述子があればそこで終了する。
    #[inline]
    pub fn iter(&self) -> DescriptorIter<'a> {
        DescriptorIter(self.0)
    }

    /// 内包する記述子群から`T`のタグと一致する最初の記述子を読み取って返す。
    pub fn get<T: Descriptor<'a>>(&self) -> Option<T> {
        self.iter()
            .find(|d| d.tag == T::TAG)
            .and_then(|d| T::read(d.data))
    }

    /// 内包する記述子群から`T`のタグと一致する記述子をすべて読み取って返す。
    pub fn get_all<T: Descriptor<'a>>(&self) -> impl Iterator<Item = T> + 'a {
        self.iter()
            .filter(|d| d.tag == T::TAG)
            .filter_map(|d| T::read(d.data))
    }
}

impl<'a> fmt::Debug for DescriptorBlock<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("DescriptorBlock(")?;
        f.debug_list().entries(self).finish()?;
        f.write_str(")")
    }
}

impl<'a> IntoIterator for &DescriptorBlock<'a> {
    type Item = RawDescriptor<'a>;
    type IntoIter = DescriptorIter<'a>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// [`DescriptorBlock`]のイテレーター。
#[derive(Debug, Clone)]
pub struct DescriptorIter<'a>(&'a [u8]);

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = RawDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let [tag, length, ref rem @ ..] = *self.0 else {
            return None;
        };
        let Some((data, tail)) = rem.split_at_checked(length as usize) else {
            log::trace!("truncated descriptor: {:02X}", tag);
            self.0 = &[];
            return None;
        };

        self.0 = tail;
        Some(RawDescriptor {
            tag: DescriptorTag(tag),
            data,
        })
    }
}

impl<'a> std::iter::FusedIterator for DescriptorIter<'a> {}

/// サービス記述子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor<'a> {
    /// サービス形式種別。
    pub service_type: u8,
    /// 事業者名。
    pub service_provider_name: &'a AribStr,
    /// サービス名。
    pub service_name: &'a AribStr,
}

impl<'a> Descriptor<'a> for ServiceDescriptor<'a> {
    const TAG: DescriptorTag = DescriptorTag::SERVICE;

    fn read(data: &'a [u8]) -> Option<ServiceDescriptor<'a>> {
        let [service_type, service_provider_name_length, ref data @ ..] = *data else {
            log::debug!("invalid ServiceDescriptor");
            return None;
        };
        let Some((service_provider_name, data)) =
            data.split_at_checked(service_provider_name_length as usize)
        else {
            log::debug!("invalid ServiceDescriptor::service_provider_name");
            return None;
        };
        let [service_name_length, ref service_name @ ..] = *data else {
            log::debug!("invalid ServiceDescriptor::service_name_length");
            return None;
        };
        let Some(service_name) = service_name.get(..service_name_length as usize) else {
            log::debug!("invalid ServiceDescriptor::service_name");
            return None;
        };

        Some(ServiceDescriptor {
            service_type,
            service_provider_name: AribStr::from_bytes(service_provider_name),
            service_name: AribStr::from_bytes(service_name),
        })
    }
}

/// 短形式イベント記述子。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortEventDescriptor<'a> {
    /// ISO 639-2で規定される3文字の言語コード。
    pub lang_code: [u8; 3],
    /// 番組名。
    pub event_name: &'a AribStr,
    /// 番組記述。
    pub text: &'a AribStr,
}

impl<'a> Descriptor<'a> for ShortEventDescriptor<'a> {
    const TAG: DescriptorTag = DescriptorTag::SHORT_EVENT;

    fn read(data: &'a [u8]) -> Option<ShortEventDescriptor<'a>> {
        let [l1, l2, l3, event_name_length, ref data @ ..] = *data else {
            log::debug!("invalid ShortEventDescriptor");
            return None;
        };
        let Some((event_name, data)) = data.split_at_checked(event_name_length as usize) else {
            log::debug!("invalid ShortEventDescriptor::event_name");
            return None;
        };
        let [text_length, ref text @ ..] = *data else {
            log::debug!("invalid ShortEventDescriptor::text_length");
            return None;
        };
        let Some(text) = text.get(..text_length as usize) else {
            log::debug!("invalid ShortEventDescriptor::text");
            return None;
        };

        Some(ShortEventDescriptor {
            lang_code: [l1, l2, l3],
            event_name: AribStr::from_bytes(event_name),
            text: AribStr::from_bytes(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eight::Options;
    use crate::packet::tests::PACKET_EIT;
    use assert_matches::assert_matches;

    /// EITパケット中の最初の記述子の位置。
    const EIT_DESCRIPTORS: usize = 31;

    #[test]
    fn test_descriptor_block() {
        let block = DescriptorBlock::new(&PACKET_EIT.0[EIT_DESCRIPTORS..]);
        let tags: Vec<_> = block.iter().map(|d| d.tag).collect();
        // 音声コンポーネント記述子はパケット境界で途切れている
        assert_eq!(
            tags,
            [
                DescriptorTag::SHORT_EVENT,
                DescriptorTag::COMPONENT,
                DescriptorTag::CONTENT,
                DescriptorTag::DIGITAL_COPY_CONTROL,
            ]
        );

        let component = block
            .iter()
            .find(|d| d.tag == DescriptorTag::COMPONENT)
            .unwrap();
        assert_eq!(component.data, hex_literal::hex!("F1 03 00 6A 70 6E"));
        assert_eq!(block.get_all::<ShortEventDescriptor>().count(), 1);
    }

    #[test]
    fn test_descriptor_block_read() {
        let data = hex_literal::hex!("F0 06 48 01 01 52 01 33 FF FF");
        let (block, rem) = DescriptorBlock::read(&data).unwrap();
        assert_eq!(block.as_bytes(), &data[2..8]);
        assert_eq!(rem, &[0xFF, 0xFF]);

        let mut iter = block.iter();
        assert_matches!(
            iter.next(),
            Some(RawDescriptor { tag: DescriptorTag(0x48), data: &[0x01] })
        );
        assert_matches!(
            iter.next(),
            Some(RawDescriptor { tag: DescriptorTag::STREAM_ID, data: &[0x33] })
        );
        assert_matches!(iter.next(), None);

        assert_matches!(DescriptorBlock::read(&data[..5]), None);
        assert_matches!(DescriptorBlock::read(&[0xF0]), None);
    }

    #[test]
    fn test_short_event() {
        let block = DescriptorBlock::new(&PACKET_EIT.0[EIT_DESCRIPTORS..]);
        let short_event: ShortEventDescriptor = block.get().unwrap();
        assert_eq!(&short_event.lang_code, b"jpn");
        assert_eq!(short_event.event_name.len(), 16);
        assert_eq!(short_event.text.len(), 99);
        assert_eq!(
            short_event.event_name.decode(Options::DEFAULT).unwrap(),
            "おうちの神様"
        );
        assert_eq!(
            short_event.text.decode(Options::DEFAULT).unwrap(),
            "衣替えの季節、夏服を収納する前にやることとは?やらずに収納すると害虫が服を荒らしてしまうことも・・・正しい夏服収納方法を紹介します。"
        );

        assert_matches!(ShortEventDescriptor::read(b"jpn"), None);
        assert_matches!(ShortEventDescriptor::read(b"jpn\x02A"), None);
        assert_matches!(ShortEventDescriptor::read(b"jpn\x01A\x02B"), None);
    }

    #[test]
    fn test_service() {
        // デジタルTVサービス、事業者名「A」、サービス名「ＮＨＫ」
        let data = hex_literal::hex!("48 0B 01 02 0E 41 03 23 4E 23 48 23 4B");
        let block = DescriptorBlock::new(&data);
        let service: ServiceDescriptor = block.get().unwrap();
        assert_eq!(service.service_type, 0x01);
        assert_eq!(service.service_provider_name.as_bytes(), b"\x0E\x41");
        assert_eq!(
            service.service_provider_name.decode(Options::DEFAULT).unwrap(),
            "A"
        );
        assert_eq!(service.service_name.decode(Options::DEFAULT).unwrap(), "ＮＨＫ");

        assert_matches!(ServiceDescriptor::read(&[0x01]), None);
        assert_matches!(ServiceDescriptor::read(&[0x01, 0x02, 0x41]), None);
        assert_matches!(ServiceDescriptor::read(&[0x01, 0x00, 0x02, 0x41]), None);
        assert_matches!(block.get::<ShortEventDescriptor>(), None);
    }
}
