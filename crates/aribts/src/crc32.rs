//! PSIセクションで使われるCRC-32（MPEG-2）。

use crc::{Crc, CRC_32_MPEG_2};

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// `data`のCRC-32を計算する。
#[inline]
pub fn calc(data: &[u8]) -> u32 {
    CRC.checksum(data)
}

/// 末尾4バイトにCRC-32を含む`data`が正しいかどうかを返す。
#[inline]
pub fn check(data: &[u8]) -> bool {
    calc(data) == 0
}
