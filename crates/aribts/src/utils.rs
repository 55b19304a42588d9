use std::fmt;

/// バイト列からビッグエンディアンの整数を読み込むための拡張トレイト。
pub trait BytesExt {
    /// 先頭2バイトをビッグエンディアンの16ビット符号無し整数として読み込む。
    ///
    /// 事前に長さが2以上あると分かるようなコードであれば最適化が期待できる。
    fn read_be_16(&self) -> u16;

    /// 先頭4バイトをビッグエンディアンの32ビット符号無し整数として読み込む。
    fn read_be_32(&self) -> u32;
}

impl BytesExt for [u8] {
    #[inline]
    fn read_be_16(&self) -> u16 {
        u16::from_be_bytes([self[0], self[1]])
    }

    #[inline]
    fn read_be_32(&self) -> u32 {
        u32::from_be_bytes([self[0], self[1], self[2], self[3]])
    }
}

impl<const N: usize> BytesExt for [u8; N] {
    #[inline]
    fn read_be_16(&self) -> u16 {
        self[..].read_be_16()
    }

    #[inline]
    fn read_be_32(&self) -> u32 {
        self[..].read_be_32()
    }
}

/// スライスを安全に分割するための拡張トレイト。
pub trait SliceExt {
    /// スライスの要素型。
    type Item;

    /// スライスを`mid`の位置で分割する。
    ///
    /// `mid`が要素数より大きい場合は`None`を返す。
    fn split_at_checked(&self, mid: usize) -> Option<(&[Self::Item], &[Self::Item])>;
}

impl<T> SliceExt for [T] {
    type Item = T;

    #[inline]
    fn split_at_checked(&self, mid: usize) -> Option<(&[T], &[T])> {
        (mid <= self.len()).then(|| self.split_at(mid))
    }
}

/// BCDの2桁を読み込む。
///
/// いずれかの桁が10以上の場合は`None`を返す。
#[inline]
pub fn read_bcd_digit(b: u8) -> Option<u8> {
    let (hi, lo) = (b >> 4, b & 0x0F);
    (hi < 10 && lo < 10).then(|| hi * 10 + lo)
}

/// `{:?}`で`0x`付きの大文字16進数として表示する。
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct UpperHex<T>(pub T);

impl<T: fmt::UpperHex> fmt::Debug for UpperHex<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// 型が内包する整数の書式化をそのまま委譲する。
macro_rules! delegate_fmt {
    ($ty:ty) => {
        crate::utils::delegate_fmt!(
            $ty,
            Display,
            Binary,
            Octal,
            LowerHex,
            UpperHex
        );
    };
    ($ty:ty, $($trait:ident),*) => {
        $(
            impl std::fmt::$trait for $ty {
                #[inline]
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    std::fmt::$trait::fmt(&self.0, f)
                }
            }
        )*
    };
}

// マクロはpub useできない
pub(crate) use delegate_fmt;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_be() {
        assert_eq!(b"\x12\x34\x56\x78"[..].read_be_16(), 0x1234);
        assert_eq!(b"\x12\x34\x56\x78\x9A".read_be_32(), 0x12345678);
    }

    #[test]
    fn test_split_at_checked() {
        let data = [1, 2, 3];
        assert_eq!(
            SliceExt::split_at_checked(&data[..], 1),
            Some((&[1][..], &[2, 3][..]))
        );
        assert_eq!(
            SliceExt::split_at_checked(&data[..], 3),
            Some((&[1, 2, 3][..], &[][..]))
        );
        assert_eq!(SliceExt::split_at_checked(&data[..], 4), None);
    }

    #[test]
    fn test_read_bcd_digit() {
        assert_eq!(read_bcd_digit(0x00), Some(0));
        assert_eq!(read_bcd_digit(0x59), Some(59));
        assert_eq!(read_bcd_digit(0x5A), None);
        assert_eq!(read_bcd_digit(0xA0), None);
    }

    #[test]
    fn test_upper_hex() {
        assert_eq!(format!("{:?}", UpperHex(0x4D_u8)), "0x4D");
        assert_eq!(format!("{:?}", UpperHex(0x0F_u8)), "0x0F");
    }
}
