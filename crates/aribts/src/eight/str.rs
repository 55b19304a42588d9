//! 8単位符号の文字列表現。

use std::borrow::Borrow;
use std::fmt;
use std::ops;

use super::decode::{self, DecodeError};

/// 借用された8単位符号を表す型。
///
/// `AribStr`と[`AribString`]は、<code>&[str]</code>と[`String`]の関係と相似しており、
/// 前者は借用された参照、後者は所有権を持つ文字列である。
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct AribStr([u8]);

impl AribStr {
    /// バイト列から`AribStr`を生成する。
    #[must_use]
    #[inline]
    pub const fn from_bytes(bytes: &[u8]) -> &AribStr {
        // Safety: `AribStr`は`[u8]`と同じ表現である
        unsafe { &*(bytes as *const [u8] as *const AribStr) }
    }

    /// この文字列のバイト数を返す。
    #[must_use]
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// この文字列が空であるかどうかを返す。
    #[must_use]
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 文字列スライスをバイトスライスに変換する。
    #[must_use]
    #[inline]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `opts`に従い8単位符号を`String`に変換する。
    ///
    /// 不明なエスケープシーケンスが含まれる場合はエラーとなる。JIS X 0208で表せない文字は`U+FFFD`となる。
    #[inline]
    pub fn decode(&self, opts: decode::Options) -> Result<String, DecodeError> {
        decode::decode(self.as_bytes(), opts)
    }
}

impl Default for &AribStr {
    #[inline]
    fn default() -> Self {
        AribStr::from_bytes(&[])
    }
}

impl fmt::Debug for AribStr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AribStr(")?;
        f.debug_list()
            .entries(self.0.iter().map(|&b| crate::utils::UpperHex(b)))
            .finish()?;
        f.write_str(")")
    }
}

impl AsRef<AribStr> for AribStr {
    #[inline]
    fn as_ref(&self) -> &AribStr {
        self
    }
}

impl AsRef<[u8]> for AribStr {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl ToOwned for AribStr {
    type Owned = AribString;

    #[inline]
    fn to_owned(&self) -> AribString {
        AribString(self.0.to_vec())
    }
}

/// 所有権を持つ8単位符号を表す型。
///
/// 分割されて送られてくる文字列を連結する際などに使用する。
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AribString(Vec<u8>);

impl AribString {
    /// 空の`AribString`を生成する。
    #[inline]
    #[must_use]
    pub const fn new() -> AribString {
        AribString(Vec::new())
    }

    /// `AribString`をバイトのベクタに変換する。
    #[inline]
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// 文字列全体を含む[`AribStr`]スライスを抽出する。
    #[inline]
    #[must_use]
    pub fn as_arib_str(&self) -> &AribStr {
        AribStr::from_bytes(&self.0)
    }

    /// `AribString`を切り詰めて全内容を削除する。
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// `AribString`に指定された8単位符号を追記する。
    #[inline]
    pub fn push_str(&mut self, string: &AribStr) {
        self.0.extend_from_slice(string.as_bytes());
    }
}

impl ops::Deref for AribString {
    type Target = AribStr;

    #[inline]
    fn deref(&self) -> &AribStr {
        self.as_arib_str()
    }
}

impl fmt::Debug for AribString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self.as_arib_str(), f)
    }
}

impl AsRef<AribStr> for AribString {
    #[inline]
    fn as_ref(&self) -> &AribStr {
        self
    }
}

impl Borrow<AribStr> for AribString {
    #[inline]
    fn borrow(&self) -> &AribStr {
        self
    }
}

impl From<&AribStr> for AribString {
    #[inline]
    fn from(s: &AribStr) -> Self {
        s.to_owned()
    }
}

impl From<Vec<u8>> for AribString {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        AribString(bytes)
    }
}

impl From<AribString> for Vec<u8> {
    #[inline]
    fn from(s: AribString) -> Self {
        s.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eight::Options;

    #[test]
    fn test_arib_str() {
        let s = AribStr::from_bytes(b"\xAA\xA6\xC1\xCE");
        assert_eq!(s.len(), 4);
        assert!(!s.is_empty());
        assert_eq!(s.decode(Options::DEFAULT).unwrap(), "おうちの");
        assert_eq!(format!("{:?}", s), "AribStr([0xAA, 0xA6, 0xC1, 0xCE])");

        let empty: &AribStr = Default::default();
        assert!(empty.is_empty());
        assert_eq!(empty.decode(Options::DEFAULT).unwrap(), "");
    }

    #[test]
    fn test_arib_string() {
        // 2バイト符号の途中で分割された文字列を連結する
        let mut s = AribString::new();
        s.push_str(AribStr::from_bytes(b"\x46\x7C\x4B"));
        s.push_str(AribStr::from_bytes(b"\x5C"));
        assert_eq!(s.as_bytes(), b"\x46\x7C\x4B\x5C");
        assert_eq!(s.decode(Options::DEFAULT).unwrap(), "日本");
        assert_eq!(format!("{:?}", s), "AribStr([0x46, 0x7C, 0x4B, 0x5C])");

        let owned = AribStr::from_bytes(b"\xCE").to_owned();
        assert_eq!(owned.into_bytes(), b"\xCE");

        s.clear();
        assert!(s.is_empty());
    }
}
