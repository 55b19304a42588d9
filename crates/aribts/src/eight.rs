//! ARIB STD-B24で規定される8単位符号。

pub mod decode;
pub mod str;

pub use decode::{decode, DecodeError, Decoder, Designator, GraphicSet, Options};
