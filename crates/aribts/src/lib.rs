//! ARIBに基づいたMPEG2-TSを読み込むためのクレート。
//!
//! [`sync::Synchronizer`]でバイト列からパケットを切り出し、
//! [`demux::Demuxer`]でPIDごとのセクションやPESに再構成する。
//! 両者をまとめて扱う場合は[`scan::Scanner`]を使う。
//! 記述子などに含まれる文字列は[`eight`]でデコードする。

#![deny(missing_docs)]

pub mod crc32;
pub mod demux;
pub mod desc;
pub mod eight;
pub mod packet;
pub mod pid;
pub mod psi;
pub mod scan;
pub mod sync;
pub mod time;
mod utils;

pub use eight::str::{AribStr, AribString};
pub use packet::Packet;
pub use pid::Pid;
