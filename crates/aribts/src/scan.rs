//! 同期と分離をまとめて行い、ストリームから結果を順次取り出す。

use std::io::{self, Read};

use crate::demux::{Demuxer, Event, Unit};
use crate::sync::Synchronizer;

/// [`Synchronizer`]と[`Demuxer`]を組み合わせ、ストリームから結果を引き出す。
///
/// # サンプル
///
/// ```
/// use aribts::scan::Scanner;
/// use aribts::Pid;
///
/// # fn main() -> std::io::Result<()> {
/// # let file: &[u8] = &[];
/// let mut scanner = Scanner::new(file);
/// scanner.demuxer_mut().track(Pid::EIT);
/// while let Some(unit) = scanner.next_unit()? {
///     println!("{:?}: {} bytes", unit.pid, unit.data.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Scanner<R> {
    sync: Synchronizer<R>,
    demuxer: Demuxer,
    flushed: bool,
}

impl<R: Read> Scanner<R> {
    /// 何も追跡しない`Demuxer`で`Scanner`を生成する。
    #[inline]
    pub fn new(r: R) -> Scanner<R> {
        Scanner::with_demuxer(r, Demuxer::new())
    }

    /// 設定済みの`demuxer`で`Scanner`を生成する。
    pub fn with_demuxer(r: R, demuxer: Demuxer) -> Scanner<R> {
        Scanner {
            sync: Synchronizer::new(r),
            demuxer,
            flushed: false,
        }
    }

    /// 内包する`Demuxer`を返す。
    #[inline]
    pub fn demuxer(&self) -> &Demuxer {
        &self.demuxer
    }

    /// 内包する`Demuxer`を可変で返す。
    ///
    /// 途中で追跡するPIDを変更する際に使用する。
    #[inline]
    pub fn demuxer_mut(&mut self) -> &mut Demuxer {
        &mut self.demuxer
    }

    /// 次の結果を返す。
    ///
    /// ストリームの終端では再構成中の単位を確定させた上で結果を返し尽くし、その後は`Ok(None)`を返す。
    pub fn advance(&mut self) -> io::Result<Option<Event>> {
        loop {
            if let Some(event) = self.demuxer.next_event() {
                return Ok(Some(event));
            }
            if self.flushed {
                return Ok(None);
            }

            if self.sync.advance()? {
                if let Some(packet) = self.sync.packet() {
                    self.demuxer.feed(packet);
                }
            } else {
                self.demuxer.flush();
                self.flushed = true;
            }
        }
    }

    /// 次の単位を返す。エラーはログに出力して読み飛ばす。
    pub fn next_unit(&mut self) -> io::Result<Option<Unit>> {
        loop {
            match self.advance()? {
                Some(Event::Unit(unit)) => return Ok(Some(unit)),
                Some(Event::Error { pid, error }) => log::debug!("{:?}: {}", pid, error),
                None => return Ok(None),
            }
        }
    }
}

impl<R: Read> Iterator for Scanner<R> {
    type Item = io::Result<Event>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}
