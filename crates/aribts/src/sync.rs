//! バイト列からTSパケットの境界を検出する。

use std::fmt;
use std::io::{self, Read};

use crate::packet::{Packet, PACKET_SIZE, SYNC_BYTE};

/// 同期判定に用いる窓に含まれるパケット数。
const WINDOW_PACKETS: usize = 5;
/// 同期判定に用いる窓の大きさ。
const WINDOW_SIZE: usize = WINDOW_PACKETS * PACKET_SIZE;

/// 任意のバイト列を188バイト単位のTSパケットに同期させる。
///
/// 同期が外れた場合は窓内で188バイト間隔に同期バイトが並ぶ位置を探して再同期する。
/// 同期の喪失はエラーとはせず、読み込みにおけるI/Oエラーのみを返す。
pub struct Synchronizer<R> {
    inner: R,
    buf: Box<[u8; WINDOW_SIZE]>,
    len: usize,
    /// 公開中のパケットの窓内における位置。
    current: Option<usize>,
    eof: bool,
}

impl<R: Read> Synchronizer<R> {
    /// `inner`から読み込む`Synchronizer`を生成する。
    pub fn new(inner: R) -> Synchronizer<R> {
        Synchronizer {
            inner,
            buf: Box::new([0; WINDOW_SIZE]),
            len: 0,
            current: None,
            eof: false,
        }
    }

    /// 次のパケットに進める。
    ///
    /// パケットが得られた場合は`true`を返し、ストリームが終端に達した場合は`false`を返す。
    /// 終端に達した後は常に`false`を返す。
    pub fn advance(&mut self) -> io::Result<bool> {
        let search_from = match self.current.take() {
            None => 0,
            Some(pos) => {
                let mut next = pos + PACKET_SIZE;
                let mut search_from = pos + 1;
                if next + PACKET_SIZE > self.len && !self.eof {
                    // 直前の同期バイトより後ろを残して詰める
                    self.shift(pos + 1);
                    self.fill()?;
                    next = PACKET_SIZE - 1;
                    search_from = 0;
                }

                if next + PACKET_SIZE <= self.len {
                    if self.buf[next] == SYNC_BYTE {
                        self.current = Some(next);
                        return Ok(true);
                    }

                    log::debug!("sync lost: {:#04X} at frame boundary", self.buf[next]);
                }

                search_from
            }
        };

        self.resync(search_from)
    }

    /// 現在のパケットを返す。
    ///
    /// [`advance`][Synchronizer::advance]が`true`を返した後にのみ`Some`を返す。
    #[inline]
    pub fn packet(&self) -> Option<&Packet> {
        self.bytes()
            .and_then(|bytes| bytes.try_into().ok())
            .map(Packet::from_bytes)
    }

    /// 現在のパケットのバイト列を返す。
    #[inline]
    pub fn bytes(&self) -> Option<&[u8]> {
        let pos = self.current?;
        self.buf.get(pos..pos + PACKET_SIZE)
    }

    /// 内包するリーダーを返す。
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// 窓が埋まるか終端に達するまで読み込む。
    fn fill(&mut self) -> io::Result<()> {
        while !self.eof && self.len < WINDOW_SIZE {
            match self.inner.read(&mut self.buf[self.len..]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// 窓を左に`n`バイト詰める。
    fn shift(&mut self, n: usize) {
        let n = n.min(self.len);
        self.buf.copy_within(n..self.len, 0);
        self.len -= n;
    }

    /// 窓の先頭188バイトから、窓の終わりまで188バイト間隔で同期バイトが並ぶ位置を探す。
    ///
    /// 終端では末尾の不完全なパケットを判定に含めない。
    fn find_sync(&self) -> Option<usize> {
        let buf = &self.buf[..self.len];
        memchr::memchr_iter(SYNC_BYTE, &buf[..PACKET_SIZE.min(buf.len())]).find(|&offset| {
            let rest = buf.len() - offset;
            if rest < PACKET_SIZE {
                return false;
            }

            let end = if self.eof {
                offset + rest / PACKET_SIZE * PACKET_SIZE
            } else {
                buf.len()
            };
            buf[offset..end]
                .iter()
                .step_by(PACKET_SIZE)
                .all(|&b| b == SYNC_BYTE)
        })
    }

    fn resync(&mut self, from: usize) -> io::Result<bool> {
        self.shift(from);

        let mut skipped = 0;
        loop {
            self.fill()?;
            if self.len < PACKET_SIZE {
                if skipped > 0 {
                    log::debug!("stream ended before sync; {} bytes skipped", skipped);
                }
                self.len = 0;
                return Ok(false);
            }

            if let Some(offset) = self.find_sync() {
                self.shift(offset);
                self.fill()?;
                skipped += offset;
                if skipped > 0 {
                    log::debug!("sync acquired after skipping {} bytes", skipped);
                }

                self.current = Some(0);
                return Ok(true);
            }

            self.shift(PACKET_SIZE);
            skipped += PACKET_SIZE;
        }
    }
}

impl<R: fmt::Debug> fmt::Debug for Synchronizer<R> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("inner", &self.inner)
            .field("len", &self.len)
            .field("current", &self.current)
            .field("eof", &self.eof)
            .finish_non_exhaustive()
    }
}
