//! PSI用のモジュール。

use thiserror::Error;

use crate::pid::Pid;
use crate::utils::BytesExt;

/// PSIセクションの最大セクション長。
pub const MAX_SECTION_LENGTH: u16 = 4093;

/// [`Section::parse`]で発生するエラー。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SectionError {
    /// セクション長に対してバイト数が足りない。
    #[error("section is truncated ({available} of {required} bytes)")]
    TooShort {
        /// セクションに必要なバイト数。
        required: usize,
        /// 実際にあるバイト数。
        available: usize,
    },

    /// セクション長が不正。
    #[error("invalid section length {0}")]
    InvalidLength(u16),

    /// CRC32が一致しない。
    #[error("crc32 mismatch")]
    Crc32,
}

/// 検証済みのPSIセクション。
///
/// 内包するバイト列の長さは`3 + section_length`に等しい。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a>(&'a [u8]);

impl<'a> Section<'a> {
    /// `buf`の先頭からPSIセクションを1つ読み取る。
    ///
    /// `verify_crc`が`true`の場合、セクションシンタクスを持つセクションのCRC32を検証する。
    /// セクション以降のバイト列は無視される。
    pub fn parse(buf: &'a [u8], verify_crc: bool) -> Result<Section<'a>, SectionError> {
        if buf.len() < 3 {
            return Err(SectionError::TooShort {
                required: 3,
                available: buf.len(),
            });
        }

        let section_syntax_indicator = buf[1] & 0b10000000 != 0;
        let section_length = buf[1..=2].read_be_16() & 0x0FFF;
        if section_length > MAX_SECTION_LENGTH
            || (section_syntax_indicator && section_length < 5 + 4)
        {
            return Err(SectionError::InvalidLength(section_length));
        }

        let required = 3 + section_length as usize;
        let Some(section) = buf.get(..required) else {
            return Err(SectionError::TooShort {
                required,
                available: buf.len(),
            });
        };

        if verify_crc && section_syntax_indicator && !crate::crc32::check(section) {
            return Err(SectionError::Crc32);
        }

        Ok(Section(section))
    }

    /// セクション全体のバイト列を返す。
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.0
    }

    /// セクション全体の長さを返す。
    #[inline]
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// テーブル識別を返す。
    #[inline]
    pub fn table_id(&self) -> u8 {
        self.0[0]
    }

    /// セクションシンタクス指示を返す。
    #[inline]
    pub fn section_syntax_indicator(&self) -> bool {
        self.0[1] & 0b10000000 != 0
    }

    /// セクション長を返す。
    #[inline]
    pub fn section_length(&self) -> u16 {
        self.0[1..=2].read_be_16() & 0x0FFF
    }

    /// セクションシンタクスを返す。
    pub fn syntax(&self) -> Option<SectionSyntax> {
        if !self.section_syntax_indicator() {
            return None;
        }

        Some(SectionSyntax {
            table_id_extension: self.0[3..=4].read_be_16(),
            version_number: (self.0[5] & 0b00111110) >> 1,
            current_next_indicator: self.0[5] & 0b00000001 != 0,
            section_number: self.0[6],
            last_section_number: self.0[7],
        })
    }

    /// ヘッダやCRCを除いたデータ部を返す。
    ///
    /// セクションシンタクスを持たないセクションではセクション長の直後から末尾までを返す。
    pub fn data(&self) -> &'a [u8] {
        if self.section_syntax_indicator() {
            &self.0[8..self.0.len() - 4]
        } else {
            &self.0[3..]
        }
    }

    /// セクションシンタクスを持つ場合、末尾のCRC32を返す。
    pub fn crc32(&self) -> Option<u32> {
        self.section_syntax_indicator()
            .then(|| self.0[self.0.len() - 4..].read_be_32())
    }
}

/// PSIセクションのシンタクス。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSyntax {
    /// テーブル識別拡張。
    pub table_id_extension: u16,
    /// バージョン番号（5ビット）。
    pub version_number: u8,
    /// カレントネクスト指示。
    pub current_next_indicator: bool,
    /// セクション番号。
    pub section_number: u8,
    /// 最終セクション番号。
    pub last_section_number: u8,
}

/// PAT（Program Association Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramAssociation {
    /// トランスポートストリーム識別。
    pub transport_stream_id: u16,
    /// ネットワークPID。
    pub network_pid: Option<Pid>,
    /// 各番組。
    pub programs: Vec<Program>,
}

/// PAT内の番組。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Program {
    /// 番組番号。
    pub program_number: u16,
    /// PMTのPID。
    pub program_map_pid: Pid,
}

impl ProgramAssociation {
    /// PATのテーブル識別。
    pub const TABLE_ID: u8 = 0x00;

    /// `section`からPATを読み取る。
    pub fn read(section: &Section) -> Option<ProgramAssociation> {
        if section.table_id() != Self::TABLE_ID {
            log::debug!("invalid PAT::table_id");
            return None;
        }
        let Some(syntax) = section.syntax() else {
            log::debug!("invalid PAT::syntax");
            return None;
        };

        let mut network_pid = None;
        let mut programs = Vec::new();
        for chunk in section.data().chunks_exact(4) {
            let program_number = chunk[0..=1].read_be_16();
            let pid = Pid::read(&chunk[2..=3]);
            if program_number == 0 {
                network_pid = Some(pid);
            } else {
                programs.push(Program {
                    program_number,
                    program_map_pid: pid,
                });
            }
        }

        Some(ProgramAssociation {
            transport_stream_id: syntax.table_id_extension,
            network_pid,
            programs,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// テスト用に、CRCを付与したセクションシンタクスを持つセクションを組み立てる。
    pub fn make_section(table_id: u8, table_id_extension: u16, body: &[u8]) -> Vec<u8> {
        let section_length = 5 + body.len() + 4;
        let mut section = vec![
            table_id,
            0xB0 | (section_length >> 8) as u8,
            section_length as u8,
        ];
        section.extend_from_slice(&table_id_extension.to_be_bytes());
        section.extend_from_slice(&[0xC1, 0x00, 0x00]);
        section.extend_from_slice(body);
        section.extend_from_slice(&crate::crc32::calc(&section).to_be_bytes());
        section
    }

    #[test]
    fn test_section_parse() {
        let data = make_section(0x42, 0x7FE1, &[1, 2, 3]);
        let mut buf = data.clone();
        buf.extend_from_slice(&[0xFF; 10]);

        let section = Section::parse(&buf, true).unwrap();
        assert_eq!(section.as_bytes(), &*data);
        assert_eq!(section.len(), 3 + 5 + 3 + 4);
        assert_eq!(section.table_id(), 0x42);
        assert!(section.section_syntax_indicator());
        assert_eq!(section.section_length(), 12);
        assert_eq!(
            section.syntax(),
            Some(SectionSyntax {
                table_id_extension: 0x7FE1,
                version_number: 0,
                current_next_indicator: true,
                section_number: 0,
                last_section_number: 0,
            })
        );
        assert_eq!(section.data(), &[1, 2, 3]);
        assert_eq!(section.crc32(), Some(data[data.len() - 4..].read_be_32()));
    }

    #[test]
    fn test_section_parse_error() {
        let data = make_section(0x42, 0x7FE1, &[1, 2, 3]);
        assert_matches!(
            Section::parse(&data[..2], true),
            Err(SectionError::TooShort { required: 3, available: 2 })
        );
        assert_matches!(
            Section::parse(&data[..10], true),
            Err(SectionError::TooShort { required: 15, available: 10 })
        );

        let mut broken = data.clone();
        broken[9] ^= 0x01;
        assert_matches!(Section::parse(&broken, true), Err(SectionError::Crc32));
        assert_matches!(Section::parse(&broken, false), Ok(_));

        assert_matches!(
            Section::parse(&[0x42, 0xBF, 0xFE], true),
            Err(SectionError::InvalidLength(4094))
        );
        assert_matches!(
            Section::parse(&[0x42, 0xB0, 0x08], true),
            Err(SectionError::InvalidLength(8))
        );
    }

    #[test]
    fn test_section_without_syntax() {
        // TDT
        let buf = [0x70, 0x70, 0x05, 0xE5, 0x6C, 0x12, 0x34, 0x56];
        let section = Section::parse(&buf, true).unwrap();
        assert_eq!(section.table_id(), 0x70);
        assert_eq!(section.syntax(), None);
        assert_eq!(section.data(), &buf[3..]);
        assert_eq!(section.crc32(), None);
    }

    #[test]
    fn test_pat() {
        let data = make_section(
            0x00,
            0x7FE1,
            &[
                0x00, 0x00, 0xE0, 0x10, // NIT
                0x04, 0x08, 0xE1, 0xF0, //
                0x04, 0x09, 0xE1, 0xF1, //
            ],
        );
        let section = Section::parse(&data, true).unwrap();
        let pat = ProgramAssociation::read(&section).unwrap();
        assert_eq!(pat.transport_stream_id, 0x7FE1);
        assert_eq!(pat.network_pid, Some(Pid::NIT));
        assert_eq!(
            pat.programs,
            [
                Program {
                    program_number: 0x0408,
                    program_map_pid: Pid::new(0x01F0),
                },
                Program {
                    program_number: 0x0409,
                    program_map_pid: Pid::new(0x01F1),
                },
            ]
        );

        let data = make_section(0x42, 0x7FE1, &[]);
        let section = Section::parse(&data, true).unwrap();
        assert_eq!(ProgramAssociation::read(&section), None);
    }
}
