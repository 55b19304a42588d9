//! 8単位符号のデコード。
//!
//! 図形文字はいったんISO-2022-JPの中間バイト列に変換され、
//! 最後に`encoding_rs`によりUTF-8の文字列となる。

use encoding_rs::DecoderResult;
use thiserror::Error;

/// 符号の指示。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Designator {
    /// G0に対する指示。
    G0 = 0,
    /// G1に対する指示。
    G1 = 1,
    /// G2に対する指示。
    G2 = 2,
    /// G3に対する指示。
    G3 = 3,
}

impl Designator {
    /// 指示の中間バイト（0x28～0x2B）から`Designator`を得る。
    #[inline]
    fn from_intermediate(b: u8) -> Designator {
        match b.wrapping_sub(0x28) & 0b11 {
            0 => Designator::G0,
            1 => Designator::G1,
            2 => Designator::G2,
            _ => Designator::G3,
        }
    }
}

/// 文字符号集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GraphicSet {
    /// 漢字、2バイト符号。
    Kanji,
    /// 英数、1バイト符号。
    Alnum,
    /// 平仮名、1バイト符号。
    Hira,
    /// 片仮名、1バイト符号。
    Kata,
    /// モザイクA、1バイト符号。
    MosaicA,
    /// モザイクB、1バイト符号。
    MosaicB,
    /// モザイクC、1バイト符号。
    MosaicC,
    /// モザイクD、1バイト符号。
    MosaicD,
    /// プロポーショナル英数、1バイト符号。
    PropAlnum,
    /// プロポーショナル平仮名、1バイト符号。
    PropHira,
    /// プロポーショナル片仮名、1バイト符号。
    PropKata,
    /// JIS X 0201 片仮名、1バイト符号。
    JisXKata,
    /// JIS互換漢字1面、2バイト符号。
    JisKanjiPlane1,
    /// JIS互換漢字2面、2バイト符号。
    JisKanjiPlane2,
    /// 追加記号、2バイト符号。
    ExtraSymbols,
    /// DRCS-0、2バイト符号。
    Drcs0,
    /// DRCS-1、1バイト符号。
    Drcs1,
    /// DRCS-2、1バイト符号。
    Drcs2,
    /// DRCS-3、1バイト符号。
    Drcs3,
    /// DRCS-4、1バイト符号。
    Drcs4,
    /// DRCS-5、1バイト符号。
    Drcs5,
    /// DRCS-6、1バイト符号。
    Drcs6,
    /// DRCS-7、1バイト符号。
    Drcs7,
    /// DRCS-8、1バイト符号。
    Drcs8,
    /// DRCS-9、1バイト符号。
    Drcs9,
    /// DRCS-10、1バイト符号。
    Drcs10,
    /// DRCS-11、1バイト符号。
    Drcs11,
    /// DRCS-12、1バイト符号。
    Drcs12,
    /// DRCS-13、1バイト符号。
    Drcs13,
    /// DRCS-14、1バイト符号。
    Drcs14,
    /// DRCS-15、1バイト符号。
    Drcs15,
    /// マクロ、1バイト符号。
    Macro,
}

/// 1バイトDRCSの終端バイト0x41～0x4Fに対応する符号集合。
const DRCS_SETS: [GraphicSet; 15] = [
    GraphicSet::Drcs1,
    GraphicSet::Drcs2,
    GraphicSet::Drcs3,
    GraphicSet::Drcs4,
    GraphicSet::Drcs5,
    GraphicSet::Drcs6,
    GraphicSet::Drcs7,
    GraphicSet::Drcs8,
    GraphicSet::Drcs9,
    GraphicSet::Drcs10,
    GraphicSet::Drcs11,
    GraphicSet::Drcs12,
    GraphicSet::Drcs13,
    GraphicSet::Drcs14,
    GraphicSet::Drcs15,
];

impl GraphicSet {
    /// 2バイト符号であるかどうかを返す。
    #[inline]
    pub fn is_two_byte(self) -> bool {
        matches!(
            self,
            GraphicSet::Kanji
                | GraphicSet::JisKanjiPlane1
                | GraphicSet::JisKanjiPlane2
                | GraphicSet::ExtraSymbols
                | GraphicSet::Drcs0
        )
    }

    /// 1バイトGセットの終端バイトから符号集合を得る。
    fn from_one_byte_final(f: u8) -> Option<GraphicSet> {
        Some(match f {
            0x4A => GraphicSet::Alnum,
            0x30 => GraphicSet::Hira,
            0x31 => GraphicSet::Kata,
            0x32 => GraphicSet::MosaicA,
            0x33 => GraphicSet::MosaicB,
            0x34 => GraphicSet::MosaicC,
            0x35 => GraphicSet::MosaicD,
            0x36 => GraphicSet::PropAlnum,
            0x37 => GraphicSet::PropHira,
            0x38 => GraphicSet::PropKata,
            0x49 => GraphicSet::JisXKata,
            _ => return None,
        })
    }

    /// 2バイトGセットの終端バイトから符号集合を得る。
    fn from_two_byte_final(f: u8) -> Option<GraphicSet> {
        Some(match f {
            0x42 => GraphicSet::Kanji,
            0x39 => GraphicSet::JisKanjiPlane1,
            0x3A => GraphicSet::JisKanjiPlane2,
            0x3B => GraphicSet::ExtraSymbols,
            _ => return None,
        })
    }

    /// 1バイトDRCSの終端バイトから符号集合を得る。
    fn from_drcs_final(f: u8) -> Option<GraphicSet> {
        match f {
            0x41..=0x4F => Some(DRCS_SETS[(f - 0x41) as usize]),
            0x70 => Some(GraphicSet::Macro),
            _ => None,
        }
    }
}

/// 8単位符号をデコードする際のオプション。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// 初期状態でG0～G3に指示する符号集合。
    pub graphic_sets: [GraphicSet; 4],

    /// 初期状態でGLに呼び出す符号集合。
    pub gl: Designator,

    /// 初期状態でGRに呼び出す符号集合。
    pub gr: Designator,
}

impl Options {
    /// 通常の符号列をデコードする際のオプション。
    pub const DEFAULT: Options = Options {
        graphic_sets: [
            GraphicSet::Kanji,
            GraphicSet::Alnum,
            GraphicSet::Hira,
            GraphicSet::Kata,
        ],
        gl: Designator::G0,
        gr: Designator::G2,
    };

    /// 字幕の符号列をデコードする際のオプション。
    pub const CAPTION: Options = Options {
        graphic_sets: [
            GraphicSet::Kanji,
            GraphicSet::Alnum,
            GraphicSet::Hira,
            GraphicSet::Macro,
        ],
        gl: Designator::G0,
        gr: Designator::G2,
    };
}

impl Default for Options {
    fn default() -> Self {
        Options::DEFAULT
    }
}

/// デコード中に発生するエラー。
///
/// いずれもその呼び出しにおいて致命的であり、部分的な復旧は行わない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// エスケープシーケンス中に解釈できないバイトがあった。
    #[error("unknown byte {byte:#04X} at step {step} of escape sequence")]
    UnknownEscape {
        /// ESCから数えたバイトの位置（ESC直後が1）。
        step: u8,
        /// 解釈できなかったバイト。
        byte: u8,
    },

    /// 中間バイト列のエスケープシーケンスが不正で、ISO-2022-JPとして変換できなかった。
    #[error("failed to transcode from ISO-2022-JP")]
    Transcode,
}

/// エスケープシーケンスの解釈状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscState {
    /// エスケープシーケンス外。
    Idle,
    /// ESC
    Esc,
    /// ESC 0x28～0x2B
    Designate1(Designator),
    /// ESC 0x24
    Designate2,
    /// ESC 0x24 0x28～0x2B
    Designate2To(Designator),
    /// ESC 0x28～0x2B 0x20
    Drcs1(Designator),
    /// ESC 0x24 0x28～0x2B 0x20
    Drcs2(Designator),
}

/// エスケープシーケンスの1バイトを解釈した結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscAction {
    /// シーケンスが続く。
    Pending(EscState),
    /// GLへの呼び出し。
    InvokeGl(Designator),
    /// GRへの呼び出し。
    InvokeGr(Designator),
    /// シングルシフト。
    SingleShift(Designator),
    /// 符号の指示。
    Designate(Designator, GraphicSet),
}

impl EscState {
    /// 次に読むバイトのESCからの位置を返す。
    fn step(self) -> u8 {
        match self {
            EscState::Idle => 0,
            EscState::Esc => 1,
            EscState::Designate1(_) | EscState::Designate2 => 2,
            EscState::Designate2To(_) | EscState::Drcs1(_) => 3,
            EscState::Drcs2(_) => 4,
        }
    }

    /// 状態`self`でバイト`b`を読んだ際の遷移を返す。
    fn transition(self, b: u8) -> Result<EscAction, DecodeError> {
        let unknown = DecodeError::UnknownEscape {
            step: self.step(),
            byte: b,
        };

        let action = match (self, b) {
            // 符号の呼び出し
            (EscState::Esc, 0x6E) => EscAction::InvokeGl(Designator::G2), // LS2
            (EscState::Esc, 0x6F) => EscAction::InvokeGl(Designator::G3), // LS3
            (EscState::Esc, 0x7E) => EscAction::InvokeGr(Designator::G1), // LS1R
            (EscState::Esc, 0x7D) => EscAction::InvokeGr(Designator::G2), // LS2R
            (EscState::Esc, 0x7C) => EscAction::InvokeGr(Designator::G3), // LS3R
            (EscState::Esc, 0x4E) => EscAction::SingleShift(Designator::G2), // SS2
            (EscState::Esc, 0x4F) => EscAction::SingleShift(Designator::G3), // SS3

            // 符号の指示
            (EscState::Esc, 0x24) => EscAction::Pending(EscState::Designate2),
            (EscState::Esc, 0x28..=0x2B) => {
                EscAction::Pending(EscState::Designate1(Designator::from_intermediate(b)))
            }

            (EscState::Designate1(g), 0x20) => EscAction::Pending(EscState::Drcs1(g)),
            (EscState::Designate1(g), _) => {
                EscAction::Designate(g, GraphicSet::from_one_byte_final(b).ok_or(unknown)?)
            }

            (EscState::Designate2, 0x28..=0x2B) => {
                EscAction::Pending(EscState::Designate2To(Designator::from_intermediate(b)))
            }
            (EscState::Designate2, _) => EscAction::Designate(
                Designator::G0,
                GraphicSet::from_two_byte_final(b).ok_or(unknown)?,
            ),

            (EscState::Designate2To(g), 0x20) => EscAction::Pending(EscState::Drcs2(g)),
            (EscState::Designate2To(g), _) => {
                EscAction::Designate(g, GraphicSet::from_two_byte_final(b).ok_or(unknown)?)
            }

            (EscState::Drcs1(g), _) => {
                EscAction::Designate(g, GraphicSet::from_drcs_final(b).ok_or(unknown)?)
            }
            (EscState::Drcs2(g), 0x40) => EscAction::Designate(g, GraphicSet::Drcs0),

            _ => return Err(unknown),
        };
        Ok(action)
    }
}

/// パラメータを伴う制御符号の読み飛ばし状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    None,
    /// 指定バイト数を読み飛ばす。
    Bytes(u8),
    /// COL/CDC：次が0x20であれば更に1バイト読み飛ばす。
    Extended,
    /// CSI：中間文字と終端文字まで読み飛ばす。
    Csi,
    /// TIME
    Time,
    /// TIME：中間文字まで読み飛ばす。
    TimeUntilSpace,
    /// MACRO：定義開始かどうか。
    Macro,
    /// MACRO：定義終了まで読み飛ばす。直前のバイトがMACROであったかどうかを持つ。
    MacroBody(bool),
}

impl Skip {
    /// 制御符号`b`に続くパラメータの読み飛ばしを開始する。
    fn control(b: u8) -> Option<Skip> {
        Some(match b {
            // PAPF
            0x16 => Skip::Bytes(1),
            // APS
            0x1C => Skip::Bytes(2),
            // COL/CDC
            0x90 | 0x92 => Skip::Extended,
            // SZX/FLC/POL/WMM/HLC/RPC
            0x8B | 0x91 | 0x93 | 0x94 | 0x97 | 0x98 => Skip::Bytes(1),
            // CSI
            0x9B => Skip::Csi,
            // TIME
            0x9D => Skip::Time,
            // MACRO
            0x95 => Skip::Macro,
            _ => return None,
        })
    }

    fn next(self, b: u8) -> Skip {
        match self {
            Skip::None | Skip::Bytes(0 | 1) => Skip::None,
            Skip::Bytes(n) => Skip::Bytes(n - 1),
            Skip::Extended if b == 0x20 => Skip::Bytes(1),
            Skip::Extended => Skip::None,
            Skip::Csi => match b {
                0x20 => Skip::Bytes(1),
                // PLD/PLU/SCS
                0x5B | 0x5C | 0x6F => Skip::None,
                _ => Skip::Csi,
            },
            Skip::Time => match b {
                0x20 | 0x28 => Skip::Bytes(1),
                0x29 => Skip::TimeUntilSpace,
                _ => Skip::None,
            },
            Skip::TimeUntilSpace if b == 0x20 => Skip::Bytes(1),
            Skip::TimeUntilSpace => Skip::TimeUntilSpace,
            Skip::Macro => match b {
                0x40 | 0x41 => Skip::MacroBody(false),
                _ => Skip::None,
            },
            Skip::MacroBody(true) if b == 0x4F => Skip::None,
            Skip::MacroBody(_) => Skip::MacroBody(b == 0x95),
        }
    }
}

/// 中間バイト列における文字の種類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JisMode {
    Ascii,
    Kanji,
    Katakana,
}

impl JisMode {
    fn escape(self) -> &'static [u8] {
        match self {
            JisMode::Ascii => b"\x1B(B",
            JisMode::Kanji => b"\x1B$B",
            JisMode::Katakana => b"\x1B(I",
        }
    }
}

/// 平仮名・片仮名集合の0x79～0x7Eに対応するJIS X 0208の1区の点。
const KANA_SYMBOLS: [u8; 6] = [
    0x3C, // ー
    0x23, // 。
    0x56, // 「
    0x57, // 」
    0x22, // 、
    0x26, // ・
];

/// ARIB STD-B24の8単位符号をデコードする。
///
/// 符号列は[`feed`][Decoder::feed]で分割して与えることができ、
/// [`finish`][Decoder::finish]で文字列を得る。
///
/// # サンプル
///
/// ```
/// use aribts::eight::{Decoder, Options};
///
/// let mut decoder = Decoder::new(Options::DEFAULT);
/// decoder.feed(b"\x46\x7C\x4B\x5C")?;
/// decoder.feed(b"\xCE")?;
/// assert_eq!(decoder.finish()?, "日本の");
/// # Ok::<(), aribts::eight::DecodeError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    graphic_sets: [GraphicSet; 4],
    gl: Designator,
    gr: Designator,
    single_shift: Option<Designator>,

    esc: EscState,
    skip: Skip,
    /// 2バイト符号の1バイト目。
    lead: Option<(GraphicSet, u8)>,

    jis: Vec<u8>,
    mode: JisMode,
}

impl Decoder {
    /// `options`に従いデコードする`Decoder`を生成する。
    pub fn new(options: Options) -> Decoder {
        Decoder {
            graphic_sets: options.graphic_sets,
            gl: options.gl,
            gr: options.gr,
            single_shift: None,
            esc: EscState::Idle,
            skip: Skip::None,
            lead: None,
            jis: Vec::new(),
            mode: JisMode::Ascii,
        }
    }

    /// 現在G0～G3に指示されている符号集合を返す。
    #[inline]
    pub fn graphic_sets(&self) -> &[GraphicSet; 4] {
        &self.graphic_sets
    }

    /// 現在GLに呼び出されている符号を返す。
    #[inline]
    pub fn gl(&self) -> Designator {
        self.gl
    }

    /// 現在GRに呼び出されている符号を返す。
    #[inline]
    pub fn gr(&self) -> Designator {
        self.gr
    }

    /// ここまでに変換されたISO-2022-JPの中間バイト列を返す。
    #[inline]
    pub fn jis_bytes(&self) -> &[u8] {
        &self.jis
    }

    /// 符号列を与える。
    ///
    /// エラーが返された場合、そのエスケープシーケンスは破棄される。
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        for &b in bytes {
            self.feed_byte(b)?;
        }
        Ok(())
    }

    /// 中間バイト列をUTF-8に変換して返す。
    ///
    /// JIS X 0208に対応する文字がない符号は`U+FFFD`に置き換えられる。
    pub fn finish(self) -> Result<String, DecodeError> {
        if self.esc != EscState::Idle || self.lead.is_some() {
            log::trace!("incomplete sequence at end of string");
        }

        transcode(&self.jis)
    }

    fn feed_byte(&mut self, b: u8) -> Result<(), DecodeError> {
        if self.esc != EscState::Idle {
            let state = std::mem::replace(&mut self.esc, EscState::Idle);
            match state.transition(b)? {
                EscAction::Pending(next) => self.esc = next,
                EscAction::InvokeGl(g) => self.gl = g,
                EscAction::InvokeGr(g) => self.gr = g,
                EscAction::SingleShift(g) => self.single_shift = Some(g),
                EscAction::Designate(g, set) => self.graphic_sets[g as usize] = set,
            }
            return Ok(());
        }

        if self.skip != Skip::None {
            self.skip = self.skip.next(b);
            return Ok(());
        }

        if let Some((set, c1)) = self.lead.take() {
            if matches!(b, 0x21..=0x7E | 0xA1..=0xFE) {
                self.put_two_byte(set, c1, b & 0x7F);
                return Ok(());
            }

            // 不明な値は2バイト目として扱わない
            log::trace!("invalid second byte: {:02X}", b);
        }

        match b {
            // GL
            0x21..=0x7E => {
                let g = self.single_shift.take().unwrap_or(self.gl);
                let set = self.graphic_sets[g as usize];
                self.put_graphic(set, b);
            }
            // GR
            0xA1..=0xFE => {
                let set = self.graphic_sets[self.gr as usize];
                self.put_graphic(set, b & 0x7F);
            }

            // SP/TAB
            0x20 | 0xA0 | 0x09 => self.put(JisMode::Ascii, b" "),
            // APR/APD
            0x0D | 0x0A => self.put(JisMode::Ascii, b"\n"),

            0x1B => self.esc = EscState::Esc,
            // LS0
            0x0F => self.gl = Designator::G0,
            // LS1
            0x0E => self.gl = Designator::G1,
            // SS2
            0x19 => self.single_shift = Some(Designator::G2),
            // SS3
            0x1D => self.single_shift = Some(Designator::G3),

            _ => {
                if let Some(skip) = Skip::control(b) {
                    self.skip = skip;
                }
            }
        }
        Ok(())
    }

    fn put(&mut self, mode: JisMode, bytes: &[u8]) {
        if self.mode != mode {
            self.jis.extend_from_slice(mode.escape());
            self.mode = mode;
        }
        self.jis.extend_from_slice(bytes);
    }

    fn put_graphic(&mut self, set: GraphicSet, c: u8) {
        if set.is_two_byte() {
            self.lead = Some((set, c));
            return;
        }

        match set {
            GraphicSet::Alnum | GraphicSet::PropAlnum => self.put(JisMode::Ascii, &[c]),
            GraphicSet::Hira | GraphicSet::PropHira => self.put_kana(0x24, c),
            GraphicSet::Kata | GraphicSet::PropKata => self.put_kana(0x25, c),
            GraphicSet::JisXKata => self.put(JisMode::Katakana, &[c]),
            // モザイク・DRCS・マクロは文字として出力しない
            _ => {}
        }
    }

    fn put_two_byte(&mut self, set: GraphicSet, c1: u8, c2: u8) {
        match set {
            GraphicSet::Kanji | GraphicSet::JisKanjiPlane1 | GraphicSet::JisKanjiPlane2 => {
                self.put(JisMode::Kanji, &[c1, c2])
            }
            // 追加記号はJIS X 0208にないため出力しない
            _ => {}
        }
    }

    /// `row`区の仮名を出力する。0x77以降は記号に置き換える。
    fn put_kana(&mut self, row: u8, c: u8) {
        let code = match (row, c) {
            (0x24, 0x77) => [0x21, 0x35], // ゝ
            (0x24, 0x78) => [0x21, 0x36], // ゞ
            (_, 0x77) => [0x21, 0x33],    // ヽ
            (_, 0x78) => [0x21, 0x34],    // ヾ
            (_, 0x79..=0x7E) => [0x21, KANA_SYMBOLS[(c - 0x79) as usize]],
            _ => [row, c],
        };
        self.put(JisMode::Kanji, &code);
    }
}

/// ISO-2022-JPの`jis`をUTF-8に変換する。
///
/// 対応する文字がない2バイト符号は`U+FFFD`とし、ESCを含む不正なシーケンスはエラーとする。
fn transcode(jis: &[u8]) -> Result<String, DecodeError> {
    let mut decoder = encoding_rs::ISO_2022_JP.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(jis.len())
        .unwrap_or(jis.len() * 3);
    let mut out = String::with_capacity(capacity);

    let mut pos = 0;
    loop {
        let (result, read) =
            decoder.decode_to_string_without_replacement(&jis[pos..], &mut out, true);
        pos += read;

        match result {
            DecoderResult::InputEmpty => return Ok(out),
            DecoderResult::OutputFull => out.reserve((jis.len() - pos) * 3 + 4),
            DecoderResult::Malformed(bad, consumed) => {
                let end = pos.saturating_sub(consumed as usize);
                let start = end.saturating_sub(bad as usize);
                if jis[start..end].contains(&0x1B) {
                    log::debug!("malformed escape sequence at {}", start);
                    return Err(DecodeError::Transcode);
                }

                log::trace!("unmapped character: {:02X?}", &jis[start..end]);
                out.push(char::REPLACEMENT_CHARACTER);
            }
        }
    }
}

/// `options`に従い`bytes`をデコードする。
pub fn decode(bytes: &[u8], options: Options) -> Result<String, DecodeError> {
    let mut decoder = Decoder::new(options);
    decoder.feed(bytes)?;
    decoder.finish()
}
