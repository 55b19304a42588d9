//! MPEG2-TSにおける日付時刻。

use std::fmt::{self, Write};

use crate::psi::Section;
use crate::utils::{read_bcd_digit, BytesExt};

fn write_hundreds<W: Write>(w: &mut W, n: u8) -> fmt::Result {
    let h = b'0' + n / 10;
    let l = b'0' + n % 10;
    w.write_char(h as char)?;
    w.write_char(l as char)
}

/// 修正ユリウス日から求めた日付。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MjdDate {
    /// 年。
    pub year: u16,
    /// 月（1月＝1、12月＝12）。
    pub month: u8,
    /// 日（1～31）。
    pub day: u8,
}

impl MjdDate {
    /// 修正ユリウス日から`MjdDate`を生成する。
    pub fn from_mjd(mjd: u16) -> MjdDate {
        // 0000-03-01を起点とした日数から暦日を求める
        let days = mjd as i32 - 40587 + 719468;
        let era = days.div_euclid(146097);
        let doe = days.rem_euclid(146097);
        let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
        let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
        let mp = (5 * doy + 2) / 153;
        let day = doy - (153 * mp + 2) / 5 + 1;
        let month = if mp < 10 { mp + 3 } else { mp - 9 };
        let year = yoe + era * 400 + (month <= 2) as i32;

        MjdDate {
            year: year as u16,
            month: month as u8,
            day: day as u8,
        }
    }

    /// `data`から`MjdDate`を読み取る。
    #[inline]
    pub fn read(data: &[u8; 2]) -> MjdDate {
        MjdDate::from_mjd(data.read_be_16())
    }

    /// 曜日（月曜日＝1、日曜日＝7）を返す。
    pub fn day_of_week(&self) -> u8 {
        let mjd = self.to_mjd();
        ((mjd as u32 + 2) % 7 + 1) as u8
    }

    /// 修正ユリウス日を返す。
    pub fn to_mjd(&self) -> u16 {
        let y = self.year as i32 - (self.month <= 2) as i32;
        let era = y.div_euclid(400);
        let yoe = y.rem_euclid(400);
        let m = self.month as i32;
        let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + self.day as i32 - 1;
        let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
        (era * 146097 + doe - 719468 + 40587) as u16
    }
}

impl fmt::Debug for MjdDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.year, f)?;

        f.write_char('-')?;
        write_hundreds(f, self.month)?;

        f.write_char('-')?;
        write_hundreds(f, self.day)
    }
}

impl fmt::Display for MjdDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 修正ユリウス日と日本標準時からなる日付時刻。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    /// 日付。
    pub date: MjdDate,
    /// 時（0～23）。
    pub hour: u8,
    /// 分（0～59）。
    pub minute: u8,
    /// 秒（0～60）。
    pub second: u8,
}

impl DateTime {
    /// `data`から`DateTime`を読み取る。
    ///
    /// 時分秒がBCDとして不正な場合（未定義を示す全ビット1を含む）は`None`を返す。
    pub fn read(data: &[u8; 5]) -> Option<DateTime> {
        let date = MjdDate::from_mjd(data[0..=1].read_be_16());
        let hour = read_bcd_digit(data[2]).filter(|&h| h < 24)?;
        let minute = read_bcd_digit(data[3]).filter(|&m| m < 60)?;
        let second = read_bcd_digit(data[4]).filter(|&s| s <= 60)?;

        Some(DateTime {
            date,
            hour,
            minute,
            second,
        })
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.date, f)?;
        f.write_char(' ')?;

        write_hundreds(f, self.hour)?;
        f.write_char(':')?;
        write_hundreds(f, self.minute)?;
        f.write_char(':')?;
        write_hundreds(f, self.second)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// TDT（Time Date Table）およびTOT（Time Offset Table）の現在日付時刻。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeDate {
    /// 現在日付時刻（日本標準時）。
    pub jst_time: DateTime,
}

impl TimeDate {
    /// TDTのテーブル識別。
    pub const TDT_TABLE_ID: u8 = 0x70;
    /// TOTのテーブル識別。
    pub const TOT_TABLE_ID: u8 = 0x73;

    /// `section`からTDTまたはTOTの日付時刻を読み取る。
    pub fn read(section: &Section) -> Option<TimeDate> {
        if !matches!(
            section.table_id(),
            Self::TDT_TABLE_ID | Self::TOT_TABLE_ID
        ) {
            log::debug!("invalid TDT::table_id");
            return None;
        }

        let Some(data) = section.data().get(..5) else {
            log::debug!("invalid TDT");
            return None;
        };
        let jst_time = DateTime::read(data.try_into().ok()?)?;
        Some(TimeDate { jst_time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mjd_date() {
        // MJD = 45218
        let date = MjdDate::read(&[0xB0, 0xA2]);
        assert_eq!(date.year, 1982);
        assert_eq!(date.month, 9);
        assert_eq!(date.day, 6);
        assert_eq!(date.day_of_week(), 1);
        assert_eq!(date.to_string(), "1982-09-06");
        assert_eq!(date.to_mjd(), 45218);

        let date = MjdDate::from_mjd(0xC079);
        assert_eq!(date.to_string(), "1993-10-13");
        assert_eq!(date.day_of_week(), 3);

        // 閏日
        assert_eq!(MjdDate::from_mjd(60003).to_string(), "2023-02-28");
        assert_eq!(MjdDate::from_mjd(60004).to_string(), "2023-03-01");
        assert_eq!(MjdDate::from_mjd(60369).to_string(), "2024-02-29");
        assert_eq!(MjdDate::from_mjd(60370).to_string(), "2024-03-01");
        assert_eq!(MjdDate::from_mjd(60369).to_mjd(), 60369);
    }

    #[test]
    fn test_date_time() {
        let dt = DateTime::read(&[0xB0, 0xA2, 0x12, 0x34, 0x56]).unwrap();
        assert_eq!(dt.date.year, 1982);
        assert_eq!(dt.date.month, 9);
        assert_eq!(dt.date.day, 6);
        assert_eq!(dt.hour, 12);
        assert_eq!(dt.minute, 34);
        assert_eq!(dt.second, 56);
        assert_eq!(dt.to_string(), "1982-09-06 12:34:56");

        assert_eq!(DateTime::read(&[0xFF; 5]), None);
        assert_eq!(DateTime::read(&[0xB0, 0xA2, 0x24, 0x00, 0x00]), None);
    }

    #[test]
    fn test_time_date() {
        let buf = [0x70, 0x70, 0x05, 0xE6, 0xFF, 0x21, 0x09, 0x45];
        let section = Section::parse(&buf, true).unwrap();
        let tdt = TimeDate::read(&section).unwrap();
        assert_eq!(tdt.jst_time.to_string(), "2020-10-13 21:09:45");

        let buf = [0x70, 0x70, 0x02, 0xE6, 0xFF];
        let section = Section::parse(&buf, true).unwrap();
        assert_eq!(TimeDate::read(&section), None);
    }
}
