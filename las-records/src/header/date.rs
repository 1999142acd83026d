//! Creation date of a LAS file.
//!
//! The header stores the date as a year and a day of that year.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Decides which years count as leap years when converting dates.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum LeapYearRule {
    /// Rule used by existing readers of this format:
    /// Years divisible by 400 or by 100 are leap years, all other years are not.
    /// Note that this does NOT match the calendar.
    #[default]
    Compatible,

    /// Proleptic gregorian calendar.
    Gregorian,
}

impl LeapYearRule {
    pub fn is_leap_year(&self, year: i32) -> bool {
        match self {
            LeapYearRule::Compatible => year % 400 == 0 || year % 100 == 0,
            LeapYearRule::Gregorian => (year % 4 == 0 && year % 100 != 0) || year % 400 == 0,
        }
    }
}

/// Converts the (year, day) pair from the header into a date.
///
/// Returns None, if both are zero (no date stored).
pub fn decode_date(year: u16, day: u16, rule: LeapYearRule) -> Option<NaiveDate> {
    if year == 0 && day == 0 {
        return None;
    }
    let year = i32::from(year);
    let days = if rule.is_leap_year(year) {
        i64::from(day) - 1
    } else {
        i64::from(day)
    };
    NaiveDate::from_ymd_opt(year, 1, 1)?.checked_add_signed(Duration::days(days))
}

/// Converts a date into the (year, day) pair stored in the header.
/// This is the inverse of [decode_date].
///
/// Returns None, if the year can not be stored.
pub fn encode_date(date: NaiveDate, rule: LeapYearRule) -> Option<(u16, u16)> {
    let year = u16::try_from(date.year()).ok()?;
    let start_of_year = NaiveDate::from_ymd_opt(date.year(), 1, 1)?;
    let mut days = date.signed_duration_since(start_of_year).num_days();
    if rule.is_leap_year(date.year()) {
        days += 1;
    }
    let day = u16::try_from(days).ok()?;
    Some((year, day))
}

#[cfg(test)]
mod tests {
    use super::{decode_date, encode_date, LeapYearRule};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_no_date() {
        assert_eq!(decode_date(0, 0, LeapYearRule::Compatible), None);
        assert_eq!(decode_date(0, 0, LeapYearRule::Gregorian), None);
    }

    #[test]
    fn test_compatible_rule() {
        let rule = LeapYearRule::Compatible;
        assert!(rule.is_leap_year(2000));
        assert!(rule.is_leap_year(1900));
        assert!(!rule.is_leap_year(2008));
        assert!(!rule.is_leap_year(2011));

        // 2008 is treated as a common year: no adjustment.
        assert_eq!(decode_date(2008, 79, rule), Some(date(2008, 3, 20)));
        // 1900 is treated as a leap year: one day less.
        assert_eq!(decode_date(1900, 60, rule), Some(date(1900, 3, 1)));
        assert_eq!(decode_date(2000, 1, rule), Some(date(2000, 1, 1)));
    }

    #[test]
    fn test_gregorian_rule() {
        let rule = LeapYearRule::Gregorian;
        assert!(rule.is_leap_year(2008));
        assert!(rule.is_leap_year(2000));
        assert!(!rule.is_leap_year(1900));
        assert_eq!(decode_date(2008, 79, rule), Some(date(2008, 3, 19)));
        assert_eq!(decode_date(1900, 60, rule), Some(date(1900, 3, 2)));
    }

    #[test]
    fn test_encode_is_inverse() {
        for rule in [LeapYearRule::Compatible, LeapYearRule::Gregorian] {
            for (year, day) in [(2008, 79), (2000, 1), (1999, 364), (2012, 200)] {
                let d = decode_date(year, day, rule).unwrap();
                assert_eq!(encode_date(d, rule), Some((year, day)));
            }
        }
        assert_eq!(encode_date(date(-5, 1, 1), LeapYearRule::Gregorian), None);
    }
}
