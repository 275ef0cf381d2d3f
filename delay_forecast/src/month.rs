//! Calendar month arithmetic

use crate::error::{ForecastError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Years a reporting month may fall in
pub const YEAR_RANGE: RangeInclusive<i32> = 1900..=2200;

/// A calendar month, ordered chronologically
///
/// Serialized as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(ForecastError::InvalidParameter(format!(
                "Month must be between 1 and 12, got {}",
                month
            )));
        }
        if !YEAR_RANGE.contains(&year) {
            return Err(ForecastError::InvalidParameter(format!(
                "Year must be between {} and {}, got {}",
                YEAR_RANGE.start(),
                YEAR_RANGE.end(),
                year
            )));
        }
        Ok(Self { year, month })
    }

    /// Inverse of [`YearMonth::ordinal`]
    pub fn from_ordinal(ordinal: i32) -> Self {
        Self {
            year: ordinal.div_euclid(12),
            month: ordinal.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month())
    }

    /// Parse a reporting period: `202506`, `2025-06`, `2025/06` or `2025-06-01`
    pub fn parse_period(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let invalid = || ForecastError::DataError(format!("Invalid reporting period: {:?}", raw));

        // Integer periods sometimes arrive as floats, e.g. "202506.0"
        let compact = trimmed.strip_suffix(".0").unwrap_or(trimmed);
        if compact.len() == 6 && compact.chars().all(|c| c.is_ascii_digit()) {
            let year = compact[..4].parse::<i32>().map_err(|_| invalid())?;
            let month = compact[4..].parse::<u32>().map_err(|_| invalid())?;
            return Self::new(year, month).map_err(|_| invalid());
        }

        let mut parts = trimmed.split(|c| c == '-' || c == '/');
        let year = parts
            .next()
            .and_then(|p| p.parse::<i32>().ok())
            .ok_or_else(invalid)?;
        let month = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        Self::new(year, month).map_err(|_| invalid())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Months since year zero; consecutive months differ by one
    pub fn ordinal(&self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }

    /// The month `months` after this one (negative goes back)
    pub fn plus(&self, months: i32) -> Self {
        Self::from_ordinal(self.ordinal() + months)
    }

    pub fn succ(&self) -> Self {
        self.plus(1)
    }

    /// Signed number of months from `self` to `later`
    pub fn months_until(&self, later: YearMonth) -> i32 {
        later.ordinal() - self.ordinal()
    }

    /// First day of the month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// Compact `YYYYMM` form used by the raw reports
    pub fn period_code(&self) -> u32 {
        self.year as u32 * 100 + self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_period(s)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse_period(&value)
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("202506", 2025, 6)]
    #[case("202506.0", 2025, 6)]
    #[case("2025-06", 2025, 6)]
    #[case("2025/6", 2025, 6)]
    #[case("2025-06-01", 2025, 6)]
    #[case(" 201912 ", 2019, 12)]
    fn test_parse_period(#[case] raw: &str, #[case] year: i32, #[case] month: u32) {
        let parsed = YearMonth::parse_period(raw).unwrap();
        assert_eq!(parsed, YearMonth::new(year, month).unwrap());
    }

    #[rstest]
    #[case("")]
    #[case("202513")]
    #[case("June 2025")]
    #[case("2025")]
    #[case("-2024-06")]
    #[case("0001-06")]
    #[case("999912")]
    fn test_parse_period_rejects(#[case] raw: &str) {
        assert!(YearMonth::parse_period(raw).is_err());
    }

    #[test]
    fn test_year_out_of_range() {
        assert!(matches!(
            YearMonth::new(-2024, 6),
            Err(ForecastError::InvalidParameter(_))
        ));
        assert!(YearMonth::new(i32::MAX, 1).is_err());
        assert!(YearMonth::from_date(NaiveDate::MIN).is_err());
        assert!(YearMonth::new(2200, 12).is_ok());
    }

    #[test]
    fn test_month_arithmetic() {
        let nov = YearMonth::new(2024, 11).unwrap();
        assert_eq!(nov.plus(2), YearMonth::new(2025, 1).unwrap());
        assert_eq!(nov.plus(-11), YearMonth::new(2023, 12).unwrap());
        assert_eq!(nov.succ().succ(), nov.plus(2));
        assert_eq!(nov.months_until(YearMonth::new(2025, 3).unwrap()), 4);
        assert_eq!(YearMonth::from_ordinal(nov.ordinal()), nov);
    }

    #[test]
    fn test_display_and_dates() {
        let month = YearMonth::new(2025, 6).unwrap();
        assert_eq!(month.to_string(), "2025-06");
        assert_eq!(month.period_code(), 202506);
        assert_eq!(month.first_day(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert_eq!(YearMonth::from_date(month.first_day()).unwrap(), month);
    }

    #[test]
    fn test_serde_as_string() {
        let month = YearMonth::new(2023, 2).unwrap();
        let json = serde_json::to_string(&month).unwrap();
        assert_eq!(json, "\"2023-02\"");
        let back: YearMonth = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month);
    }
}
