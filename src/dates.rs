//! Record dates arrive either as ISO-8601 (`2026-02-03`, `2026-02-03T18:30:00Z`)
//! or as `DD/MM/YYYY`. Precedence: a value containing `/` is read as
//! day-first and nothing else; every other value is tried as RFC 3339, then
//! as a naive ISO datetime, then as an ISO date.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RankingError, Result};

const SLASH_FORMAT: &str = "%d/%m/%Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";
const ISO_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_record_date(raw: &str) -> Result<NaiveDate> {
    let value = raw.trim();

    if value.contains('/') {
        return NaiveDate::parse_from_str(value, SLASH_FORMAT)
            .map_err(|_| RankingError::DateParse(raw.to_string()));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.date_naive());
    }

    for format in ISO_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed.date());
        }
    }

    NaiveDate::parse_from_str(value, ISO_DATE_FORMAT)
        .map_err(|_| RankingError::DateParse(raw.to_string()))
}

/// Like [`parse_record_date`], but keeps the time of full RFC 3339 values.
/// Date-only values land at midnight UTC.
pub fn parse_record_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw.trim()) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let date = parse_record_date(raw)?;
    Ok(date.and_time(NaiveTime::MIN).and_utc())
}

pub fn cutoff_date(since_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(since_days.max(1))
}

/// Inclusive date window. The upper bound covers the whole end day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        true
    }

    pub fn contains_timestamp(&self, timestamp: DateTime<Utc>) -> bool {
        self.contains_date(timestamp.date_naive())
    }

    /// Window check for a raw collaborator date. Missing or unparsable dates
    /// keep the record.
    pub fn admits_raw(&self, raw: Option<&str>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(raw) = raw.filter(|value| !value.trim().is_empty()) else {
            return true;
        };
        match parse_record_date(raw) {
            Ok(date) => self.contains_date(date),
            Err(err) => {
                tracing::warn!(%err, "keeping record with unparsable date unfiltered");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_both_formats() {
        assert_eq!(parse_record_date("2026-02-03").unwrap(), date(2026, 2, 3));
        assert_eq!(parse_record_date("03/02/2026").unwrap(), date(2026, 2, 3));
        assert_eq!(
            parse_record_date("2026-02-03T23:15:00Z").unwrap(),
            date(2026, 2, 3)
        );
        assert_eq!(
            parse_record_date("2026-02-03 08:00:00").unwrap(),
            date(2026, 2, 3)
        );
    }

    #[test]
    fn slash_dates_are_day_first() {
        assert!(parse_record_date("13/01/2026").is_ok());
        assert!(parse_record_date("01/13/2026").is_err());
    }

    #[test]
    fn timestamps_keep_time_when_present() {
        let full = parse_record_timestamp("2026-02-03T18:30:00-03:00").unwrap();
        assert_eq!(full.to_rfc3339(), "2026-02-03T21:30:00+00:00");
        let day = parse_record_timestamp("03/02/2026").unwrap();
        assert_eq!(day.to_rfc3339(), "2026-02-03T00:00:00+00:00");
    }

    #[test]
    fn upper_bound_covers_whole_day() {
        let window = DateWindow::new(Some(date(2026, 1, 1)), Some(date(2026, 1, 31)));
        assert!(window.admits_raw(Some("2026-01-31T23:59:59Z")));
        assert!(window.admits_raw(Some("31/01/2026")));
        assert!(!window.admits_raw(Some("2026-02-01")));
        assert!(!window.admits_raw(Some("31/12/2025")));
    }

    #[test]
    fn cutoff_date_respects_since_days() {
        let expected = Utc::now().date_naive() - Duration::days(14);
        assert_eq!(cutoff_date(14), expected);
        assert_eq!(cutoff_date(0), Utc::now().date_naive() - Duration::days(1));
    }

    #[test]
    fn unparsable_dates_are_kept() {
        let window = DateWindow::new(Some(date(2026, 1, 1)), None);
        assert!(window.admits_raw(Some("ontem")));
        assert!(window.admits_raw(None));
    }
}
