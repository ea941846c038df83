use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::DomainError;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time zone every "today" and day-difference computation is pinned to, so
/// results agree regardless of the machine's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    tz: Tz,
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self {
            tz: chrono_tz::Asia::Kolkata,
        }
    }
}

impl fmt::Display for ReferenceZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tz.name())
    }
}

impl ReferenceZone {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn from_name(name: &str) -> Result<Self, DomainError> {
        Tz::from_str(name.trim())
            .map(Self::new)
            .map_err(|_| DomainError::UnknownTimeZone(name.to_string()))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn moment(&self, instant: DateTime<Utc>) -> Moment {
        Moment {
            instant,
            local: instant.with_timezone(&self.tz).naive_local(),
        }
    }

    /// Builds a moment from a wall-clock reading in this zone. Returns `None`
    /// for readings skipped by a DST transition.
    pub fn moment_at(&self, local: NaiveDateTime) -> Option<Moment> {
        let zoned = self.tz.from_local_datetime(&local).earliest()?;
        Some(self.moment(zoned.with_timezone(&Utc)))
    }

    pub fn today(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.moment(instant).today()
    }
}

/// An instant paired with its wall-clock reading in the reference zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    instant: DateTime<Utc>,
    local: NaiveDateTime,
}

impl Moment {
    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn local(&self) -> NaiveDateTime {
        self.local
    }

    pub fn today(&self) -> NaiveDate {
        self.local.date()
    }
}

/// Signed whole-day count `b - a`.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    b.signed_duration_since(a).num_days()
}

/// Parses exactly `YYYY-MM-DD`: the date must format back to the input
/// unchanged.
pub fn parse_date(input: &str) -> Result<NaiveDate, DomainError> {
    let invalid = |source| DomainError::InvalidDate {
        input: input.to_string(),
        source,
    };
    let date = NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|err| invalid(Some(err)))?;
    if format_date(date) != input {
        return Err(invalid(None));
    }
    Ok(date)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Accepts `07:30 AM` style readings as well as 24-hour `19:30`.
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, DomainError> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();
    ["%I:%M %p", "%I:%M%p", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(&upper, format).ok())
        .ok_or_else(|| DomainError::InvalidTimeOfDay(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn today_follows_reference_zone_not_utc() {
        let zone = ReferenceZone::default();
        // 20:00 UTC is already 01:30 the next day in Kolkata.
        let instant = Utc.with_ymd_and_hms(2024, 6, 9, 20, 0, 0).unwrap();
        assert_eq!(zone.today(instant), date(2024, 6, 10));

        let utc_zone = ReferenceZone::from_name("UTC").unwrap();
        assert_eq!(utc_zone.today(instant), date(2024, 6, 9));
    }

    #[test]
    fn days_between_ignores_time_of_day() {
        let zone = ReferenceZone::default();
        let today = zone
            .moment_at(date(2024, 6, 9).and_hms_opt(12, 0, 0).unwrap())
            .unwrap()
            .today();
        let early = zone
            .moment_at(date(2024, 6, 10).and_hms_opt(0, 1, 0).unwrap())
            .unwrap()
            .today();
        let late = zone
            .moment_at(date(2024, 6, 10).and_hms_opt(23, 59, 0).unwrap())
            .unwrap()
            .today();
        assert_eq!(days_between(today, early), 1);
        assert_eq!(days_between(today, late), 1);
        assert_eq!(days_between(late, today), -1);
    }

    #[test]
    fn parse_date_reports_malformed_input() {
        assert_eq!(parse_date("2024-01-03").unwrap(), date(2024, 1, 3));
        let err = parse_date("2024-13-01").unwrap_err();
        assert!(matches!(err, DomainError::InvalidDate { ref input, .. } if input == "2024-13-01"));
        assert!(parse_date("03/01/2024").is_err());
        assert!(parse_date("").is_err());
        for loose in ["2024-1-3", " 2024-01-03 ", "+2024-01-03", "2024-01-3", "02024-01-03"] {
            assert!(
                matches!(parse_date(loose), Err(DomainError::InvalidDate { ref input, .. }) if input == loose),
                "{loose:?} should be rejected"
            );
        }
    }

    #[test]
    fn parses_both_clock_styles() {
        assert_eq!(
            parse_time_of_day("07:30 AM").unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("7:05 pm").unwrap(),
            NaiveTime::from_hms_opt(19, 5, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day("21:15").unwrap(),
            NaiveTime::from_hms_opt(21, 15, 0).unwrap()
        );
        assert!(parse_time_of_day("half past seven").is_err());
    }

    #[test]
    fn rejects_unknown_zone_names() {
        assert!(matches!(
            ReferenceZone::from_name("Mars/Olympus"),
            Err(DomainError::UnknownTimeZone(_))
        ));
        assert_eq!(
            ReferenceZone::from_name("Europe/Berlin").unwrap().to_string(),
            "Europe/Berlin"
        );
    }
}
