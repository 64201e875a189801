//! Decoding numeric model time into timestamps
//!
//! Climate models usually store time as "days since" a reference date in a
//! calendar that may not have leap days. [`convert_to_datetime`] turns such
//! values into proleptic Gregorian [`NaiveDateTime`]s.
//!
//! # Examples
//!
//! ```rust
//! use chrono::NaiveDate;
//! use climgrid_core::calendar::{convert_to_datetime, Calendar};
//!
//! let dates = convert_to_datetime(
//!     &[3650.0],
//!     "days since 1-1-1 00:00:00",
//!     Calendar::Day365,
//!     None,
//! )
//! .unwrap();
//! let expected = NaiveDate::from_ymd_opt(11, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
//! assert_eq!(dates, vec![expected]);
//! ```

use crate::errors::{GridError, GridResult};
use crate::grid::FloatValue;
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: FloatValue = 86_400.0;

/// Calendars understood by [`convert_to_datetime`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calendar {
    /// Every year has 365 days
    #[serde(rename = "365_day", alias = "noleap", alias = "no_leap")]
    Day365,
    /// Proleptic Gregorian calendar
    #[serde(rename = "gregorian", alias = "standard")]
    Gregorian,
}

impl FromStr for Calendar {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "365_day" | "noleap" | "no_leap" => Ok(Calendar::Day365),
            "gregorian" | "standard" => Ok(Calendar::Gregorian),
            other => Err(GridError::InvalidCalendar(other.to_string())),
        }
    }
}

impl fmt::Display for Calendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Calendar::Day365 => write!(f, "365_day"),
            Calendar::Gregorian => write!(f, "gregorian"),
        }
    }
}

/// A parsed `"days since Y-M-D h:m:s"` units string
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeUnits {
    reference: NaiveDateTime,
}

impl TimeUnits {
    /// Parse a units string such as `"days since 1850-01-01 00:00:00"`
    ///
    /// Only days are supported. The time of day may be omitted, in which
    /// case the reference is midnight. Anything after the time is ignored.
    pub fn parse(units: &str) -> GridResult<Self> {
        let invalid = |reason: &str| GridError::InvalidTimeUnits {
            units: units.to_string(),
            reason: reason.to_string(),
        };

        let words: Vec<&str> = units.split_whitespace().collect();
        if words.len() < 3 || words[0] != "days" || words[1] != "since" {
            return Err(invalid("Failed to decompose units string."));
        }

        let reference_failure = "Failed to identify reference date and time.";
        let [year, month, day] =
            parse_fields::<3>(words[2], '-').ok_or_else(|| invalid(reference_failure))?;
        let [hour, minute, second] = match words.get(3) {
            Some(time) => parse_fields::<3>(time, ':').ok_or_else(|| invalid(reference_failure))?,
            None => [0, 0, 0],
        };

        let date = u32::try_from(month)
            .ok()
            .zip(u32::try_from(day).ok())
            .and_then(|(m, d)| NaiveDate::from_ymd_opt(year, m, d));
        let time = u32::try_from(hour)
            .ok()
            .zip(u32::try_from(minute).ok())
            .zip(u32::try_from(second).ok())
            .and_then(|((h, m), s)| NaiveTime::from_hms_opt(h, m, s));
        match (date, time) {
            (Some(date), Some(time)) => Ok(Self {
                reference: date.and_time(time),
            }),
            _ => Err(invalid(reference_failure)),
        }
    }

    pub fn reference(&self) -> NaiveDateTime {
        self.reference
    }

    /// Move the reference forward to `min_year` if it is earlier
    ///
    /// Month, day and time of day are kept, so a 29 February reference cannot
    /// be moved into a non-leap year.
    pub fn with_min_year(self, min_year: i32) -> GridResult<Self> {
        if self.reference.year() >= min_year {
            return Ok(self);
        }
        let reference = self.reference.with_year(min_year).ok_or_else(|| {
            GridError::InvalidTimeUnits {
                units: self.reference.to_string(),
                reason: format!("Reference date does not exist in year {}.", min_year),
            }
        })?;
        Ok(Self { reference })
    }
}

fn parse_fields<const N: usize>(text: &str, separator: char) -> Option<[i32; N]> {
    let fields: Vec<i32> = text
        .split(separator)
        .map(|field| field.parse().ok())
        .collect::<Option<_>>()?;
    fields.try_into().ok()
}

/// Convert "days since" values into timestamps
///
/// Values must be finite and non-negative. Fractional days are kept to the
/// nearest second. In the [`Calendar::Day365`] calendar every 29 February
/// between the reference and the value is skipped, so that 365 days always
/// advance the date by exactly one year.
///
/// If `min_year` is given and the reference year is earlier, the reference
/// year is replaced by `min_year` (see [`TimeUnits::with_min_year`]).
///
/// # Errors
///
/// * [`GridError::InvalidTimeUnits`] if `units` cannot be parsed
/// * [`GridError::InvalidData`] for negative or non-finite values, or values
///   beyond the representable date range
pub fn convert_to_datetime(
    values: &[FloatValue],
    units: &str,
    calendar: Calendar,
    min_year: Option<i32>,
) -> GridResult<Vec<NaiveDateTime>> {
    let mut units = TimeUnits::parse(units)?;
    if let Some(min_year) = min_year {
        units = units.with_min_year(min_year)?;
    }
    if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
        return Err(GridError::InvalidData(format!(
            "Data must be finite and non-negative, found {}.",
            bad
        )));
    }

    let reference = units.reference();
    values
        .iter()
        .map(|&days| {
            let days = match calendar {
                Calendar::Day365 => skip_leap_days(reference.date(), days),
                Calendar::Gregorian => days,
            };
            add_days(reference, days)
        })
        .collect()
}

/// Add one day for every 29 February reached from `reference`
fn skip_leap_days(reference: NaiveDate, days: FloatValue) -> FloatValue {
    let mut corrected = days;
    for year in reference.year()..=NaiveDate::MAX.year() {
        let leap_day = match NaiveDate::from_ymd_opt(year, 2, 29) {
            Some(date) => date,
            None => continue,
        };
        let offset = (leap_day - reference).num_days();
        if offset < 0 {
            continue;
        }
        if corrected < offset as FloatValue {
            break;
        }
        corrected += 1.0;
    }
    corrected
}

fn add_days(reference: NaiveDateTime, days: FloatValue) -> GridResult<NaiveDateTime> {
    let out_of_range =
        || GridError::InvalidData(format!("{} days after {} is out of range.", days, reference));
    let seconds = (days * SECONDS_PER_DAY).round();
    if seconds > i64::MAX as FloatValue {
        return Err(out_of_range());
    }
    TimeDelta::try_seconds(seconds as i64)
        .and_then(|delta| reference.checked_add_signed(delta))
        .ok_or_else(out_of_range)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    const UNITS: &str = "days since 1-1-1 00:00:00";

    #[test]
    fn calendar_names() {
        assert_eq!("365_day".parse::<Calendar>().unwrap(), Calendar::Day365);
        assert_eq!("noleap".parse::<Calendar>().unwrap(), Calendar::Day365);
        assert_eq!("no_leap".parse::<Calendar>().unwrap(), Calendar::Day365);
        assert_eq!("gregorian".parse::<Calendar>().unwrap(), Calendar::Gregorian);
        assert!(matches!(
            "my_calendar".parse::<Calendar>(),
            Err(GridError::InvalidCalendar(_))
        ));
        assert_eq!(Calendar::Day365.to_string(), "365_day");
    }

    #[test]
    fn invalid_units() {
        for units in [
            "my_calendar",
            "eons since 1-1-1 0:0:0",
            "days since the start",
            "days since 2000-13-01",
            "days since 2000-01-01 25:00:00",
            "days since",
        ] {
            assert!(
                matches!(TimeUnits::parse(units), Err(GridError::InvalidTimeUnits { .. })),
                "{}",
                units
            );
        }
    }

    #[test]
    fn time_of_day_defaults_to_midnight() {
        let units = TimeUnits::parse("days since 1850-01-01").unwrap();
        assert_eq!(units.reference(), datetime(1850, 1, 1, 0));
    }

    #[test]
    fn negative_and_nan_data_rejected() {
        for value in [-1.0, f64::NAN, f64::INFINITY] {
            let result = convert_to_datetime(&[value], UNITS, Calendar::Day365, None);
            assert!(matches!(result, Err(GridError::InvalidData(_))));
        }
    }

    #[test]
    fn gregorian_counts_leap_days() {
        // Two leap years in the period
        let result = convert_to_datetime(&[365.0 * 10.0 + 2.0], UNITS, Calendar::Gregorian, None);
        assert_eq!(result.unwrap(), vec![datetime(11, 1, 1, 0)]);
    }

    #[test]
    fn day365_whole_years() {
        let result = convert_to_datetime(&[365.0 * 10.0], UNITS, Calendar::Day365, None);
        assert_eq!(result.unwrap(), vec![datetime(11, 1, 1, 0)]);
    }

    #[test]
    fn day365_partial_day() {
        let result = convert_to_datetime(&[365.0 * 1970.0 + 1.5], UNITS, Calendar::Day365, None);
        assert_eq!(result.unwrap(), vec![datetime(1971, 1, 2, 12)]);
    }

    #[test]
    fn day365_several_values() {
        let values = [3648.0, 3650.0, 3652.0];
        let from_year_one = convert_to_datetime(&values, UNITS, Calendar::Day365, None).unwrap();
        assert_eq!(
            from_year_one,
            vec![datetime(10, 12, 30, 0), datetime(11, 1, 1, 0), datetime(11, 1, 3, 0)]
        );

        let from_2000 = convert_to_datetime(
            &values,
            "days since 2000-01-01 00:00:00",
            Calendar::Day365,
            None,
        )
        .unwrap();
        assert_eq!(
            from_2000,
            vec![datetime(2009, 12, 30, 0), datetime(2010, 1, 1, 0), datetime(2010, 1, 3, 0)]
        );
    }

    #[test]
    fn day365_never_lands_on_leap_day() {
        // 2000-01-01 + 59 days is 29 February in the Gregorian calendar
        let result = convert_to_datetime(
            &[58.0, 59.0],
            "days since 2000-01-01 00:00:00",
            Calendar::Day365,
            None,
        )
        .unwrap();
        assert_eq!(result, vec![datetime(2000, 2, 28, 0), datetime(2000, 3, 1, 0)]);
    }

    #[test]
    fn min_year_moves_reference_forward() {
        let result = convert_to_datetime(&[0.0, 365.0], UNITS, Calendar::Day365, Some(1701));
        assert_eq!(
            result.unwrap(),
            vec![datetime(1701, 1, 1, 0), datetime(1702, 1, 1, 0)]
        );

        // Already later than min_year
        let result = convert_to_datetime(
            &[0.0],
            "days since 1850-06-01 00:00:00",
            Calendar::Day365,
            Some(1701),
        );
        assert_eq!(result.unwrap(), vec![datetime(1850, 6, 1, 0)]);
    }

    #[test]
    fn empty_input() {
        let result = convert_to_datetime(&[], UNITS, Calendar::Gregorian, None).unwrap();
        assert!(result.is_empty());
    }
}
