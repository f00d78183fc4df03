//! Timestamp encodings shared by the metadata records.
//!
//! Two textual forms exist:
//!
//! - the compact `"Y/M/D H:M:S microsecond"` form with unpadded components
//!   used inside document records (e.g. `2016/1/2 3:4:5 123456`), and
//! - the calendar-component form used by the repository metadata record,
//!   where each component is its own property in a section.
//!
//! Parsing splits on the separators and reads the seven components
//! individually, so both padded and unpadded digits are accepted.

use crate::{RepoResult, RepositoryError};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use edr_inifmt::IniSection;

/// The Unix epoch, used as the never-backed-up sentinel.
pub fn epoch() -> NaiveDateTime {
    chrono::DateTime::UNIX_EPOCH.naive_utc()
}

/// The current UTC time truncated to microseconds, the finest resolution
/// either textual form carries. Entities must capture their timestamps
/// through this so a persisted-then-loaded value compares equal.
pub fn now_micros() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now - Duration::nanoseconds(i64::from(now.nanosecond() % 1_000))
}

/// Renders a timestamp in the compact unpadded form.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    format!(
        "{}/{}/{} {}:{}:{} {}",
        ts.year(),
        ts.month(),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.nanosecond() / 1_000
    )
}

/// Parses a timestamp in the compact unpadded form.
///
/// # Errors
///
/// Returns `RepositoryError::MalformedRecord` if the value does not consist
/// of a `Y/M/D` date, an `H:M:S` time and a microsecond count, or if the
/// components do not form a valid calendar date and time.
pub fn parse_timestamp(value: &str) -> RepoResult<NaiveDateTime> {
    let malformed = || RepositoryError::MalformedRecord(format!("invalid timestamp {value:?}"));

    let mut parts = value.split_whitespace();
    let date_part = parts.next().ok_or_else(malformed)?;
    let time_part = parts.next().ok_or_else(malformed)?;
    let micro_part = parts.next().ok_or_else(malformed)?;
    if parts.next().is_some() {
        return Err(malformed());
    }

    let date_fields: Vec<&str> = date_part.split('/').collect();
    let time_fields: Vec<&str> = time_part.split(':').collect();
    if date_fields.len() != 3 || time_fields.len() != 3 {
        return Err(malformed());
    }

    let number = |field: &str| field.parse::<u32>().map_err(|_| malformed());
    let year = date_fields[0].parse::<i32>().map_err(|_| malformed())?;
    let date = NaiveDate::from_ymd_opt(year, number(date_fields[1])?, number(date_fields[2])?)
        .ok_or_else(malformed)?;
    date.and_hms_micro_opt(
        number(time_fields[0])?,
        number(time_fields[1])?,
        number(time_fields[2])?,
        number(micro_part)?,
    )
    .ok_or_else(malformed)
}

/// Breaks a timestamp into the calendar-component property set used by the
/// repository metadata record.
pub fn to_components(ts: &NaiveDateTime) -> IniSection {
    IniSection::from([
        ("year".to_owned(), ts.year().to_string()),
        ("month".to_owned(), ts.month().to_string()),
        ("day".to_owned(), ts.day().to_string()),
        ("hour".to_owned(), ts.hour().to_string()),
        ("minute".to_owned(), ts.minute().to_string()),
        ("second".to_owned(), ts.second().to_string()),
        (
            "microsecond".to_owned(),
            (ts.nanosecond() / 1_000).to_string(),
        ),
    ])
}

/// Reassembles a timestamp from a calendar-component property set.
///
/// # Errors
///
/// Returns `RepositoryError::MalformedRecord` if a component is missing,
/// non-numeric or out of calendar range.
pub fn from_components(section: &IniSection) -> RepoResult<NaiveDateTime> {
    fn field(section: &IniSection, name: &str) -> RepoResult<u32> {
        section
            .get(name)
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| {
                RepositoryError::MalformedRecord(format!(
                    "missing or non-numeric timestamp component {name:?}"
                ))
            })
    }

    let year: i32 = section
        .get("year")
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            RepositoryError::MalformedRecord("missing or non-numeric timestamp component \"year\"".into())
        })?;

    NaiveDate::from_ymd_opt(year, field(section, "month")?, field(section, "day")?)
        .and_then(|date| {
            date.and_hms_micro_opt(
                field(section, "hour").ok()?,
                field(section, "minute").ok()?,
                field(section, "second").ok()?,
                field(section, "microsecond").ok()?,
            )
        })
        .ok_or_else(|| {
            RepositoryError::MalformedRecord("timestamp components out of range".into())
        })
}
