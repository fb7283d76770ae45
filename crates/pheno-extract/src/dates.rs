//! Event-date policies shared by the strategies.
//!
//! Every policy returns a concrete date; anything unknown or out of range
//! collapses to [`sentinel_date`].

use chrono::{Datelike, NaiveDate};
use pheno_model::sentinel_date;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d", "%Y-%m-%d %H:%M:%S"];

/// Parses the date layouts found in source extracts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// January 1 of the rounded year, or the sentinel for non-positive input.
pub fn year_date(year: Option<f64>) -> NaiveDate {
    let Some(year) = year.filter(|y| y.is_finite() && *y > 0.0) else {
        return sentinel_date();
    };
    let rounded = year.round();
    if rounded < 1.0 || rounded > f64::from(i32::MAX) {
        return sentinel_date();
    }
    NaiveDate::from_ymd_opt(rounded as i32, 1, 1)
        .filter(|date| date.year() >= 1)
        .unwrap_or_else(sentinel_date)
}

/// Approximate event date from an age at event and a year of birth.
pub fn age_date(year_of_birth: Option<i64>, age: Option<f64>) -> NaiveDate {
    match (year_of_birth, age) {
        (Some(yob), Some(age)) if age.is_finite() && age > 0.0 => year_date(Some(yob as f64 + age)),
        _ => sentinel_date(),
    }
}

/// First present candidate, else the sentinel.
pub fn first_present<I>(candidates: I) -> NaiveDate
where
    I: IntoIterator<Item = Option<NaiveDate>>,
{
    candidates
        .into_iter()
        .flatten()
        .next()
        .unwrap_or_else(sentinel_date)
}
