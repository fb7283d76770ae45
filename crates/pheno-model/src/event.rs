use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ids::FieldId;

/// Placeholder date for facts without a reliable occurrence date.
pub fn sentinel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Dates that stand in for "unknown" in source data and event tables.
pub const MISSING_DATE_MARKERS: [(i32, u32, u32); 3] = [(1900, 1, 1), (1901, 1, 1), (2037, 7, 7)];

/// The row every extraction strategy emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub eid: i64,
    pub phenotype: String,
    pub field_id: FieldId,
    /// Matched code, or the raw value for biomarker fields.
    pub field_value: String,
    /// Always set; undated facts carry [`sentinel_date`].
    pub event_date: NaiveDate,
    pub data_value: Option<f64>,
}

impl CanonicalEvent {
    pub fn new(
        eid: i64,
        phenotype: impl Into<String>,
        field_id: FieldId,
        field_value: impl Into<String>,
        event_date: NaiveDate,
    ) -> Self {
        Self {
            eid,
            phenotype: phenotype.into(),
            field_id,
            field_value: field_value.into(),
            event_date,
            data_value: None,
        }
    }

    #[must_use]
    pub fn with_data_value(mut self, value: Option<f64>) -> Self {
        self.data_value = value;
        self
    }

    pub fn is_undated(&self) -> bool {
        self.event_date == sentinel_date()
    }

    pub fn key(&self) -> ExtractionKey {
        ExtractionKey::new(self.phenotype.clone(), self.field_id)
    }
}

/// Granularity of idempotent extraction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtractionKey {
    pub phenotype: String,
    pub field_id: FieldId,
}

impl ExtractionKey {
    pub fn new(phenotype: impl Into<String>, field_id: FieldId) -> Self {
        Self {
            phenotype: phenotype.into(),
            field_id,
        }
    }
}

impl fmt::Display for ExtractionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.phenotype, self.field_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_first_missing_marker() {
        let (y, m, d) = MISSING_DATE_MARKERS[0];
        assert_eq!(sentinel_date(), NaiveDate::from_ymd_opt(y, m, d).unwrap());
        let event = CanonicalEvent::new(1, "asthma", FieldId::new(41202), "J45", sentinel_date());
        assert!(event.is_undated());
        assert_eq!(event.key().to_string(), "asthma/41202");
    }
}
