//! Earliest occurrence of each phenotype per subject.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use pheno_model::{CanonicalEvent, FieldId, MISSING_DATE_MARKERS, SourceCategory};

/// Earliest event of one (subject, phenotype, field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstEvent {
    pub eid: i64,
    pub phenotype: String,
    pub field_id: FieldId,
    pub source: SourceCategory,
    pub event_date: NaiveDate,
}

fn marker(index: usize) -> Option<NaiveDate> {
    let (y, m, d) = MISSING_DATE_MARKERS.get(index).copied()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

fn is_missing_marker(date: NaiveDate) -> bool {
    (0..MISSING_DATE_MARKERS.len()).any(|i| marker(i) == Some(date))
}

/// Markers that birth-date clamping leaves in place.
fn is_undated_marker(date: NaiveDate) -> bool {
    marker(0) == Some(date) || marker(1) == Some(date)
}

/// Reduce events to the earliest date per (subject, phenotype, field).
///
/// When a birth date is known for the subject, dated events on or before
/// it are moved to the birth date.
pub fn first_events(
    events: &[CanonicalEvent],
    births: &HashMap<i64, NaiveDate>,
) -> Vec<FirstEvent> {
    let mut earliest: BTreeMap<(i64, String, FieldId), NaiveDate> = BTreeMap::new();
    for event in events {
        let date = match births.get(&event.eid) {
            Some(&birth) if event.event_date <= birth && !is_undated_marker(event.event_date) => {
                birth
            }
            _ => event.event_date,
        };
        earliest
            .entry((event.eid, event.phenotype.clone(), event.field_id))
            .and_modify(|current| *current = (*current).min(date))
            .or_insert(date);
    }
    earliest
        .into_iter()
        .map(|((eid, phenotype, field_id), event_date)| FirstEvent {
            eid,
            phenotype,
            field_id,
            source: field_id.source_category(),
            event_date,
        })
        .collect()
}

/// One row per (subject, phenotype): the earliest reliably dated source.
pub fn earliest_per_phenotype(first: &[FirstEvent]) -> Vec<FirstEvent> {
    let mut earliest: BTreeMap<(i64, &str), &FirstEvent> = BTreeMap::new();
    for row in first.iter().filter(|row| !is_missing_marker(row.event_date)) {
        earliest
            .entry((row.eid, row.phenotype.as_str()))
            .and_modify(|current| {
                if row.event_date < current.event_date {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    earliest.into_values().cloned().collect()
}
