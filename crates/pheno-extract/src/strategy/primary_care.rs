use pheno_model::{CanonicalEvent, FieldId, Predicate, sentinel_date};
use polars::prelude::col;

use crate::error::ExtractError;
use crate::frame::{TableView, dates, flags, integer, ints, strings};
use crate::source::{SourceTable, SourceTables};
use crate::strategy::{INCIDENT, Target, two_pass};

/// GP clinical events by Read code membership. Codes are already cut to
/// five characters, so no pattern matching is needed.
pub(super) fn diagnoses(
    field_id: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let view = TableView::open(tables, SourceTable::GpClinical)?;
    let df = two_pass(
        &view,
        &[],
        |codes| Predicate::in_list("read_code", codes.iter().map(String::as_str)),
        &target.codes,
    )?
    .select([
        integer("eid"),
        col("read_code"),
        col("eventdate"),
        col(INCIDENT),
    ])
    .collect()?;
    let eids = ints(&df, "eid")?;
    let codes = strings(&df, "read_code")?;
    let event_dates = dates(&df, "eventdate")?;
    let incident = flags(&df, INCIDENT)?;

    let mut events = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(eid), Some(code)) = (eids[idx], codes[idx].clone()) else {
            continue;
        };
        let date = if incident[idx] {
            event_dates[idx].unwrap_or_else(sentinel_date)
        } else {
            sentinel_date()
        };
        events.push(CanonicalEvent::new(eid, &target.phenotype, field_id, code, date));
    }
    Ok(events)
}
