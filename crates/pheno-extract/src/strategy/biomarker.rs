//! Biomarker measurements carry their numeric value in `data_value`.

use pheno_model::{CanonicalEvent, FieldId, Predicate, sentinel_date};
use polars::prelude::{JoinType, col};

use crate::dates::parse_date;
use crate::error::ExtractError;
use crate::frame::{TableView, dates, integer, ints, join_on, parse_f64, strings};
use crate::source::{SourceTable, SourceTables};
use crate::strategy::Target;
use crate::strategy::qualified::hits_with;

/// Unit codes accepted for mmol-based primary-care measurements.
pub const ACCEPTED_UNITS: [&str; 8] = [
    "MEA000",
    "MEA096",
    "mmol/l",
    "mmol/L",
    "MMOL/L",
    "Mmol/mol",
    "Unknown",
    "No UOM assigned",
];

/// Data provider whose extracts put the value in `value2` and unit in `value3`.
const SPLIT_VALUE_PROVIDER: i64 = 2;

/// Primary-care measurements for one medium.
pub(super) fn ehr(
    field_id: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let df = TableView::open(tables, SourceTable::GpClinical)?
        .filter(&[Predicate::in_list(
            "read_code",
            target.codes.incident.iter().map(String::as_str),
        )])?
        .select([
            integer("eid"),
            integer("data_provider"),
            col("read_code"),
            col("eventdate"),
            col("value1"),
            col("value2"),
            col("value3"),
        ])
        .collect()?;
    let eids = ints(&df, "eid")?;
    let providers = ints(&df, "data_provider")?;
    let codes = strings(&df, "read_code")?;
    let event_dates = dates(&df, "eventdate")?;
    let value1 = strings(&df, "value1")?;
    let value2 = strings(&df, "value2")?;
    let value3 = strings(&df, "value3")?;

    let mut events = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(eid), Some(code)) = (eids[idx], codes[idx].clone()) else {
            continue;
        };
        let (raw_value, unit) = if providers[idx] == Some(SPLIT_VALUE_PROVIDER) {
            (value2[idx].as_deref(), value3[idx].as_deref())
        } else {
            (value1[idx].as_deref(), None)
        };
        if unit.is_some_and(|unit| !ACCEPTED_UNITS.contains(&unit)) {
            continue;
        }
        let date = event_dates[idx].unwrap_or_else(sentinel_date);
        events.push(
            CanonicalEvent::new(eid, &target.phenotype, field_id, code, date)
                .with_data_value(raw_value.and_then(parse_f64)),
        );
    }
    Ok(events)
}

/// Every assessment-centre measurement of the field, dated by the visit of
/// the same instance.
pub(super) fn baseline(
    field_id: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let view = TableView::open(tables, SourceTable::Baseline)?;
    let visits = view.baseline_values(FieldId::ASSESSMENT_DATE, &["eid", "i"], "visit")?;
    let df = join_on(
        view.baseline_rows(field_id, None)?,
        visits,
        &["eid", "i"],
        JoinType::Left,
    )
    .collect()?;
    Ok(hits_with(&df, ["visit"])?
        .into_iter()
        .map(|(eid, value, [visit])| {
            let date = visit
                .as_deref()
                .and_then(parse_date)
                .unwrap_or_else(sentinel_date);
            let data_value = parse_f64(&value);
            CanonicalEvent::new(eid, &target.phenotype, field_id, value, date)
                .with_data_value(data_value)
        })
        .collect())
}
