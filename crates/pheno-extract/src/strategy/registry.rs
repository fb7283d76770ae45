use pheno_model::{CanonicalEvent, FieldId, Predicate, sentinel_date};
use polars::prelude::JoinType;

use crate::dates::parse_date;
use crate::error::ExtractError;
use crate::frame::{TableView, join_on};
use crate::source::{SourceTable, SourceTables};
use crate::strategy::Target;
use crate::strategy::qualified::{SLOT_KEYS, hits_with};

/// Cancer registry entries: code-family match on the cancer type, dated
/// by the diagnosis date recorded at the same instance and array index.
pub(super) fn cancers(
    field_id: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let view = TableView::open(tables, SourceTable::Baseline)?;
    let diagnosed = view.baseline_values(FieldId::CANCER_DIAGNOSIS_DATE, &SLOT_KEYS, "diagnosed")?;
    let hits = view.baseline_rows(
        field_id,
        Some(Predicate::starts_with_any("value", target.codes.incident.iter())),
    )?;
    let df = join_on(hits, diagnosed, &SLOT_KEYS, JoinType::Left).collect()?;
    Ok(hits_with(&df, ["diagnosed"])?
        .into_iter()
        .map(|(eid, value, [diagnosed])| {
            let date = diagnosed
                .as_deref()
                .and_then(parse_date)
                .unwrap_or_else(sentinel_date);
            CanonicalEvent::new(eid, &target.phenotype, field_id, value, date)
        })
        .collect())
}
