use chrono::NaiveDate;
use pheno_model::{CanonicalEvent, FieldId, Predicate, sentinel_date};
use polars::prelude::{DataType, JoinType, col};

use crate::error::ExtractError;
use crate::frame::{ROW, TableView, dates, integer, ints, join_on, strings};
use crate::source::{SourceTable, SourceTables};
use crate::strategy::{CodeLevel, Target};

/// Death-certificate causes at one level, dated by the date of death.
///
/// Causes of subjects without a death record are dropped. A subject with
/// several death records is dated by the earliest one.
pub(super) fn causes(
    field_id: FieldId,
    level: CodeLevel,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let matched = TableView::open(tables, SourceTable::DeathCause)?
        .filter(&[
            Predicate::equals("level", level.level()),
            Predicate::starts_with_any("cause_icd10", target.codes.incident.iter()),
        ])?
        .select([
            col(ROW).cast(DataType::Int64),
            integer("eid"),
            col("cause_icd10"),
        ]);
    let deaths = TableView::open(tables, SourceTable::Death)?
        .frame()
        .select([integer("eid"), col("date_of_death")]);
    // One row per (cause, death record); folded to the earliest date below.
    let df = join_on(matched, deaths, &["eid"], JoinType::Inner).collect()?;
    let rows = ints(&df, ROW)?;
    let eids = ints(&df, "eid")?;
    let causes = strings(&df, "cause_icd10")?;
    let died = dates(&df, "date_of_death")?;

    let mut folded: Vec<(i64, i64, String, Option<NaiveDate>)> = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(row), Some(eid), Some(cause)) = (rows[idx], eids[idx], causes[idx].clone())
        else {
            continue;
        };
        if let Some(last) = folded.last_mut().filter(|last| last.0 == row) {
            last.3 = match (last.3, died[idx]) {
                (Some(current), Some(candidate)) => Some(current.min(candidate)),
                (current, candidate) => current.or(candidate),
            };
            continue;
        }
        folded.push((row, eid, cause, died[idx]));
    }
    Ok(folded
        .into_iter()
        .map(|(_, eid, cause, date)| {
            let date = date.unwrap_or_else(sentinel_date);
            CanonicalEvent::new(eid, &target.phenotype, field_id, cause, date)
        })
        .collect())
}
