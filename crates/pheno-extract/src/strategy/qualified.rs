//! Baseline-table fields dated by another field: self-report years,
//! age at event, or the assessment visit.

use pheno_model::{CanonicalEvent, FieldId, Predicate, sentinel_date};
use polars::prelude::{DataFrame, JoinType, LazyFrame};

use crate::dates::{age_date, parse_date, year_date};
use crate::error::ExtractError;
use crate::frame::{TableView, ints, join_on, parse_f64, strings};
use crate::source::{SourceTable, SourceTables};
use crate::strategy::Target;

/// Keys pairing a baseline value with another field of the same visit and array slot.
pub(super) const SLOT_KEYS: [&str; 3] = ["eid", "i", "n"];

/// Rows of `field` whose value is one of the target's codes.
fn code_hits(view: &TableView, field: FieldId, target: &Target) -> Result<LazyFrame, ExtractError> {
    view.baseline_rows(
        field,
        Some(Predicate::in_list(
            "value",
            target.codes.incident.iter().map(String::as_str),
        )),
    )
}

/// `eid`, `value` and the `paired` columns of each hit, skipping rows
/// without a subject or value.
pub(super) fn hits_with<const N: usize>(
    df: &DataFrame,
    paired: [&str; N],
) -> Result<Vec<(i64, String, [Option<String>; N])>, ExtractError> {
    let eids = ints(df, "eid")?;
    let values = strings(df, "value")?;
    let mut columns = Vec::with_capacity(N);
    for name in paired {
        columns.push(strings(df, name)?);
    }
    Ok((0..df.height())
        .filter_map(|idx| {
            let (Some(eid), Some(value)) = (eids[idx], values[idx].clone()) else {
                return None;
            };
            let paired = std::array::from_fn(|k| columns[k][idx].clone());
            Some((eid, value, paired))
        })
        .collect())
}

/// Date is January 1 of the year recorded in `year_field` at the same
/// instance and array index.
pub(super) fn year_qualified(
    field_id: FieldId,
    year_field: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let view = TableView::open(tables, SourceTable::Baseline)?;
    let years = view.baseline_values(year_field, &SLOT_KEYS, "year")?;
    let df = join_on(code_hits(&view, field_id, target)?, years, &SLOT_KEYS, JoinType::Left)
        .collect()?;
    Ok(hits_with(&df, ["year"])?
        .into_iter()
        .map(|(eid, value, [year])| {
            let year = year.as_deref().and_then(parse_f64);
            CanonicalEvent::new(eid, &target.phenotype, field_id, value, year_date(year))
        })
        .collect())
}

/// Date is year of birth plus the age recorded in `age_field`.
pub(super) fn age_qualified(
    field_id: FieldId,
    age_field: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let view = TableView::open(tables, SourceTable::Baseline)?;
    let ages = view.baseline_values(age_field, &SLOT_KEYS, "age")?;
    let births = view.baseline_values(FieldId::YEAR_OF_BIRTH, &["eid"], "year_of_birth")?;
    let hits = join_on(code_hits(&view, field_id, target)?, ages, &SLOT_KEYS, JoinType::Left);
    let df = join_on(hits, births, &["eid"], JoinType::Left).collect()?;
    Ok(hits_with(&df, ["age", "year_of_birth"])?
        .into_iter()
        .map(|(eid, value, [age, year_of_birth])| {
            let age = age.as_deref().and_then(parse_f64);
            let year_of_birth = year_of_birth
                .as_deref()
                .and_then(parse_f64)
                .map(|yob| yob.round() as i64);
            CanonicalEvent::new(
                eid,
                &target.phenotype,
                field_id,
                value,
                age_date(year_of_birth, age),
            )
        })
        .collect())
}

/// Date is the subject's first assessment-centre visit.
pub(super) fn baseline_qualified(
    field_id: FieldId,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let view = TableView::open(tables, SourceTable::Baseline)?;
    let visits = view.baseline_values(FieldId::ASSESSMENT_DATE, &["eid"], "visit")?;
    let df = join_on(code_hits(&view, field_id, target)?, visits, &["eid"], JoinType::Left)
        .collect()?;
    Ok(hits_with(&df, ["visit"])?
        .into_iter()
        .map(|(eid, value, [visit])| {
            let date = visit
                .as_deref()
                .and_then(parse_date)
                .unwrap_or_else(sentinel_date);
            CanonicalEvent::new(eid, &target.phenotype, field_id, value, date)
        })
        .collect())
}
