//! Per-subject facts derived from the baseline table.

use std::collections::HashMap;

use chrono::NaiveDate;
use pheno_model::FieldId;
use polars::prelude::{JoinArgs, JoinType, col};

use crate::error::ExtractError;
use crate::frame::{TableView, ints, parse_i64, strings};
use crate::source::{SourceTable, SourceTables};

/// Approximate birth dates: first day of the recorded birth month, or
/// January 1 when only the year is known.
pub fn birth_dates(tables: &dyn SourceTables) -> Result<HashMap<i64, NaiveDate>, ExtractError> {
    let view = TableView::open(tables, SourceTable::Baseline)?;
    let years = view.baseline_values(FieldId::YEAR_OF_BIRTH, &["eid"], "year")?;
    let months = view.baseline_values(FieldId::MONTH_OF_BIRTH, &["eid"], "month")?;
    let df = years
        .join(months, [col("eid")], [col("eid")], JoinArgs::new(JoinType::Left))
        .collect()?;
    let eids = ints(&df, "eid")?;
    let years = strings(&df, "year")?;
    let months = strings(&df, "month")?;

    let mut out = HashMap::with_capacity(df.height());
    for ((eid, year), month) in eids.into_iter().zip(years).zip(months) {
        let (Some(eid), Some(year)) = (eid, year) else {
            continue;
        };
        let Some(year) = parse_i64(&year).and_then(|y| i32::try_from(y).ok()) else {
            continue;
        };
        let month = month
            .as_deref()
            .and_then(parse_i64)
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| (1..=12).contains(m))
            .unwrap_or(1);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, 1) {
            out.insert(eid, date);
        }
    }
    Ok(out)
}
