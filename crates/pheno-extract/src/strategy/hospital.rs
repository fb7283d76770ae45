//! Hospital episode diagnoses and procedures.
//!
//! Codes match by prefix so a chapter or category code selects all of its
//! children. Incident matches take a recorded date; prevalent matches are
//! always undated.

use pheno_model::{CanonicalEvent, FieldId, Predicate, sentinel_date};
use polars::prelude::{JoinType, LazyFrame, col};

use crate::dates::first_present;
use crate::error::ExtractError;
use crate::frame::{ROW, TableView, dates, flags, integer, ints, join_on, strings};
use crate::source::{SourceTable, SourceTables};
use crate::strategy::{CodeLevel, INCIDENT, Target, two_pass};

const EPISODE_KEYS: [&str; 2] = ["eid", "ins_index"];

/// Admission and episode-start dates, one row per (eid, ins_index).
fn episodes(tables: &dyn SourceTables) -> Result<LazyFrame, ExtractError> {
    let view = TableView::open(tables, SourceTable::Hesin)?;
    Ok(view
        .frame()
        .select([
            integer("eid"),
            integer("ins_index"),
            col("admidate"),
            col("epistart"),
        ])
        .group_by_stable([col("eid"), col("ins_index")])
        .agg([col("admidate").first(), col("epistart").first()]))
}

/// Matched rows of `table` joined to their episode, in table order.
fn episode_rows(
    tables: &dyn SourceTables,
    table: SourceTable,
    level: CodeLevel,
    code_column: &'static str,
    target: &Target,
    extra: &[&str],
) -> Result<LazyFrame, ExtractError> {
    let view = TableView::open(tables, table)?;
    let mut columns = vec![
        col(ROW),
        integer("eid"),
        integer("ins_index"),
        col(code_column),
        col(INCIDENT),
    ];
    columns.extend(extra.iter().map(|name| col(*name)));
    let matched = two_pass(
        &view,
        &[Predicate::equals("level", level.level())],
        |codes| Predicate::starts_with_any(code_column, codes.iter()),
        &target.codes,
    )?
    .select(columns);
    Ok(join_on(
        matched,
        episodes(tables)?,
        &EPISODE_KEYS,
        JoinType::Inner,
    ))
}

pub(super) fn diagnoses(
    field_id: FieldId,
    level: CodeLevel,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let df = episode_rows(
        tables,
        SourceTable::HesinDiag,
        level,
        "diag_icd10",
        target,
        &[],
    )?
    .collect()?;
    let eids = ints(&df, "eid")?;
    let codes = strings(&df, "diag_icd10")?;
    let incident = flags(&df, INCIDENT)?;
    let admitted = dates(&df, "admidate")?;
    let started = dates(&df, "epistart")?;

    let mut events = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(eid), Some(code)) = (eids[idx], codes[idx].clone()) else {
            continue;
        };
        let date = if incident[idx] {
            first_present([admitted[idx], started[idx]])
        } else {
            sentinel_date()
        };
        events.push(CanonicalEvent::new(eid, &target.phenotype, field_id, code, date));
    }
    Ok(events)
}

pub(super) fn procedures(
    field_id: FieldId,
    level: CodeLevel,
    target: &Target,
    tables: &dyn SourceTables,
) -> Result<Vec<CanonicalEvent>, ExtractError> {
    let df = episode_rows(
        tables,
        SourceTable::HesinOper,
        level,
        "oper4",
        target,
        &["opdate"],
    )?
    .collect()?;
    let eids = ints(&df, "eid")?;
    let codes = strings(&df, "oper4")?;
    let incident = flags(&df, INCIDENT)?;
    let operated = dates(&df, "opdate")?;
    let admitted = dates(&df, "admidate")?;
    let started = dates(&df, "epistart")?;

    let mut events = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(eid), Some(code)) = (eids[idx], codes[idx].clone()) else {
            continue;
        };
        let date = if incident[idx] {
            first_present([operated[idx], admitted[idx], started[idx]])
        } else {
            sentinel_date()
        };
        events.push(CanonicalEvent::new(eid, &target.phenotype, field_id, code, date));
    }
    Ok(events)
}
