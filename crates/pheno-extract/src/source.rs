//! Source tables the strategies read from.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use polars::prelude::{CsvReadOptions, DataFrame, SerReader};
use tracing::{debug, info};

use crate::error::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceTable {
    /// Long-format assessment data: one row per (eid, field, instance, array index).
    Baseline,
    /// Hospital episodes.
    Hesin,
    HesinDiag,
    HesinOper,
    Death,
    DeathCause,
    GpClinical,
}

impl SourceTable {
    pub const ALL: [Self; 7] = [
        Self::Baseline,
        Self::Hesin,
        Self::HesinDiag,
        Self::HesinOper,
        Self::Death,
        Self::DeathCause,
        Self::GpClinical,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Hesin => "hesin",
            Self::HesinDiag => "hesin_diag",
            Self::HesinOper => "hesin_oper",
            Self::Death => "death",
            Self::DeathCause => "death_cause",
            Self::GpClinical => "gp_clinical",
        }
    }

    pub fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Baseline => &["eid", "field", "i", "n", "value"],
            Self::Hesin => &["eid", "ins_index", "admidate", "epistart"],
            Self::HesinDiag => &["eid", "ins_index", "level", "diag_icd10"],
            Self::HesinOper => &["eid", "ins_index", "level", "oper4", "opdate"],
            Self::Death => &["eid", "date_of_death"],
            Self::DeathCause => &["eid", "level", "cause_icd10"],
            Self::GpClinical => &[
                "eid",
                "data_provider",
                "eventdate",
                "value1",
                "value2",
                "value3",
                "read_code",
            ],
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read access to source tables.
pub trait SourceTables {
    fn table(&self, table: SourceTable) -> Result<&DataFrame, ExtractError>;
}

/// Source tables held in memory as polars frames.
#[derive(Debug, Clone, Default)]
pub struct FrameSource {
    tables: BTreeMap<SourceTable, DataFrame>,
}

impl FrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table after checking its required columns.
    pub fn insert(&mut self, table: SourceTable, df: DataFrame) -> Result<(), ExtractError> {
        for column in table.required_columns() {
            if df.column(column).is_err() {
                return Err(ExtractError::MissingColumn {
                    table,
                    column: (*column).to_string(),
                });
            }
        }
        self.tables.insert(table, df);
        Ok(())
    }

    pub fn with_table(mut self, table: SourceTable, df: DataFrame) -> Result<Self, ExtractError> {
        self.insert(table, df)?;
        Ok(self)
    }

    pub fn contains(&self, table: SourceTable) -> bool {
        self.tables.contains_key(&table)
    }

    /// Load `<table>.csv` files from `dir`. Absent files are left out and
    /// only fail when a strategy asks for them.
    pub fn from_csv_dir(dir: &Path) -> Result<Self, ExtractError> {
        let mut source = Self::new();
        for table in SourceTable::ALL {
            let path = dir.join(format!("{}.csv", table.name()));
            if !path.is_file() {
                debug!(table = %table, path = %path.display(), "source table not present");
                continue;
            }
            let df = read_csv_table(&path)?;
            info!(table = %table, rows = df.height(), "loaded source table");
            source.insert(table, df)?;
        }
        Ok(source)
    }
}

impl SourceTables for FrameSource {
    fn table(&self, table: SourceTable) -> Result<&DataFrame, ExtractError> {
        self.tables
            .get(&table)
            .ok_or(ExtractError::MissingTable(table))
    }
}

/// Read a CSV with every column as text; typing happens per strategy.
pub fn read_csv_table(path: &Path) -> Result<DataFrame, ExtractError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}
