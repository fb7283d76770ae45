//! Lazy polars access to source tables.
//!
//! A [`TableView`] reads every required column as trimmed text with blanks
//! as null. Strategies filter and join lazily and only materialise the
//! matched rows.

use chrono::NaiveDate;
use pheno_model::{FieldId, Predicate};
use polars::prelude::{
    DataFrame, DataType, Expr, IntoLazy, JoinArgs, JoinType, LazyFrame, NULL,
    SortMultipleOptions, col, lit, when,
};

use crate::dates::parse_date;
use crate::error::ExtractError;
use crate::matcher::all_of;
use crate::source::{SourceTable, SourceTables};

/// Position of a row in its source table, kept through joins.
pub(crate) const ROW: &str = "row";

/// Parses a string as `f64`, returning `None` for invalid or empty strings.
pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses an integer, accepting whole floats such as `"2.0"`.
pub fn parse_i64(value: &str) -> Option<i64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| parse_f64(trimmed).and_then(whole_f64))
}

fn whole_f64(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
        Some(v as i64)
    } else {
        None
    }
}

/// Trimmed text of a column, blank as null. Whole floats render without
/// a fractional part, the way a CSV extract carries them.
fn as_text(name: &str, dtype: &DataType) -> Expr {
    let column = col(name);
    let rendered = if dtype.is_float() {
        let whole = column.clone().cast(DataType::Int64);
        when(whole.clone().cast(DataType::Float64).eq(column.clone()))
            .then(whole.cast(DataType::String))
            .otherwise(column.cast(DataType::String))
    } else {
        column.cast(DataType::String)
    };
    let trimmed = rendered.str().strip_chars(lit(NULL));
    when(trimmed.clone().eq(lit("")))
        .then(lit(NULL))
        .otherwise(trimmed)
        .alias(name)
}

/// Integer reading of a text column; `"2.0"` reads as 2.
pub(crate) fn integer(name: &str) -> Expr {
    col(name)
        .cast(DataType::Float64)
        .cast(DataType::Int64)
        .alias(name)
}

/// Instance or array index; a missing index reads as 0.
pub(crate) fn index(name: &str) -> Expr {
    integer(name).fill_null(lit(0i64)).alias(name)
}

/// One source table as a lazy frame of text columns plus [`ROW`].
pub(crate) struct TableView {
    frame: LazyFrame,
}

impl TableView {
    pub(crate) fn open(
        tables: &dyn SourceTables,
        table: SourceTable,
    ) -> Result<Self, ExtractError> {
        let df = tables.table(table)?;
        let mut columns = Vec::with_capacity(table.required_columns().len());
        for name in table.required_columns() {
            let column = df.column(name).map_err(|_| ExtractError::MissingColumn {
                table,
                column: (*name).to_string(),
            })?;
            columns.push(as_text(name, column.dtype()));
        }
        Ok(Self {
            frame: df.clone().lazy().select(columns).with_row_index(ROW, None),
        })
    }

    pub(crate) fn frame(&self) -> LazyFrame {
        self.frame.clone()
    }

    /// Rows satisfying every predicate, in table order.
    pub(crate) fn filter(&self, predicates: &[Predicate]) -> Result<LazyFrame, ExtractError> {
        Ok(self.frame().filter(all_of(predicates)?))
    }

    /// Rows of one baseline field with typed keys: `eid`, `i`, `n`, `value`.
    pub(crate) fn baseline_rows(
        &self,
        field: FieldId,
        codes: Option<Predicate>,
    ) -> Result<LazyFrame, ExtractError> {
        let mut predicates = vec![Predicate::equals("field", field)];
        predicates.extend(codes);
        Ok(self.filter(&predicates)?.select([
            col(ROW),
            integer("eid"),
            index("i"),
            index("n"),
            col("value"),
        ]))
    }

    /// Values of `field` as column `alias`, one row per distinct `keys`.
    ///
    /// Only the first assessment visit is kept when `keys` omits the
    /// instance and array index.
    pub(crate) fn baseline_values(
        &self,
        field: FieldId,
        keys: &[&str],
        alias: &str,
    ) -> Result<LazyFrame, ExtractError> {
        let mut rows = self.baseline_rows(field, None)?;
        for position in ["i", "n"] {
            if !keys.contains(&position) {
                rows = rows.filter(col(position).eq(lit(0i64)));
            }
        }
        let by: Vec<Expr> = keys.iter().map(|key| col(*key)).collect();
        Ok(rows
            .filter(col("eid").is_not_null())
            .group_by_stable(by)
            .agg([col("value").first().alias(alias)]))
    }
}

/// Joins `other` onto `rows` by `keys`, keeping the order of `rows`.
pub(crate) fn join_on(rows: LazyFrame, other: LazyFrame, keys: &[&str], how: JoinType) -> LazyFrame {
    let on: Vec<Expr> = keys.iter().map(|key| col(*key)).collect();
    rows.join(other, on.clone(), on, JoinArgs::new(how))
        .sort([ROW], SortMultipleOptions::default())
}

pub(crate) fn ints(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, ExtractError> {
    Ok(df.column(name)?.i64()?.into_iter().collect())
}

pub(crate) fn strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, ExtractError> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

pub(crate) fn dates(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDate>>, ExtractError> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|value| value.and_then(parse_date))
        .collect())
}

pub(crate) fn flags(df: &DataFrame, name: &str) -> Result<Vec<bool>, ExtractError> {
    Ok(df
        .column(name)?
        .bool()?
        .into_iter()
        .map(|value| value.unwrap_or(false))
        .collect())
}
