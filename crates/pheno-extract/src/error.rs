use pheno_model::{FieldId, FieldKey};
use thiserror::Error;

use crate::source::SourceTable;

/// Why a field cannot be extracted. Callers skip the field and carry on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("field {field} uses {system}, which is not supported")]
    UnsupportedCodingSystem {
        field: FieldKey,
        system: &'static str,
    },
    #[error("field {field} has no dedicated strategy and declares no time qualifier")]
    UnsupportedQualifier { field: FieldId },
    #[error("field {field} declares a {qualifier} qualifier without a source field")]
    MissingQualifierField {
        field: FieldId,
        qualifier: &'static str,
    },
    #[error("phenotype {phenotype} declares no codes for field {field}")]
    FieldNotDefined { phenotype: String, field: FieldKey },
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("source table {0} is not available")]
    MissingTable(SourceTable),
    #[error("source table {table} has no column {column:?}")]
    MissingColumn { table: SourceTable, column: String },
    #[error("invalid predicate on {column}: {message}")]
    InvalidPredicate { column: String, message: String },
    #[error("polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
