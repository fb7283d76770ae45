use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown event column {0:?}")]
    InvalidColumn(String),

    #[error("predicate on {column} expects exactly one value, got {count}")]
    EmptyPredicate { column: String, count: usize },

    #[error("stored event date {value:?} is not a valid date")]
    InvalidDate { value: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
