use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid field key: {0}")]
    InvalidFieldKey(String),
    #[error("invalid phenotype name: {0:?}")]
    InvalidPhenotypeName(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
