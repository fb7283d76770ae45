use pheno_extract::ExtractError;
use pheno_model::ExtractionKey;
use pheno_standards::StandardsError;
use pheno_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("refresh and testing modes cannot be combined")]
    ModeConflict,

    #[error("invalid phenotype(s): {}", .names.join(", "))]
    InvalidPhenotype { names: Vec<String> },

    #[error(transparent)]
    Standards(#[from] StandardsError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The batch was rolled back; existing rows for these keys are untouched.
    #[error("failed to commit events for {}: {source}", join_keys(.keys))]
    Commit {
        keys: Vec<ExtractionKey>,
        #[source]
        source: StoreError,
    },
}

fn join_keys(keys: &[ExtractionKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, CoreError>;
