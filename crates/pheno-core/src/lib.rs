//! Extraction orchestration: idempotent runs over the catalogue and the
//! derived first-event views.

pub mod error;
pub mod extractor;
pub mod first_events;

pub use error::{CoreError, Result};
pub use extractor::{
    ExtractOptions, ExtractOutcome, ExtractSummary, Extractor, KeyAction, KeyOutcome,
    SkippedField,
};
pub use first_events::{FirstEvent, earliest_per_phenotype, first_events};
