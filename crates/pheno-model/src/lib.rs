//! Shared data model for the phenotype extraction engine.
//!
//! Definitions are parsed into [`PhenotypeDefinition`], every extraction
//! strategy converges on [`CanonicalEvent`], and row filters travel between
//! layers as [`Predicate`] values that each backend compiles for itself.

pub mod definition;
pub mod error;
pub mod event;
pub mod ids;
pub mod predicate;

pub use definition::{
    CodeEntry, CodeRecord, FieldDefinition, FieldMetadata, PhenotypeDefinition,
    PhenotypeMetadata, Prescriptions, Prevalence, TimeQualifier, normalize_code,
};
pub use error::{ModelError, Result};
pub use event::{CanonicalEvent, ExtractionKey, MISSING_DATE_MARKERS, sentinel_date};
pub use ids::{FieldId, FieldKey, SourceCategory};
pub use predicate::{Literal, Operator, Predicate};
