#![deny(unsafe_code)]

pub mod catalogue;
pub mod error;
pub mod loader;
pub mod paths;

pub use crate::catalogue::{Catalogue, PhenotypeQuery, PhenotypeSummary};
pub use crate::error::StandardsError;
pub use crate::loader::{BIOMARKER_DEFAULTS, DEFAULT_EXTRA_KEYS, DefinitionLoader};
pub use crate::paths::definitions_root;
