//! Extraction engine: turns a phenotype field into canonical events.
//!
//! [`resolve`] picks a [`Strategy`] for a (phenotype, field) pair and
//! assembles its code lists; [`Resolution::extract`] runs it against any
//! [`SourceTables`] implementation.

pub mod cohort;
pub mod dates;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod matcher;
pub mod source;
pub mod strategy;

pub use cohort::birth_dates;
pub use dispatch::{Overrides, Resolution, resolve};
pub use error::{ExtractError, ResolveError};
pub use source::{FrameSource, SourceTable, SourceTables};
pub use strategy::{CodeLevel, CodeSet, SelfReportKind, Strategy, Target};
