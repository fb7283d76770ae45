use std::collections::BTreeSet;

use pheno_model::{CanonicalEvent, ExtractionKey, FieldId, Predicate};

use crate::error::Result;

/// Rows produced for a set of extraction keys, written as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitBatch {
    /// Keys whose existing rows are removed first when `replace` is set.
    pub keys: Vec<ExtractionKey>,
    pub events: Vec<CanonicalEvent>,
    pub replace: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub deleted: u64,
    pub inserted: u64,
}

/// Persistence for canonical events.
///
/// `commit` must apply its deletions and insertions atomically: either
/// every change in the batch is visible afterwards or none is.
pub trait EventStore {
    /// Phenotypes with at least one row for `field_id`.
    fn extracted_phenotypes(&self, field_id: FieldId) -> Result<BTreeSet<String>>;

    fn count(&self, key: &ExtractionKey) -> Result<u64>;

    fn commit(&mut self, batch: &CommitBatch) -> Result<CommitReport>;

    /// Events matching every predicate, in insertion order.
    fn events(&self, filter: &[Predicate]) -> Result<Vec<CanonicalEvent>>;
}
