//! Event store held in a `Vec`, for tests and dry runs.

use std::collections::BTreeSet;

use pheno_model::{CanonicalEvent, ExtractionKey, FieldId, Literal, Operator, Predicate};

use crate::error::{Result, StoreError};
use crate::schema::EventColumn;
use crate::store::{CommitBatch, CommitReport, EventStore};

#[derive(Debug, Clone, Default)]
pub struct MemoryEventStore {
    events: Vec<CanonicalEvent>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Cell value of an event as text, `None` for a missing measurement.
fn cell(event: &CanonicalEvent, column: EventColumn) -> Option<String> {
    match column {
        EventColumn::Eid => Some(event.eid.to_string()),
        EventColumn::Phenotype => Some(event.phenotype.clone()),
        EventColumn::FieldId => Some(event.field_id.to_string()),
        EventColumn::FieldValue => Some(event.field_value.clone()),
        EventColumn::EventDate => Some(event.event_date.format("%Y-%m-%d").to_string()),
        EventColumn::DataValue => event.data_value.map(|v| v.to_string()),
    }
}

fn literal_matches(column: EventColumn, cell: &str, literal: &Literal) -> bool {
    match literal {
        Literal::Int(v) if column.is_integer() => cell.parse::<i64>().is_ok_and(|c| c == *v),
        other => cell == other.to_string(),
    }
}

struct Filter {
    column: EventColumn,
    predicate: Predicate,
}

impl Filter {
    fn compile(predicate: &Predicate) -> Result<Self> {
        if predicate.operator == Operator::Eq && predicate.values.len() != 1 {
            return Err(StoreError::EmptyPredicate {
                column: predicate.column.clone(),
                count: predicate.values.len(),
            });
        }
        Ok(Self {
            column: predicate.column.parse()?,
            predicate: predicate.clone(),
        })
    }

    fn matches(&self, event: &CanonicalEvent) -> bool {
        let Some(cell) = cell(event, self.column) else {
            return false;
        };
        let values = &self.predicate.values;
        match self.predicate.operator {
            Operator::Eq | Operator::In => values
                .iter()
                .any(|value| literal_matches(self.column, &cell, value)),
            Operator::StartsWithAny => self
                .predicate
                .prefixes()
                .any(|prefix| cell.starts_with(&prefix)),
            Operator::NotNull => true,
        }
    }
}

impl EventStore for MemoryEventStore {
    fn extracted_phenotypes(&self, field_id: FieldId) -> Result<BTreeSet<String>> {
        Ok(self
            .events
            .iter()
            .filter(|event| event.field_id == field_id)
            .map(|event| event.phenotype.clone())
            .collect())
    }

    fn count(&self, key: &ExtractionKey) -> Result<u64> {
        Ok(self
            .events
            .iter()
            .filter(|event| event.phenotype == key.phenotype && event.field_id == key.field_id)
            .count() as u64)
    }

    fn commit(&mut self, batch: &CommitBatch) -> Result<CommitReport> {
        let mut report = CommitReport::default();
        if batch.replace {
            let before = self.events.len();
            self.events.retain(|event| {
                !batch
                    .keys
                    .iter()
                    .any(|key| key.phenotype == event.phenotype && key.field_id == event.field_id)
            });
            report.deleted = (before - self.events.len()) as u64;
        }
        self.events.extend(batch.events.iter().cloned());
        report.inserted = batch.events.len() as u64;
        Ok(report)
    }

    fn events(&self, filter: &[Predicate]) -> Result<Vec<CanonicalEvent>> {
        let filters = filter
            .iter()
            .map(Filter::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(self
            .events
            .iter()
            .filter(|event| filters.iter().all(|f| f.matches(event)))
            .cloned()
            .collect())
    }
}
