//! Idempotency Controller.
//!
//! Each (phenotype, field) key moves through
//! `unextracted -> extracted` and, on refresh, is deleted and re-extracted
//! inside a single store commit. Testing mode only collects rows.

use pheno_extract::{Overrides, ResolveError, Resolution, SourceTables, resolve};
use pheno_model::{CanonicalEvent, ExtractionKey, FieldKey, PhenotypeDefinition};
use pheno_standards::Catalogue;
use pheno_store::{CommitBatch, EventStore};
use tracing::{debug, info, info_span, warn};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Restrict extraction to these fields; `None` means every declared field.
    pub fields: Option<Vec<FieldKey>>,
    pub refresh: bool,
    pub testing: bool,
    pub overrides: Overrides,
}

impl ExtractOptions {
    /// Rejects option combinations that cannot run.
    pub fn check_modes(&self) -> Result<()> {
        if self.refresh && self.testing {
            return Err(CoreError::ModeConflict);
        }
        Ok(())
    }

    fn selects(&self, key: FieldKey) -> bool {
        self.fields
            .as_ref()
            .is_none_or(|fields| fields.contains(&key))
    }

    /// Requested fields that `definition` does not declare.
    fn undeclared(&self, definition: &PhenotypeDefinition) -> Vec<FieldKey> {
        let declared = definition.definition_fields(false);
        self.fields
            .iter()
            .flatten()
            .copied()
            .filter(|key| !declared.contains(key))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    AlreadyExtracted { existing: u64 },
    Extracted { inserted: u64 },
    Refreshed { deleted: u64, inserted: u64 },
    Collected { found: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    pub key: ExtractionKey,
    pub action: KeyAction,
}

/// A field skipped because no strategy can extract it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub phenotype: String,
    pub field: FieldKey,
    pub reason: ResolveError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub outcomes: Vec<KeyOutcome>,
    pub skipped: Vec<SkippedField>,
    /// Phenotypes defined by composite logic rather than codes.
    pub complex: Vec<String>,
}

impl ExtractSummary {
    pub fn inserted(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|outcome| match outcome.action {
                KeyAction::Extracted { inserted } | KeyAction::Refreshed { inserted, .. } => {
                    inserted
                }
                _ => 0,
            })
            .sum()
    }

    pub fn deleted(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|outcome| match outcome.action {
                KeyAction::Refreshed { deleted, .. } => deleted,
                _ => 0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    Committed(ExtractSummary),
    Collected {
        events: Vec<CanonicalEvent>,
        summary: ExtractSummary,
    },
}

impl ExtractOutcome {
    pub fn summary(&self) -> &ExtractSummary {
        match self {
            Self::Committed(summary) | Self::Collected { summary, .. } => summary,
        }
    }

    /// Rows inserted, or rows found in testing mode.
    pub fn row_count(&self) -> u64 {
        match self {
            Self::Committed(summary) => summary.inserted(),
            Self::Collected { events, .. } => events.len() as u64,
        }
    }
}

pub struct Extractor<'a> {
    catalogue: &'a Catalogue,
    tables: &'a dyn SourceTables,
    store: &'a mut dyn EventStore,
}

impl<'a> Extractor<'a> {
    pub fn new(
        catalogue: &'a Catalogue,
        tables: &'a dyn SourceTables,
        store: &'a mut dyn EventStore,
    ) -> Self {
        Self {
            catalogue,
            tables,
            store,
        }
    }

    /// Extract every selected field of `phenotypes`.
    ///
    /// Mode conflicts and unknown names fail before anything is read or
    /// written. Unsupported fields are skipped with a warning; source and
    /// store failures abort the run.
    pub fn extract<S: AsRef<str>>(
        &mut self,
        phenotypes: &[S],
        options: &ExtractOptions,
    ) -> Result<ExtractOutcome> {
        options.check_modes()?;
        let catalogue = self.catalogue;
        let invalid: Vec<String> = phenotypes
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !catalogue.is_valid_phenotype(name))
            .map(ToString::to_string)
            .collect();
        if !invalid.is_empty() {
            return Err(CoreError::InvalidPhenotype { names: invalid });
        }

        let mut summary = ExtractSummary::default();
        let mut collected = Vec::new();
        for name in phenotypes {
            let definition = catalogue.definition(name.as_ref())?;
            let _span = info_span!("phenotype", name = %definition.name).entered();
            if definition.is_complex {
                info!("skip: complex phenotype, no field-level extraction");
                summary.complex.push(definition.name.clone());
                continue;
            }
            for key in options.undeclared(definition) {
                info!(field_id = %key, "skip: field not defined for phenotype");
                summary.skipped.push(SkippedField {
                    phenotype: definition.name.clone(),
                    field: key,
                    reason: ResolveError::FieldNotDefined {
                        phenotype: definition.name.clone(),
                        field: key,
                    },
                });
            }
            for key in definition.definition_fields(false) {
                if !options.selects(key) {
                    continue;
                }
                let resolution = match resolve(definition, key, options.overrides) {
                    Ok(resolution) => resolution,
                    Err(reason) => {
                        warn!(
                            phenotype = %definition.name,
                            field_id = %key,
                            %reason,
                            "skipping unsupported field"
                        );
                        summary.skipped.push(SkippedField {
                            phenotype: definition.name.clone(),
                            field: key,
                            reason,
                        });
                        continue;
                    }
                };
                if options.testing {
                    let events = self.collect(definition, &resolution, &mut summary)?;
                    collected.extend(events);
                } else {
                    self.apply(&resolution, options.refresh, &mut summary)?;
                }
            }
        }

        Ok(if options.testing {
            ExtractOutcome::Collected {
                events: collected,
                summary,
            }
        } else {
            ExtractOutcome::Committed(summary)
        })
    }

    fn collect(
        &self,
        definition: &PhenotypeDefinition,
        resolution: &Resolution,
        summary: &mut ExtractSummary,
    ) -> Result<Vec<CanonicalEvent>> {
        let events = resolution.extract(self.tables)?;
        for key in resolution.output_keys() {
            let found = count_for(&events, &key);
            info!(key = %key, found, "testing: found rows");
            summary.outcomes.push(KeyOutcome {
                key,
                action: KeyAction::Collected { found },
            });
        }
        debug!(
            phenotype = %definition.name,
            strategy = %resolution.strategy,
            rows = events.len(),
            "collected without writing"
        );
        Ok(events)
    }

    fn apply(
        &mut self,
        resolution: &Resolution,
        refresh: bool,
        summary: &mut ExtractSummary,
    ) -> Result<()> {
        let keys = resolution.output_keys();
        let extracted = self.store.extracted_phenotypes(resolution.field_id)?;
        let done = keys.iter().any(|key| extracted.contains(&key.phenotype));
        if !refresh && done {
            for key in keys {
                let existing = self.store.count(&key)?;
                info!(key = %key, existing, "skip: already extracted");
                summary.outcomes.push(KeyOutcome {
                    key,
                    action: KeyAction::AlreadyExtracted { existing },
                });
            }
            return Ok(());
        }
        let mut existing = Vec::with_capacity(keys.len());
        for key in &keys {
            existing.push(if done { self.store.count(key)? } else { 0 });
        }

        let batch = CommitBatch {
            keys,
            events: resolution.extract(self.tables)?,
            replace: refresh,
        };
        let report = self
            .store
            .commit(&batch)
            .map_err(|source| CoreError::Commit {
                keys: batch.keys.clone(),
                source,
            })?;
        debug!(
            field_id = %resolution.field_id,
            deleted = report.deleted,
            inserted = report.inserted,
            "commit finished"
        );
        for (key, deleted) in batch.keys.iter().zip(existing) {
            let inserted = count_for(&batch.events, key);
            let action = if refresh {
                info!(key = %key, deleted, "refresh: deleted rows");
                KeyAction::Refreshed { deleted, inserted }
            } else {
                KeyAction::Extracted { inserted }
            };
            info!(key = %key, inserted, "extract: added rows");
            summary.outcomes.push(KeyOutcome {
                key: key.clone(),
                action,
            });
        }
        Ok(())
    }
}

fn count_for(events: &[CanonicalEvent], key: &ExtractionKey) -> u64 {
    events
        .iter()
        .filter(|event| event.phenotype == key.phenotype && event.field_id == key.field_id)
        .count() as u64
}
