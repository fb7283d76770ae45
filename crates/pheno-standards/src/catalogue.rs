//! In-memory registry of every phenotype definition in a directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use pheno_model::{FieldKey, PhenotypeDefinition};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::StandardsError;
use crate::loader::DefinitionLoader;
use crate::paths::definitions_root;

/// Filters for [`Catalogue::get_all_phenotypes`].
///
/// The default lists cancer and neonatal phenotypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhenotypeQuery {
    pub include_cancer: bool,
    pub include_neonatal: bool,
    pub include_elixhauser: bool,
    pub include_complex: bool,
}

impl Default for PhenotypeQuery {
    fn default() -> Self {
        Self {
            include_cancer: true,
            include_neonatal: true,
            include_elixhauser: false,
            include_complex: false,
        }
    }
}

/// Flat view of one definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhenotypeSummary {
    pub name: String,
    pub phenotype: Option<String>,
    pub group: Option<String>,
    pub gender: Option<String>,
    pub priority: Option<String>,
    pub short_desc: Option<String>,
    pub is_cancer: bool,
    pub is_adult: bool,
    pub is_complex: bool,
    pub is_biomarker: bool,
    pub fields: Vec<FieldKey>,
}

impl From<&PhenotypeDefinition> for PhenotypeSummary {
    fn from(definition: &PhenotypeDefinition) -> Self {
        let metadata = &definition.metadata;
        Self {
            name: definition.name.clone(),
            phenotype: metadata.phenotype.clone(),
            group: metadata.group.clone(),
            gender: metadata.gender.clone(),
            priority: metadata.priority.clone(),
            short_desc: metadata.short_desc.clone(),
            is_cancer: definition.is_cancer,
            is_adult: metadata.is_adult,
            is_complex: definition.is_complex,
            is_biomarker: definition.is_biomarker,
            fields: definition.definition_fields(false),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    definitions: BTreeMap<String, PhenotypeDefinition>,
}

impl Catalogue {
    /// Load every `*.yaml` document under `dir`.
    ///
    /// All documents are parsed before returning; failures are collected and
    /// reported together as [`StandardsError::Catalogue`].
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self, StandardsError> {
        Self::load_with(&DefinitionLoader::new(dir))
    }

    pub fn load_default() -> Result<Self, StandardsError> {
        Self::load(definitions_root())
    }

    pub fn load_with(loader: &DefinitionLoader) -> Result<Self, StandardsError> {
        let dir = loader.dir();
        let names = document_names(dir)?;
        let mut definitions: BTreeMap<String, PhenotypeDefinition> = BTreeMap::new();
        let mut origins: BTreeMap<String, PathBuf> = BTreeMap::new();
        let mut errors = Vec::new();
        for name in names {
            match loader.load(&name) {
                Ok(definition) => {
                    let path = loader.path_for(&name);
                    if let Some(first) = origins.get(&definition.name) {
                        errors.push(StandardsError::DuplicatePhenotype {
                            name: definition.name.clone(),
                            first: first.clone(),
                        });
                        continue;
                    }
                    origins.insert(definition.name.clone(), path);
                    definitions.insert(definition.name.clone(), definition);
                }
                Err(error) => {
                    warn!(phenotype = %name, %error, "failed to load definition");
                    errors.push(error);
                }
            }
        }
        if !errors.is_empty() {
            return Err(StandardsError::Catalogue {
                dir: dir.to_path_buf(),
                errors,
            });
        }
        info!(dir = %dir.display(), phenotypes = definitions.len(), "loaded catalogue");
        Ok(Self { definitions })
    }

    /// Build a catalogue from definitions already in memory.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = PhenotypeDefinition>,
    ) -> Result<Self, StandardsError> {
        let mut map = BTreeMap::new();
        for definition in definitions {
            if map.contains_key(&definition.name) {
                return Err(StandardsError::DuplicatePhenotype {
                    name: definition.name.clone(),
                    first: PathBuf::from("<memory>"),
                });
            }
            map.insert(definition.name.clone(), definition);
        }
        Ok(Self { definitions: map })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Summaries of the definitions selected by `query`, ordered by name.
    pub fn get_all_phenotypes(
        &self,
        query: PhenotypeQuery,
    ) -> Result<Vec<PhenotypeSummary>, StandardsError> {
        if query.include_elixhauser {
            return Err(StandardsError::NotImplemented(
                "Elixhauser comorbidity phenotypes",
            ));
        }
        if query.include_complex {
            return Err(StandardsError::NotImplemented("complex phenotypes"));
        }
        Ok(self
            .definitions
            .values()
            .filter(|definition| query.include_cancer || !definition.is_cancer)
            .filter(|definition| query.include_neonatal || definition.metadata.is_adult)
            .map(PhenotypeSummary::from)
            .collect())
    }

    pub fn is_valid_phenotype(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn get_categories(&self) -> BTreeSet<String> {
        self.definitions
            .values()
            .filter_map(|definition| definition.category())
            .map(ToString::to_string)
            .collect()
    }

    pub fn get_phenotypes_by_category(&self, category: &str) -> Vec<String> {
        self.definitions
            .values()
            .filter(|definition| definition.category() == Some(category))
            .map(|definition| definition.name.clone())
            .collect()
    }

    pub fn get_phenotype(&self, name: &str) -> Result<PhenotypeSummary, StandardsError> {
        self.definition(name).map(PhenotypeSummary::from)
    }

    pub fn get_complex_phenotypes(&self) -> Vec<String> {
        self.definitions
            .values()
            .filter(|definition| definition.is_complex)
            .map(|definition| definition.name.clone())
            .collect()
    }

    pub fn definition(&self, name: &str) -> Result<&PhenotypeDefinition, StandardsError> {
        self.definitions
            .get(name)
            .ok_or_else(|| StandardsError::UnknownPhenotype(name.to_string()))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &PhenotypeDefinition> {
        self.definitions.values()
    }

    /// Every phenotype name, ordered.
    pub fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }
}

fn document_names(dir: &Path) -> Result<Vec<String>, StandardsError> {
    let entries = std::fs::read_dir(dir).map_err(|e| StandardsError::io(dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StandardsError::io(dir, e))?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}
