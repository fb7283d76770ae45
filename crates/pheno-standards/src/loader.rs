//! Definition Parser: one YAML document per phenotype.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use pheno_model::{FieldDefinition, FieldKey, PhenotypeDefinition, PhenotypeMetadata};
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value as YamlValue};
use tracing::{debug, warn};

use crate::error::StandardsError;

/// Phenotypes treated as biomarkers when a document does not say.
pub const BIOMARKER_DEFAULTS: [&str; 4] = ["HighLDL", "HighTotChol", "HighTrig", "LowHDL"];

/// Undeclared top-level keys tolerated by default.
pub const DEFAULT_EXTRA_KEYS: [&str; 3] = ["notes", "references", "changelog"];

const METADATA_KEY: &str = "metadata";
const DEFINITIONS_KEY: &str = "definitions";

#[derive(Debug, Clone)]
pub struct DefinitionLoader {
    dir: PathBuf,
    allowed_extra_keys: BTreeSet<String>,
}

impl DefinitionLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            allowed_extra_keys: DEFAULT_EXTRA_KEYS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Replace the allow-list of undeclared top-level keys.
    #[must_use]
    pub fn with_allowed_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_extra_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.yaml"))
    }

    /// Load the definition document addressed by `name`.
    pub fn load(&self, name: &str) -> Result<PhenotypeDefinition, StandardsError> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(StandardsError::DefinitionNotFound {
                name: name.to_string(),
                path,
            });
        }
        let source =
            std::fs::read_to_string(&path).map_err(|e| StandardsError::io(&path, e))?;
        let definition = self.parse_str(&source, &path)?;
        if definition.name != name {
            warn!(
                file = %path.display(),
                variable_name = %definition.name,
                "definition file name differs from variable_name"
            );
        }
        Ok(definition)
    }

    /// Parse a document already in memory. `origin` is only used in errors.
    pub fn parse_str(
        &self,
        source: &str,
        origin: &Path,
    ) -> Result<PhenotypeDefinition, StandardsError> {
        let document: Mapping =
            serde_yaml::from_str(source).map_err(|e| StandardsError::yaml(origin, e))?;

        let mut metadata: Option<PhenotypeMetadata> = None;
        let mut definitions = Mapping::new();
        let mut extra = BTreeMap::new();
        for (key, value) in document {
            let Some(key) = key.as_str().map(str::to_string) else {
                return Err(StandardsError::invalid(
                    origin,
                    format!("top-level key {key:?} is not a string"),
                ));
            };
            match key.as_str() {
                METADATA_KEY => {
                    metadata = Some(
                        serde_yaml::from_value(value)
                            .map_err(|e| StandardsError::yaml(origin, e))?,
                    );
                }
                DEFINITIONS_KEY => {
                    definitions = match value {
                        YamlValue::Mapping(mapping) => mapping,
                        YamlValue::Null => Mapping::new(),
                        _ => {
                            return Err(StandardsError::invalid(
                                origin,
                                "`definitions` must be a mapping",
                            ));
                        }
                    };
                }
                _ if self.allowed_extra_keys.contains(&key) => {
                    extra.insert(key, yaml_to_json(value));
                }
                _ => {
                    return Err(StandardsError::UnexpectedKey {
                        path: origin.to_path_buf(),
                        key,
                    });
                }
            }
        }
        let metadata = metadata
            .ok_or_else(|| StandardsError::invalid(origin, "missing `metadata` block"))?;
        if metadata.variable_name.trim().is_empty() {
            return Err(StandardsError::invalid(
                origin,
                "`metadata.variable_name` is empty",
            ));
        }

        let mut fields: Vec<(FieldKey, FieldDefinition)> = Vec::new();
        let mut auxiliary = Vec::new();
        let mut seen = BTreeSet::new();
        for (key, value) in definitions {
            let key: FieldKey =
                serde_yaml::from_value(key).map_err(|e| StandardsError::yaml(origin, e))?;
            if !seen.insert(key) {
                return Err(StandardsError::invalid(
                    origin,
                    format!("field {key} is declared twice"),
                ));
            }
            if key.is_auxiliary() {
                auxiliary.push((key, yaml_to_json(value)));
                continue;
            }
            let mut field: FieldDefinition =
                serde_yaml::from_value(value).map_err(|e| StandardsError::yaml(origin, e))?;
            field.normalize(key);
            fields.push((key, field));
        }

        let is_biomarker = metadata
            .is_biomarker
            .unwrap_or_else(|| BIOMARKER_DEFAULTS.contains(&metadata.variable_name.as_str()));
        debug!(
            phenotype = %metadata.variable_name,
            fields = fields.len(),
            is_biomarker,
            "parsed definition"
        );
        Ok(PhenotypeDefinition::new(
            metadata,
            fields,
            auxiliary,
            extra,
            is_biomarker,
        ))
    }
}

/// YAML to JSON, stringifying non-string mapping keys.
fn yaml_to_json(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64().map_or(JsonValue::Null, JsonValue::from)
            }
        }
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => {
            JsonValue::Array(items.into_iter().map(yaml_to_json).collect())
        }
        YamlValue::Mapping(mapping) => JsonValue::Object(
            mapping
                .into_iter()
                .map(|(key, value)| (yaml_key(&key), yaml_to_json(value)))
                .collect(),
        ),
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pheno_model::{FieldId, Prevalence, TimeQualifier};

    const DOC: &str = r#"
metadata:
  phenotype: First degree AV block
  group: Cardiovascular
  is_cancer: 0
  is_adult: 1
  variable_name: av_block_1
  gender: both
  priority: 2
definitions:
  20002:
    metadata: {}
    values:
      - code: 1076
        value: heart arrhythmia
        ontology: ukbiobank
        type: incident
  41204:
    metadata:
    values:
      - code: I44.0
        value: Atrioventricular block, first degree
        ontology: icd10
        type: incident
  22127:
    metadata:
      time_qualifier:
        type: age
        field_id: 22126
    values:
      - code: "1"
        type: any
  limits:
    lower: 0
notes: curated 2021
"#;

    fn loader() -> DefinitionLoader {
        DefinitionLoader::new("unused")
    }

    #[test]
    fn parses_fields_in_document_order() {
        let definition = loader().parse_str(DOC, Path::new("av_block_1.yaml")).unwrap();
        assert_eq!(definition.name, "av_block_1");
        assert!(!definition.is_cancer);
        assert!(!definition.is_complex);
        assert!(!definition.is_biomarker);
        assert_eq!(
            definition.definition_fields(false),
            vec![
                FieldKey::Field(FieldId::new(20002)),
                FieldKey::Field(FieldId::new(41204)),
                FieldKey::Field(FieldId::new(22127)),
            ]
        );
        assert_eq!(
            definition.values(
                FieldKey::Field(FieldId::HOSPITAL_SECONDARY_DIAGNOSIS),
                Prevalence::Incident
            ),
            vec!["I440"]
        );
        assert_eq!(
            definition.values(FieldKey::Field(FieldId::new(20002)), Prevalence::Incident),
            vec!["1076"]
        );
        let age = definition
            .field_definition(FieldKey::Field(FieldId::new(22127)))
            .unwrap();
        assert_eq!(
            age.metadata.time_qualifier,
            Some(TimeQualifier::Age {
                field_id: Some(FieldId::new(22126))
            })
        );
        assert!(definition.auxiliary(FieldKey::Limits).is_some());
        assert_eq!(
            definition.extra.get("notes"),
            Some(&JsonValue::from("curated 2021"))
        );
        // 22127 is not a standard field, so it stays out of the code table.
        assert_eq!(definition.code_table().len(), 2);
    }

    #[test]
    fn rejects_unlisted_top_level_keys() {
        let doc = "metadata:\n  variable_name: x\nowner: someone\n";
        let err = loader().parse_str(doc, Path::new("x.yaml")).unwrap_err();
        assert!(matches!(err, StandardsError::UnexpectedKey { ref key, .. } if key == "owner"));

        let relaxed = loader().with_allowed_keys(["owner"]);
        let definition = relaxed.parse_str(doc, Path::new("x.yaml")).unwrap();
        assert_eq!(definition.extra.len(), 1);
    }

    #[test]
    fn biomarker_flag_prefers_document() {
        let listed = "metadata:\n  variable_name: HighLDL\n";
        assert!(
            loader()
                .parse_str(listed, Path::new("HighLDL.yaml"))
                .unwrap()
                .is_biomarker
        );

        let opted_out = "metadata:\n  variable_name: HighLDL\n  is_biomarker: 0\n";
        assert!(
            !loader()
                .parse_str(opted_out, Path::new("HighLDL.yaml"))
                .unwrap()
                .is_biomarker
        );

        let declared = "metadata:\n  variable_name: HighApoB\n  is_biomarker: true\n";
        assert!(
            loader()
                .parse_str(declared, Path::new("HighApoB.yaml"))
                .unwrap()
                .is_biomarker
        );
    }

    #[test]
    fn missing_document_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = DefinitionLoader::new(dir.path()).load("nothing").unwrap_err();
        assert!(matches!(err, StandardsError::DefinitionNotFound { ref name, .. } if name == "nothing"));
    }

    #[test]
    fn load_reads_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("av_block_1.yaml"), DOC).unwrap();
        let definition = DefinitionLoader::new(dir.path()).load("av_block_1").unwrap();
        assert_eq!(definition.category(), Some("Cardiovascular"));
    }

    #[test]
    fn missing_metadata_is_invalid() {
        let err = loader()
            .parse_str("definitions: {}\n", Path::new("y.yaml"))
            .unwrap_err();
        assert!(matches!(err, StandardsError::InvalidDefinition { .. }));
    }
}
