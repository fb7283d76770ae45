//! In-memory model of a phenotype definition document.
//!
//! Documents are YAML upstream, but nothing here depends on the format: the
//! loader in `pheno-standards` decodes the document and hands the pieces to
//! [`PhenotypeDefinition::new`]. Free-form payloads are kept as
//! [`serde_json::Value`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::ids::{FieldId, FieldKey};

/// Prevalence tag on a code entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prevalence {
    /// Event with a meaningful occurrence date. Older documents spell it `any`.
    #[serde(alias = "any")]
    Incident,
    /// Known fact without a reliable date.
    Prevalent,
}

impl Prevalence {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::Prevalent => "prevalent",
        }
    }
}

impl fmt::Display for Prevalence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntry {
    #[serde(deserialize_with = "scalar_string")]
    pub code: String,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub value: Option<String>,
    #[serde(default)]
    pub ontology: Option<String>,
    #[serde(rename = "type")]
    pub prevalence: Prevalence,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub group: Option<String>,
}

/// How a field without a dedicated strategy obtains its event date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TimeQualifier {
    /// Recorded value is an age; the date is year of birth plus age.
    Age {
        #[serde(default)]
        field_id: Option<FieldId>,
    },
    /// Date is the subject's assessment-centre visit.
    Baseline,
    /// Recorded value is a calendar year.
    Year {
        #[serde(default)]
        field_id: Option<FieldId>,
    },
    /// Field is a measured biomarker dated by the assessment visit.
    Biomarker,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadata {
    #[serde(default)]
    pub time_qualifier: Option<TimeQualifier>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: FieldMetadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: Vec<CodeEntry>,
}

impl FieldDefinition {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn codes(&self, prevalence: Prevalence) -> impl Iterator<Item = &str> {
        self.values
            .iter()
            .filter(move |entry| entry.prevalence == prevalence)
            .map(|entry| entry.code.as_str())
    }

    /// Normalizes every code in place for the field it belongs to.
    pub fn normalize(&mut self, key: FieldKey) {
        for entry in &mut self.values {
            entry.code = normalize_code(key, &entry.code);
        }
    }
}

/// Normalizes a code for matching against source tables.
///
/// Primary-care Read codes keep their first five characters, prescription
/// codes are left as written, every other ontology drops `.` separators
/// (ICD-10 `I44.0` becomes `I440`).
pub fn normalize_code(key: FieldKey, code: &str) -> String {
    let code = code.trim();
    match key {
        FieldKey::Field(FieldId::PRIMARY_CARE_DIAGNOSIS) => code.chars().take(5).collect(),
        FieldKey::Field(FieldId::PRIMARY_CARE_PRESCRIPTION) => code.to_string(),
        _ => code.replace('.', ""),
    }
}

/// Top-level `metadata` block of a definition document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhenotypeMetadata {
    #[serde(deserialize_with = "scalar_string")]
    pub variable_name: String,
    #[serde(default)]
    pub phenotype: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, deserialize_with = "flag")]
    pub is_cancer: bool,
    #[serde(default, deserialize_with = "flag")]
    pub is_adult: bool,
    #[serde(default, deserialize_with = "optional_flag")]
    pub is_biomarker: Option<bool>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ontologies: BTreeMap<String, Value>,
    #[serde(default)]
    pub short_desc: Option<String>,
    #[serde(default)]
    pub long_desc: Option<String>,
    #[serde(default)]
    pub complex_logic: Option<Value>,
    #[serde(default)]
    pub created_by: Option<Value>,
    #[serde(default, deserialize_with = "optional_scalar_string")]
    pub date_created: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A code of a standard field, flattened out of its field definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeRecord {
    pub field: FieldId,
    pub code: String,
    pub value: Option<String>,
    pub ontology: Option<String>,
    pub prevalence: Prevalence,
    pub group: Option<String>,
}

/// Prescription codes grouped by ontology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Prescriptions {
    pub bnf: Vec<String>,
    pub dmd: Vec<String>,
    pub welsh_read: Vec<String>,
}

/// One parsed phenotype definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PhenotypeDefinition {
    pub name: String,
    pub metadata: PhenotypeMetadata,
    /// Code-bearing entries in document order.
    fields: Vec<(FieldKey, FieldDefinition)>,
    /// `baseline_fields` and `limits` payloads.
    auxiliary: Vec<(FieldKey, Value)>,
    /// Undeclared top-level document keys that passed the loader allow-list.
    pub extra: BTreeMap<String, Value>,
    pub is_cancer: bool,
    pub is_complex: bool,
    pub is_biomarker: bool,
    code_table: Vec<CodeRecord>,
}

impl PhenotypeDefinition {
    /// Assembles a definition. Codes must already be normalized.
    pub fn new(
        metadata: PhenotypeMetadata,
        fields: Vec<(FieldKey, FieldDefinition)>,
        auxiliary: Vec<(FieldKey, Value)>,
        extra: BTreeMap<String, Value>,
        is_biomarker: bool,
    ) -> Self {
        let code_table = fields
            .iter()
            .filter_map(|(key, definition)| {
                key.field_id()
                    .filter(|id| id.is_standard())
                    .map(|id| (id, definition))
            })
            .flat_map(|(field, definition)| {
                definition.values.iter().map(move |entry| CodeRecord {
                    field,
                    code: entry.code.clone(),
                    value: entry.value.clone(),
                    ontology: entry.ontology.clone(),
                    prevalence: entry.prevalence,
                    group: entry.group.clone(),
                })
            })
            .collect();
        Self {
            name: metadata.variable_name.clone(),
            is_cancer: metadata.is_cancer,
            is_complex: metadata.complex_logic.is_some(),
            is_biomarker,
            metadata,
            fields,
            auxiliary,
            extra,
            code_table,
        }
    }

    pub fn category(&self) -> Option<&str> {
        self.metadata.group.as_deref()
    }

    /// Keys of the fields that declare at least one code, in document order.
    ///
    /// `limits` is never listed; `baseline_fields` only when requested.
    pub fn definition_fields(&self, include_baseline: bool) -> Vec<FieldKey> {
        let mut keys: Vec<FieldKey> = self
            .fields
            .iter()
            .filter(|(_, definition)| !definition.is_empty())
            .map(|(key, _)| *key)
            .collect();
        if include_baseline
            && self
                .auxiliary
                .iter()
                .any(|(key, _)| *key == FieldKey::BaselineFields)
        {
            keys.push(FieldKey::BaselineFields);
        }
        keys
    }

    /// Definition of a field, or `None` when absent or declaring no codes.
    pub fn field_definition(&self, key: FieldKey) -> Option<&FieldDefinition> {
        self.fields
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, definition)| definition)
            .filter(|definition| !definition.is_empty())
    }

    /// Normalized codes of one prevalence for a field.
    pub fn values(&self, key: FieldKey, prevalence: Prevalence) -> Vec<&str> {
        self.field_definition(key)
            .map(|definition| definition.codes(prevalence).collect())
            .unwrap_or_default()
    }

    pub fn auxiliary(&self, key: FieldKey) -> Option<&Value> {
        self.auxiliary
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, value)| value)
    }

    /// Normalized code table across every standard field.
    pub fn code_table(&self) -> &[CodeRecord] {
        &self.code_table
    }

    /// Prescription codes grouped by ontology, when any are declared.
    pub fn prescriptions(&self) -> Option<Prescriptions> {
        let definition =
            self.field_definition(FieldKey::Field(FieldId::PRIMARY_CARE_PRESCRIPTION))?;
        let mut prescriptions = Prescriptions::default();
        for entry in &definition.values {
            let bucket = match entry.ontology.as_deref() {
                Some("bnf") => &mut prescriptions.bnf,
                Some("dmd") => &mut prescriptions.dmd,
                Some("welsh_read") => &mut prescriptions.welsh_read,
                _ => continue,
            };
            bucket.push(entry.code.clone());
        }
        Some(prescriptions)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

struct ScalarVisitor;

impl Visitor<'_> for ScalarVisitor {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

// Codes such as `1111` are often written unquoted.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    deserializer
        .deserialize_any(ScalarVisitor)?
        .ok_or_else(|| de::Error::custom("expected a string or number, found null"))
}

fn optional_scalar_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    deserializer.deserialize_any(ScalarVisitor)
}

fn parse_flag<E: de::Error>(raw: &str) -> Result<bool, E> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(true),
        "0" | "false" | "no" | "n" | "" => Ok(false),
        other => Err(E::custom(format!("invalid flag value {other:?}"))),
    }
}

fn optional_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    match deserializer.deserialize_any(ScalarVisitor)? {
        Some(raw) => parse_flag(&raw).map(Some),
        None => Ok(None),
    }
}

// Flags appear as booleans, integers, or quoted integers.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(optional_flag(deserializer)?.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, prevalence: Prevalence) -> CodeEntry {
        CodeEntry {
            code: code.to_string(),
            value: None,
            ontology: None,
            prevalence,
            group: None,
        }
    }

    fn metadata(name: &str) -> PhenotypeMetadata {
        PhenotypeMetadata {
            variable_name: name.to_string(),
            ..PhenotypeMetadata::default()
        }
    }

    #[test]
    fn normalizes_codes_per_field() {
        let icd = FieldKey::Field(FieldId::HOSPITAL_PRIMARY_DIAGNOSIS);
        let read = FieldKey::Field(FieldId::PRIMARY_CARE_DIAGNOSIS);
        assert_eq!(normalize_code(icd, "I44.0"), "I440");
        assert_eq!(normalize_code(read, "14B4.00"), "14B4.");
        assert_eq!(normalize_code(read, "H33"), "H33");
        assert_eq!(
            normalize_code(FieldKey::Field(FieldId::PRIMARY_CARE_PRESCRIPTION), "03.02"),
            "03.02"
        );
    }

    #[test]
    fn values_partition_by_prevalence() {
        let key = FieldKey::Field(FieldId::PRIMARY_CARE_DIAGNOSIS);
        let field = FieldDefinition {
            metadata: FieldMetadata::default(),
            values: vec![
                entry("H33..", Prevalence::Incident),
                entry("14B4.", Prevalence::Prevalent),
            ],
        };
        let definition = PhenotypeDefinition::new(
            metadata("asthma"),
            vec![(key, field)],
            Vec::new(),
            BTreeMap::new(),
            false,
        );
        assert_eq!(definition.values(key, Prevalence::Prevalent), vec!["14B4."]);
        assert_eq!(definition.values(key, Prevalence::Incident), vec!["H33.."]);
        assert_eq!(definition.code_table().len(), 2);
    }

    #[test]
    fn empty_fields_are_not_listed() {
        let filled = FieldKey::Field(FieldId::SELF_REPORT_NON_CANCER);
        let empty = FieldKey::Field(FieldId::PRIMARY_CARE_DIAGNOSIS);
        let definition = PhenotypeDefinition::new(
            metadata("aki"),
            vec![
                (
                    filled,
                    FieldDefinition {
                        metadata: FieldMetadata::default(),
                        values: vec![entry("1192", Prevalence::Incident)],
                    },
                ),
                (empty, FieldDefinition::default()),
            ],
            vec![(FieldKey::BaselineFields, Value::Null)],
            BTreeMap::new(),
            false,
        );
        assert_eq!(definition.definition_fields(false), vec![filled]);
        assert_eq!(
            definition.definition_fields(true),
            vec![filled, FieldKey::BaselineFields]
        );
        assert!(definition.field_definition(empty).is_none());
        assert!(definition.values(empty, Prevalence::Incident).is_empty());
    }

    #[test]
    fn flags_accept_strings_and_numbers() {
        let meta: PhenotypeMetadata = serde_json::from_str(
            r#"{"variable_name": "x", "is_cancer": "1", "is_adult": 1, "is_biomarker": true,
                "priority": 2, "complex_logic": {"function": "f"}, "owner": "cardio"}"#,
        )
        .unwrap();
        assert!(meta.is_cancer);
        assert!(meta.is_adult);
        assert_eq!(meta.is_biomarker, Some(true));
        assert_eq!(meta.priority.as_deref(), Some("2"));
        assert_eq!(meta.extra.get("owner"), Some(&Value::from("cardio")));

        let definition =
            PhenotypeDefinition::new(meta, Vec::new(), Vec::new(), BTreeMap::new(), false);
        assert!(definition.is_complex);
        assert!(definition.is_cancer);
    }

    #[test]
    fn time_qualifier_shapes() {
        let age: TimeQualifier =
            serde_json::from_str(r#"{"type": "age", "field_id": 22126}"#).unwrap();
        assert_eq!(
            age,
            TimeQualifier::Age {
                field_id: Some(FieldId::new(22126))
            }
        );
        let baseline: TimeQualifier = serde_json::from_str(r#"{"type": "baseline"}"#).unwrap();
        assert_eq!(baseline, TimeQualifier::Baseline);
        let any: Prevalence = serde_json::from_str(r#""any""#).unwrap();
        assert_eq!(any, Prevalence::Incident);
    }

    #[test]
    fn prescriptions_grouped_by_ontology() {
        let key = FieldKey::Field(FieldId::PRIMARY_CARE_PRESCRIPTION);
        let mut bnf = entry("0302000C0", Prevalence::Incident);
        bnf.ontology = Some("bnf".to_string());
        let mut dmd = entry("3190211000001103", Prevalence::Incident);
        dmd.ontology = Some("dmd".to_string());
        let definition = PhenotypeDefinition::new(
            metadata("asthma"),
            vec![(
                key,
                FieldDefinition {
                    metadata: FieldMetadata::default(),
                    values: vec![bnf, dmd],
                },
            )],
            Vec::new(),
            BTreeMap::new(),
            false,
        );
        let prescriptions = definition.prescriptions().unwrap();
        assert_eq!(prescriptions.bnf, vec!["0302000C0"]);
        assert_eq!(prescriptions.dmd, vec!["3190211000001103"]);
        assert!(prescriptions.welsh_read.is_empty());
    }
}
