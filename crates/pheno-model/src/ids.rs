#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::ModelError;

/// Numeric source-field identifier (UK Biobank showcase field id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(u32);

impl FieldId {
    pub const YEAR_OF_BIRTH: Self = Self(34);
    pub const MONTH_OF_BIRTH: Self = Self(52);
    pub const ASSESSMENT_DATE: Self = Self(53);

    pub const SELF_REPORT_CANCER: Self = Self(20001);
    pub const SELF_REPORT_NON_CANCER: Self = Self(20002);
    pub const SELF_REPORT_MEDICATION: Self = Self(20003);
    pub const SELF_REPORT_PROCEDURE: Self = Self(20004);
    pub const SELF_REPORT_CANCER_YEAR: Self = Self(20006);
    pub const SELF_REPORT_NON_CANCER_YEAR: Self = Self(20008);
    pub const SELF_REPORT_PROCEDURE_YEAR: Self = Self(20010);

    pub const DEATH_PRIMARY_CAUSE: Self = Self(40001);
    pub const DEATH_SECONDARY_CAUSE: Self = Self(40002);
    pub const CANCER_DIAGNOSIS_DATE: Self = Self(40005);
    pub const CANCER_TYPE: Self = Self(40006);

    pub const HOSPITAL_PRIMARY_PROCEDURE: Self = Self(41200);
    pub const HOSPITAL_PRIMARY_DIAGNOSIS: Self = Self(41202);
    pub const HOSPITAL_SECONDARY_DIAGNOSIS: Self = Self(41204);
    pub const HOSPITAL_SECONDARY_PROCEDURE: Self = Self(41210);
    pub const HOSPITAL_ANY_DIAGNOSIS: Self = Self(41240);

    pub const PRIMARY_CARE_PRESCRIPTION: Self = Self(42039);
    pub const PRIMARY_CARE_DIAGNOSIS: Self = Self(42040);

    /// Fields with a dedicated extraction strategy or an explicit skip rule.
    pub const STANDARD: [Self; 13] = [
        Self::SELF_REPORT_CANCER,
        Self::SELF_REPORT_NON_CANCER,
        Self::SELF_REPORT_MEDICATION,
        Self::SELF_REPORT_PROCEDURE,
        Self::HOSPITAL_PRIMARY_DIAGNOSIS,
        Self::HOSPITAL_SECONDARY_DIAGNOSIS,
        Self::HOSPITAL_PRIMARY_PROCEDURE,
        Self::HOSPITAL_SECONDARY_PROCEDURE,
        Self::DEATH_PRIMARY_CAUSE,
        Self::DEATH_SECONDARY_CAUSE,
        Self::PRIMARY_CARE_DIAGNOSIS,
        Self::PRIMARY_CARE_PRESCRIPTION,
        Self::CANCER_TYPE,
    ];

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn is_standard(self) -> bool {
        Self::STANDARD.contains(&self)
    }

    /// Source category used when labelling first events.
    pub fn source_category(self) -> SourceCategory {
        match self {
            Self::HOSPITAL_PRIMARY_DIAGNOSIS
            | Self::HOSPITAL_SECONDARY_DIAGNOSIS
            | Self::HOSPITAL_PRIMARY_PROCEDURE
            | Self::HOSPITAL_SECONDARY_PROCEDURE
            | Self::HOSPITAL_ANY_DIAGNOSIS => SourceCategory::Hospital,
            Self::DEATH_PRIMARY_CAUSE | Self::DEATH_SECONDARY_CAUSE => SourceCategory::Death,
            Self::PRIMARY_CARE_DIAGNOSIS | Self::PRIMARY_CARE_PRESCRIPTION => {
                SourceCategory::PrimaryCare
            }
            Self::CANCER_TYPE => SourceCategory::Cancer,
            _ => SourceCategory::SelfReport,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FieldId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|_| ModelError::InvalidFieldKey(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCategory {
    Hospital,
    Death,
    PrimaryCare,
    Cancer,
    SelfReport,
}

impl SourceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hospital => "ehr_hospital",
            Self::Death => "ehr_death",
            Self::PrimaryCare => "ehr_primary_care",
            Self::Cancer => "ehr_cancer",
            Self::SelfReport => "selfreport",
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key of an entry under a definition document's `definitions` mapping.
///
/// Numeric keys are source fields; the symbolic keys carry a clinical
/// terminology block or biomarker bookkeeping that is never extracted as a
/// plain field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    Field(FieldId),
    SnomedCt,
    BaselineFields,
    Limits,
}

impl FieldKey {
    pub const SNOMED_CT: &'static str = "SNOMED-CT";
    pub const BASELINE_FIELDS: &'static str = "baseline_fields";
    pub const LIMITS: &'static str = "limits";

    pub fn field_id(self) -> Option<FieldId> {
        match self {
            Self::Field(id) => Some(id),
            _ => None,
        }
    }

    /// True for keys whose payload is not a list of codes.
    pub fn is_auxiliary(self) -> bool {
        matches!(self, Self::BaselineFields | Self::Limits)
    }
}

impl From<FieldId> for FieldKey {
    fn from(value: FieldId) -> Self {
        Self::Field(value)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(id) => write!(f, "{id}"),
            Self::SnomedCt => f.write_str(Self::SNOMED_CT),
            Self::BaselineFields => f.write_str(Self::BASELINE_FIELDS),
            Self::Limits => f.write_str(Self::LIMITS),
        }
    }
}

impl FromStr for FieldKey {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            Self::SNOMED_CT => Ok(Self::SnomedCt),
            Self::BASELINE_FIELDS => Ok(Self::BaselineFields),
            Self::LIMITS => Ok(Self::Limits),
            other => other.parse::<FieldId>().map(Self::Field),
        }
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Field(id) => serializer.serialize_u32(id.get()),
            other => serializer.collect_str(other),
        }
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldKeyVisitor;

        impl Visitor<'_> for FieldKeyVisitor {
            type Value = FieldKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a numeric field id or one of SNOMED-CT, baseline_fields, limits")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<FieldKey, E> {
                u32::try_from(v)
                    .map(|id| FieldKey::Field(FieldId::new(id)))
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<FieldKey, E> {
                u32::try_from(v)
                    .map(|id| FieldKey::Field(FieldId::new(id)))
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<FieldKey, E> {
                v.parse::<FieldKey>()
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(FieldKeyVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_symbolic_keys() {
        assert_eq!(
            "41202".parse::<FieldKey>().unwrap(),
            FieldKey::Field(FieldId::HOSPITAL_PRIMARY_DIAGNOSIS)
        );
        assert_eq!("SNOMED-CT".parse::<FieldKey>().unwrap(), FieldKey::SnomedCt);
        assert_eq!(
            "baseline_fields".parse::<FieldKey>().unwrap(),
            FieldKey::BaselineFields
        );
        assert!("snomed".parse::<FieldKey>().is_err());
    }

    #[test]
    fn field_key_json_shape() {
        let keys = vec![FieldKey::Field(FieldId::new(20002)), FieldKey::SnomedCt];
        let json = serde_json::to_string(&keys).unwrap();
        assert_eq!(json, r#"[20002,"SNOMED-CT"]"#);
        let back: Vec<FieldKey> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, keys);
    }

    #[test]
    fn source_categories() {
        assert_eq!(
            FieldId::HOSPITAL_SECONDARY_PROCEDURE.source_category(),
            SourceCategory::Hospital
        );
        assert_eq!(FieldId::new(41240).source_category().as_str(), "ehr_hospital");
        assert_eq!(FieldId::DEATH_PRIMARY_CAUSE.source_category().as_str(), "ehr_death");
        assert_eq!(FieldId::CANCER_TYPE.source_category().as_str(), "ehr_cancer");
        assert_eq!(FieldId::new(22127).source_category().as_str(), "selfreport");
        assert!(FieldId::PRIMARY_CARE_PRESCRIPTION.is_standard());
        assert!(!FieldId::new(22127).is_standard());
    }
}
