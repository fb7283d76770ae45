//! Field Dispatch Resolver.

use pheno_model::{
    CanonicalEvent, ExtractionKey, FieldId, FieldKey, PhenotypeDefinition, Prevalence,
    TimeQualifier,
};
use tracing::{debug, warn};

use crate::error::{ExtractError, ResolveError};
use crate::source::SourceTables;
use crate::strategy::{CodeLevel, CodeSet, SelfReportKind, Strategy, Target};

/// Caller-supplied qualifier fields that take precedence over the definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overrides {
    pub age_field: Option<FieldId>,
    pub year_field: Option<FieldId>,
}

/// A strategy bound to its field and output phenotypes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub strategy: Strategy,
    pub field_id: FieldId,
    pub targets: Vec<Target>,
}

impl Resolution {
    /// Idempotency keys written by this resolution.
    pub fn output_keys(&self) -> Vec<ExtractionKey> {
        self.targets
            .iter()
            .map(|target| ExtractionKey::new(target.phenotype.clone(), self.field_id))
            .collect()
    }

    pub fn extract(&self, tables: &dyn SourceTables) -> Result<Vec<CanonicalEvent>, ExtractError> {
        let mut events = Vec::new();
        for target in &self.targets {
            let found = self.strategy.extract(self.field_id, target, tables)?;
            debug!(
                phenotype = %target.phenotype,
                field_id = %self.field_id,
                strategy = %self.strategy,
                rows = found.len(),
                "strategy finished"
            );
            events.extend(found);
        }
        Ok(events)
    }
}

/// Strategy for fields with a dedicated source-table shape.
///
/// `Ok(None)` means the field has no dedicated strategy and falls back to
/// its time qualifier.
fn standard_strategy(
    field: FieldId,
    is_biomarker: bool,
) -> Result<Option<Strategy>, ResolveError> {
    let strategy = match field {
        FieldId::SELF_REPORT_CANCER => Strategy::SelfReport(SelfReportKind::Cancer),
        FieldId::SELF_REPORT_NON_CANCER => Strategy::SelfReport(SelfReportKind::NonCancer),
        FieldId::SELF_REPORT_PROCEDURE => Strategy::SelfReport(SelfReportKind::Procedure),
        FieldId::HOSPITAL_PRIMARY_DIAGNOSIS => Strategy::HospitalDiagnosis(CodeLevel::Primary),
        FieldId::HOSPITAL_SECONDARY_DIAGNOSIS => {
            Strategy::HospitalDiagnosis(CodeLevel::Secondary)
        }
        FieldId::HOSPITAL_PRIMARY_PROCEDURE => Strategy::HospitalProcedure(CodeLevel::Primary),
        FieldId::HOSPITAL_SECONDARY_PROCEDURE => {
            Strategy::HospitalProcedure(CodeLevel::Secondary)
        }
        FieldId::DEATH_PRIMARY_CAUSE => Strategy::Mortality(CodeLevel::Primary),
        FieldId::DEATH_SECONDARY_CAUSE => Strategy::Mortality(CodeLevel::Secondary),
        FieldId::PRIMARY_CARE_DIAGNOSIS if is_biomarker => Strategy::EhrBiomarker,
        FieldId::PRIMARY_CARE_DIAGNOSIS => Strategy::PrimaryCare,
        FieldId::CANCER_TYPE => Strategy::CancerRegistry,
        FieldId::PRIMARY_CARE_PRESCRIPTION => {
            return Err(ResolveError::UnsupportedCodingSystem {
                field: FieldKey::Field(field),
                system: "primary-care prescriptions",
            });
        }
        FieldId::SELF_REPORT_MEDICATION => {
            return Err(ResolveError::UnsupportedCodingSystem {
                field: FieldKey::Field(field),
                system: "self-reported medication codes",
            });
        }
        _ => return Ok(None),
    };
    Ok(Some(strategy))
}

fn qualified_strategy(
    field: FieldId,
    qualifier: Option<TimeQualifier>,
    overrides: Overrides,
) -> Result<Strategy, ResolveError> {
    match qualifier {
        Some(TimeQualifier::Biomarker) => Ok(Strategy::BaselineBiomarker),
        Some(TimeQualifier::Baseline) => Ok(Strategy::BaselineQualified),
        Some(TimeQualifier::Age { field_id }) => overrides
            .age_field
            .or(field_id)
            .map(|age_field| Strategy::AgeQualified { age_field })
            .ok_or(ResolveError::MissingQualifierField {
                field,
                qualifier: "age",
            }),
        Some(TimeQualifier::Year { field_id }) => overrides
            .year_field
            .or(field_id)
            .map(|year_field| Strategy::YearQualified { year_field })
            .ok_or(ResolveError::MissingQualifierField {
                field,
                qualifier: "year",
            }),
        None => Err(ResolveError::UnsupportedQualifier { field }),
    }
}

/// Pick the strategy for one field of a phenotype and assemble its codes.
pub fn resolve(
    definition: &PhenotypeDefinition,
    key: FieldKey,
    overrides: Overrides,
) -> Result<Resolution, ResolveError> {
    let field = match key {
        FieldKey::Field(field) => field,
        FieldKey::SnomedCt => {
            return Err(ResolveError::UnsupportedCodingSystem {
                field: key,
                system: "SNOMED-CT",
            });
        }
        FieldKey::BaselineFields | FieldKey::Limits => {
            return Err(ResolveError::FieldNotDefined {
                phenotype: definition.name.clone(),
                field: key,
            });
        }
    };
    let field_definition =
        definition
            .field_definition(key)
            .ok_or_else(|| ResolveError::FieldNotDefined {
                phenotype: definition.name.clone(),
                field: key,
            })?;

    let strategy = match standard_strategy(field, definition.is_biomarker)? {
        Some(strategy) => strategy,
        None => {
            qualified_strategy(field, field_definition.metadata.time_qualifier, overrides)?
        }
    };

    let codes = CodeSet::new(
        owned(definition.values(key, Prevalence::Incident)),
        owned(definition.values(key, Prevalence::Prevalent)),
    );
    if !codes.prevalent.is_empty()
        && !strategy.uses_prevalent_codes()
        && !strategy.takes_all_rows()
    {
        warn!(
            phenotype = %definition.name,
            field_id = %field,
            strategy = %strategy,
            ignored = codes.prevalent.len(),
            "prevalent codes are not used by this strategy"
        );
    }

    let targets = if strategy == Strategy::EhrBiomarker {
        biomarker_targets(definition, key)
    } else {
        vec![Target {
            phenotype: definition.name.clone(),
            codes,
        }]
    };
    Ok(Resolution {
        strategy,
        field_id: field,
        targets,
    })
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

/// Serum and plasma outputs of a biomarker measured in primary care.
///
/// Codes tagged `plasma` feed `<name>_plasma`; everything else is serum.
fn biomarker_targets(definition: &PhenotypeDefinition, key: FieldKey) -> Vec<Target> {
    let mut serum = Vec::new();
    let mut plasma = Vec::new();
    if let Some(field) = definition.field_definition(key) {
        for entry in &field.values {
            match entry.group.as_deref() {
                Some(group) if group.eq_ignore_ascii_case("plasma") => {
                    plasma.push(entry.code.clone());
                }
                _ => serum.push(entry.code.clone()),
            }
        }
    }
    vec![
        Target {
            phenotype: format!("{}_serum", definition.name),
            codes: CodeSet::new(serum, Vec::new()),
        },
        Target {
            phenotype: format!("{}_plasma", definition.name),
            codes: CodeSet::new(plasma, Vec::new()),
        },
    ]
}
