//! Extraction strategies, one per source-table shape.
//!
//! Each strategy is a pure function of the target phenotype, its codes and
//! the source tables. Persistence belongs to the caller.

mod biomarker;
mod hospital;
mod mortality;
mod primary_care;
mod qualified;
mod registry;

use std::fmt;

use pheno_model::{CanonicalEvent, FieldId, Predicate};
use polars::prelude::LazyFrame;

use crate::error::ExtractError;
use crate::frame::TableView;
use crate::matcher::all_of;
use crate::source::SourceTables;

/// Codes of one field, split by prevalence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSet {
    pub incident: Vec<String>,
    pub prevalent: Vec<String>,
}

impl CodeSet {
    pub fn new(incident: Vec<String>, prevalent: Vec<String>) -> Self {
        Self {
            incident,
            prevalent,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.incident.is_empty() && self.prevalent.is_empty()
    }
}

/// One output phenotype of a resolved field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub phenotype: String,
    pub codes: CodeSet,
}

/// Diagnosis or cause position (`level` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodeLevel {
    Primary,
    Secondary,
}

impl CodeLevel {
    pub fn level(self) -> i64 {
        match self {
            Self::Primary => 1,
            Self::Secondary => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelfReportKind {
    Cancer,
    NonCancer,
    Procedure,
}

impl SelfReportKind {
    /// Field holding the interpolated year of each reported item.
    pub fn year_field(self) -> FieldId {
        match self {
            Self::Cancer => FieldId::SELF_REPORT_CANCER_YEAR,
            Self::NonCancer => FieldId::SELF_REPORT_NON_CANCER_YEAR,
            Self::Procedure => FieldId::SELF_REPORT_PROCEDURE_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    SelfReport(SelfReportKind),
    HospitalDiagnosis(CodeLevel),
    HospitalProcedure(CodeLevel),
    Mortality(CodeLevel),
    PrimaryCare,
    CancerRegistry,
    /// Primary-care measurements split by medium into `<name>_serum` and `<name>_plasma`.
    EhrBiomarker,
    BaselineBiomarker,
    BaselineQualified,
    AgeQualified { age_field: FieldId },
    YearQualified { year_field: FieldId },
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::SelfReport(SelfReportKind::Cancer) => "self_report_cancer",
            Self::SelfReport(SelfReportKind::NonCancer) => "self_report_non_cancer",
            Self::SelfReport(SelfReportKind::Procedure) => "self_report_procedure",
            Self::HospitalDiagnosis(CodeLevel::Primary) => "hospital_primary_diagnosis",
            Self::HospitalDiagnosis(CodeLevel::Secondary) => "hospital_secondary_diagnosis",
            Self::HospitalProcedure(CodeLevel::Primary) => "hospital_primary_procedure",
            Self::HospitalProcedure(CodeLevel::Secondary) => "hospital_secondary_procedure",
            Self::Mortality(CodeLevel::Primary) => "primary_mortality",
            Self::Mortality(CodeLevel::Secondary) => "secondary_mortality",
            Self::PrimaryCare => "primary_care",
            Self::CancerRegistry => "cancer_registry",
            Self::EhrBiomarker => "ehr_biomarker",
            Self::BaselineBiomarker => "baseline_biomarker",
            Self::BaselineQualified => "baseline_qualified",
            Self::AgeQualified { .. } => "age_qualified",
            Self::YearQualified { .. } => "year_qualified",
        }
    }

    /// Whether the strategy runs a separate undated pass for prevalent codes.
    pub fn uses_prevalent_codes(self) -> bool {
        matches!(
            self,
            Self::HospitalDiagnosis(_) | Self::HospitalProcedure(_) | Self::PrimaryCare
        )
    }

    /// Whether the strategy ignores the declared codes and takes every row.
    pub fn takes_all_rows(self) -> bool {
        matches!(self, Self::BaselineBiomarker)
    }

    pub fn extract(
        self,
        field_id: FieldId,
        target: &Target,
        tables: &dyn SourceTables,
    ) -> Result<Vec<CanonicalEvent>, ExtractError> {
        match self {
            Self::SelfReport(kind) => {
                qualified::year_qualified(field_id, kind.year_field(), target, tables)
            }
            Self::HospitalDiagnosis(level) => {
                hospital::diagnoses(field_id, level, target, tables)
            }
            Self::HospitalProcedure(level) => {
                hospital::procedures(field_id, level, target, tables)
            }
            Self::Mortality(level) => mortality::causes(field_id, level, target, tables),
            Self::PrimaryCare => primary_care::diagnoses(field_id, target, tables),
            Self::CancerRegistry => registry::cancers(field_id, target, tables),
            Self::EhrBiomarker => biomarker::ehr(field_id, target, tables),
            Self::BaselineBiomarker => biomarker::baseline(field_id, target, tables),
            Self::BaselineQualified => qualified::baseline_qualified(field_id, target, tables),
            Self::AgeQualified { age_field } => {
                qualified::age_qualified(field_id, age_field, target, tables)
            }
            Self::YearQualified { year_field } => {
                qualified::year_qualified(field_id, year_field, target, tables)
            }
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Boolean column marking incident matches in [`two_pass`] output.
pub(crate) const INCIDENT: &str = "incident";

/// Matched rows of an incident/prevalent two-pass strategy, in table order.
///
/// A row matching both code lists is reported once, as incident.
pub(crate) fn two_pass(
    view: &TableView,
    base: &[Predicate],
    code_predicate: impl Fn(&[String]) -> Predicate,
    codes: &CodeSet,
) -> Result<LazyFrame, ExtractError> {
    let mut incident_predicates = base.to_vec();
    incident_predicates.push(code_predicate(&codes.incident));
    let incident = all_of(&incident_predicates)?;

    let matched = if codes.prevalent.is_empty() {
        incident.clone()
    } else {
        let mut prevalent_predicates = base.to_vec();
        prevalent_predicates.push(code_predicate(&codes.prevalent));
        incident.clone().or(all_of(&prevalent_predicates)?)
    };
    Ok(view
        .frame()
        .filter(matched)
        .with_column(incident.alias(INCIDENT)))
}
