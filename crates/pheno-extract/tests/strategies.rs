//! Strategy behaviour against small in-memory source tables.

use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, IntoColumn, NamedFrom, Series};

use pheno_extract::{FrameSource, Overrides, SourceTable, Strategy, resolve};
use pheno_model::{CanonicalEvent, FieldId, FieldKey, PhenotypeDefinition, sentinel_date};
use pheno_standards::DefinitionLoader;

fn test_df(columns: Vec<(&str, Vec<&str>)>) -> DataFrame {
    let cols: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| {
            Series::new(
                name.into(),
                values.iter().copied().map(String::from).collect::<Vec<_>>(),
            )
            .into_column()
        })
        .collect();
    DataFrame::new(cols).unwrap()
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn parse(doc: &str) -> PhenotypeDefinition {
    DefinitionLoader::new("unused")
        .parse_str(doc, Path::new("test.yaml"))
        .unwrap()
}

fn run(definition: &PhenotypeDefinition, field: u32, source: &FrameSource) -> Vec<CanonicalEvent> {
    let key = FieldKey::Field(FieldId::new(field));
    let resolution = resolve(definition, key, Overrides::default()).unwrap();
    resolution.extract(source).unwrap()
}

fn summary(events: &[CanonicalEvent]) -> Vec<(i64, String, NaiveDate)> {
    events
        .iter()
        .map(|e| (e.eid, e.field_value.clone(), e.event_date))
        .collect()
}

const AV_BLOCK: &str = r#"
metadata:
  variable_name: av_block_1
  group: Cardiovascular
definitions:
  41202:
    metadata: {}
    values:
      - code: I44.0
        type: incident
      - code: I44.1
        type: prevalent
  41200:
    metadata: {}
    values:
      - code: K59
        type: incident
"#;

fn hospital_source() -> FrameSource {
    FrameSource::new()
        .with_table(
            SourceTable::Hesin,
            test_df(vec![
                ("eid", vec!["1", "2", "3"]),
                ("ins_index", vec!["0", "0", "0"]),
                ("admidate", vec!["2010-05-01", "2012-01-01", ""]),
                ("epistart", vec!["2010-04-30", "2011-12-30", "2015-03-02"]),
            ]),
        )
        .unwrap()
        .with_table(
            SourceTable::HesinDiag,
            test_df(vec![
                ("eid", vec!["1", "2", "3", "3", "4"]),
                ("ins_index", vec!["0", "0", "0", "0", "0"]),
                ("level", vec!["1", "1", "2", "1", "1"]),
                ("diag_icd10", vec!["I440", "I441", "I440", "I449", "I440"]),
            ]),
        )
        .unwrap()
        .with_table(
            SourceTable::HesinOper,
            test_df(vec![
                ("eid", vec!["1", "3"]),
                ("ins_index", vec!["0", "0"]),
                ("level", vec!["1", "1"]),
                ("oper4", vec!["K591", "K592"]),
                ("opdate", vec!["2010-05-03", ""]),
            ]),
        )
        .unwrap()
}

#[test]
fn hospital_diagnosis_incident_and_prevalent_passes() {
    let definition = parse(AV_BLOCK);
    let events = run(&definition, 41202, &hospital_source());
    assert_eq!(
        summary(&events),
        vec![
            (1, "I440".to_string(), ymd(2010, 5, 1)),
            (2, "I441".to_string(), sentinel_date()),
        ]
    );
    assert!(events.iter().all(|e| e.phenotype == "av_block_1"));
    assert!(events.iter().all(|e| e.field_id == FieldId::new(41202)));
    assert!(events.iter().all(|e| e.data_value.is_none()));
}

#[test]
fn hospital_procedure_prefers_operation_date() {
    let definition = parse(AV_BLOCK);
    let events = run(&definition, 41200, &hospital_source());
    assert_eq!(
        summary(&events),
        vec![
            (1, "K591".to_string(), ymd(2010, 5, 3)),
            (3, "K592".to_string(), ymd(2015, 3, 2)),
        ]
    );
}

#[test]
fn self_report_uses_year_field_of_same_instance() {
    let definition = parse(
        r#"
metadata:
  variable_name: asthma
definitions:
  20002:
    metadata: {}
    values:
      - code: 1111
        type: incident
"#,
    );
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "2", "2", "3"]),
                ("field", vec!["20002", "20008", "20002", "20008", "20002"]),
                ("i", vec!["0", "0", "1", "1", "0"]),
                ("n", vec!["0", "0", "2", "2", "0"]),
                ("value", vec!["1111", "1998.6", "1111", "-1", "1065"]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 20002, &source);
    assert_eq!(
        summary(&events),
        vec![
            (1, "1111".to_string(), ymd(1999, 1, 1)),
            (2, "1111".to_string(), sentinel_date()),
        ]
    );
}

#[test]
fn age_qualifier_adds_age_to_year_of_birth() {
    let definition = parse(
        r#"
metadata:
  variable_name: asthma
definitions:
  6152:
    metadata:
      time_qualifier:
        type: age
        field_id: 3786
    values:
      - code: "8"
        type: incident
"#,
    );
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "1", "2", "2", "2"]),
                ("field", vec!["34", "6152", "3786", "34", "6152", "3786"]),
                ("i", vec!["0", "0", "0", "0", "0", "0"]),
                ("n", vec!["0", "1", "1", "0", "0", "0"]),
                ("value", vec!["1950", "8", "30", "1960", "8", "-1"]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 6152, &source);
    assert_eq!(
        summary(&events),
        vec![
            (1, "8".to_string(), ymd(1980, 1, 1)),
            (2, "8".to_string(), sentinel_date()),
        ]
    );
}

#[test]
fn baseline_qualifier_dates_by_first_assessment_visit() {
    let definition = parse(
        r#"
metadata:
  variable_name: diabetes_any
definitions:
  2443:
    metadata:
      time_qualifier:
        type: baseline
    values:
      - code: "1"
        type: incident
"#,
    );
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "1", "1", "2", "3"]),
                ("field", vec!["2443", "53", "53", "2443", "2443", "2443"]),
                ("i", vec!["0", "1", "0", "1", "0", "0"]),
                ("n", vec!["0", "0", "0", "0", "0", "0"]),
                ("value", vec!["1", "2013-01-01", "2008-05-06", "1", "1", "0"]),
            ]),
        )
        .unwrap();
    let key = FieldKey::Field(FieldId::new(2443));
    let resolution = resolve(&definition, key, Overrides::default()).unwrap();
    assert_eq!(resolution.strategy, Strategy::BaselineQualified);
    let events = resolution.extract(&source).unwrap();
    assert_eq!(
        summary(&events),
        vec![
            (1, "1".to_string(), ymd(2008, 5, 6)),
            (1, "1".to_string(), ymd(2008, 5, 6)),
            (2, "1".to_string(), sentinel_date()),
        ]
    );
}

#[test]
fn year_qualifier_pairs_declared_year_field() {
    let definition = parse(
        r#"
metadata:
  variable_name: asthma
definitions:
  6150:
    metadata:
      time_qualifier:
        type: year
        field_id: 3627
    values:
      - code: "1"
        type: incident
"#,
    );
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "1", "1", "2", "2", "3", "3"]),
                (
                    "field",
                    vec!["6150", "3627", "6150", "3627", "6150", "3627", "6150", "3627"],
                ),
                ("i", vec!["0", "0", "0", "0", "0", "0", "1", "0"]),
                ("n", vec!["0", "0", "1", "1", "0", "0", "0", "0"]),
                ("value", vec!["1", "2003.4", "1", "0", "1", "-3", "1", "1990"]),
            ]),
        )
        .unwrap();
    let key = FieldKey::Field(FieldId::new(6150));
    let resolution = resolve(&definition, key, Overrides::default()).unwrap();
    assert_eq!(
        resolution.strategy,
        Strategy::YearQualified {
            year_field: FieldId::new(3627)
        }
    );
    let events = resolution.extract(&source).unwrap();
    assert_eq!(
        summary(&events),
        vec![
            (1, "1".to_string(), ymd(2003, 1, 1)),
            (1, "1".to_string(), sentinel_date()),
            (2, "1".to_string(), sentinel_date()),
            (3, "1".to_string(), sentinel_date()),
        ]
    );
}

#[test]
fn mortality_filters_by_level_and_uses_death_date() {
    let definition = parse(
        r#"
metadata:
  variable_name: asthma
definitions:
  40002:
    metadata: {}
    values:
      - code: J45
        type: incident
"#,
    );
    let source = FrameSource::new()
        .with_table(
            SourceTable::Death,
            test_df(vec![
                ("eid", vec!["1", "1", "2"]),
                ("date_of_death", vec!["2019-02-03", "2019-01-03", "2020-06-01"]),
            ]),
        )
        .unwrap()
        .with_table(
            SourceTable::DeathCause,
            test_df(vec![
                ("eid", vec!["1", "2", "2", "9"]),
                ("level", vec!["2", "1", "2", "2"]),
                ("cause_icd10", vec!["J459", "J45", "I21", "J45"]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 40002, &source);
    assert_eq!(summary(&events), vec![(1, "J459".to_string(), ymd(2019, 1, 3))]);
}

#[test]
fn primary_care_prevalent_codes_are_undated() {
    let definition = parse(
        r#"
metadata:
  variable_name: asthma
definitions:
  42040:
    metadata: {}
    values:
      - code: H33..00
        type: incident
      - code: 14B4.00
        type: prevalent
"#,
    );
    let source = FrameSource::new()
        .with_table(
            SourceTable::GpClinical,
            test_df(vec![
                ("eid", vec!["1", "1", "2", "3"]),
                ("data_provider", vec!["1", "1", "3", "1"]),
                ("eventdate", vec!["2001-02-03", "2003-04-05", "", "2004-01-01"]),
                ("value1", vec!["", "", "", ""]),
                ("value2", vec!["", "", "", ""]),
                ("value3", vec!["", "", "", ""]),
                ("read_code", vec!["H33..", "14B4.", "H33..", "H333."]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 42040, &source);
    assert_eq!(
        summary(&events),
        vec![
            (1, "H33..".to_string(), ymd(2001, 2, 3)),
            (1, "14B4.".to_string(), sentinel_date()),
            (2, "H33..".to_string(), sentinel_date()),
        ]
    );
}

#[test]
fn cancer_registry_matches_prefix_and_pairs_date() {
    let definition = parse(
        r#"
metadata:
  variable_name: breast_cancer
  is_cancer: 1
definitions:
  40006:
    metadata: {}
    values:
      - code: C50
        type: incident
"#,
    );
    assert!(definition.is_cancer);
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "1", "1", "2"]),
                ("field", vec!["40006", "40005", "40006", "40005", "40006"]),
                ("i", vec!["0", "0", "1", "1", "0"]),
                ("n", vec!["0", "0", "0", "0", "0"]),
                ("value", vec!["C509", "2008-07-01", "C61", "2011-01-01", "C50"]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 40006, &source);
    assert_eq!(
        summary(&events),
        vec![
            (1, "C509".to_string(), ymd(2008, 7, 1)),
            (2, "C50".to_string(), sentinel_date()),
        ]
    );
}

const HIGH_LDL: &str = r#"
metadata:
  variable_name: HighLDL
definitions:
  30780:
    metadata:
      time_qualifier:
        type: biomarker
    values:
      - code: "30780"
        type: incident
  42040:
    metadata: {}
    values:
      - code: 44P6.00
        type: incident
        group: serum
      - code: 44d5.00
        type: incident
        group: plasma
"#;

#[test]
fn ehr_biomarker_splits_media_and_filters_units() {
    let definition = parse(HIGH_LDL);
    assert!(definition.is_biomarker);
    let source = FrameSource::new()
        .with_table(
            SourceTable::GpClinical,
            test_df(vec![
                ("eid", vec!["1", "2", "3", "4"]),
                ("data_provider", vec!["1", "2", "2", "3"]),
                ("eventdate", vec!["2005-01-01", "2006-01-01", "2007-01-01", "2008-01-01"]),
                ("value1", vec!["3.9", "", "", "4.4"]),
                ("value2", vec!["", "4.2", "5.0", ""]),
                ("value3", vec!["", "mmol/L", "mg/dl", ""]),
                ("read_code", vec!["44P6.", "44P6.", "44P6.", "44d5."]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 42040, &source);
    let rows: Vec<(String, i64, Option<f64>)> = events
        .iter()
        .map(|e| (e.phenotype.clone(), e.eid, e.data_value))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("HighLDL_serum".to_string(), 1, Some(3.9)),
            ("HighLDL_serum".to_string(), 2, Some(4.2)),
            ("HighLDL_plasma".to_string(), 4, Some(4.4)),
        ]
    );
}

#[test]
fn baseline_biomarker_takes_every_measurement() {
    let definition = parse(HIGH_LDL);
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "1", "2"]),
                ("field", vec!["53", "30780", "30780", "30780"]),
                ("i", vec!["0", "0", "1", "0"]),
                ("n", vec!["0", "0", "0", "0"]),
                ("value", vec!["2009-03-04", "3.21", "3.4", "2.8"]),
            ]),
        )
        .unwrap();
    let events = run(&definition, 30780, &source);
    let rows: Vec<(i64, NaiveDate, Option<f64>)> = events
        .iter()
        .map(|e| (e.eid, e.event_date, e.data_value))
        .collect();
    assert_eq!(
        rows,
        vec![
            (1, ymd(2009, 3, 4), Some(3.21)),
            (1, sentinel_date(), Some(3.4)),
            (2, sentinel_date(), Some(2.8)),
        ]
    );
}

#[test]
fn missing_table_is_an_error() {
    let definition = parse(AV_BLOCK);
    let key = FieldKey::Field(FieldId::HOSPITAL_PRIMARY_DIAGNOSIS);
    let resolution = resolve(&definition, key, Overrides::default()).unwrap();
    let err = resolution.extract(&FrameSource::new()).unwrap_err();
    assert_eq!(err.to_string(), "source table hesin is not available");
}

#[test]
fn frames_are_checked_for_required_columns() {
    let err = FrameSource::new()
        .with_table(SourceTable::Death, test_df(vec![("eid", vec!["1"])]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "source table death has no column \"date_of_death\""
    );
}

#[test]
fn loads_source_tables_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("death.csv"),
        "eid,date_of_death\n1,2019-01-03\n",
    )
    .unwrap();
    let source = FrameSource::from_csv_dir(dir.path()).unwrap();
    assert!(source.contains(SourceTable::Death));
    assert!(!source.contains(SourceTable::Hesin));
}

#[test]
fn birth_dates_use_month_when_recorded() {
    let source = FrameSource::new()
        .with_table(
            SourceTable::Baseline,
            test_df(vec![
                ("eid", vec!["1", "1", "2", "3"]),
                ("field", vec!["34", "52", "34", "52"]),
                ("i", vec!["0", "0", "0", "0"]),
                ("n", vec!["0", "0", "0", "0"]),
                ("value", vec!["1950", "6", "1962", "3"]),
            ]),
        )
        .unwrap();
    let births = pheno_extract::birth_dates(&source).unwrap();
    assert_eq!(births.len(), 2);
    assert_eq!(births[&1], ymd(1950, 6, 1));
    assert_eq!(births[&2], ymd(1962, 1, 1));
}
