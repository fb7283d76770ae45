//! CSV writers for event rows.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use pheno_core::FirstEvent;
use pheno_model::CanonicalEvent;

const EVENT_HEADER: [&str; 6] = [
    "eid",
    "phenotype",
    "field_id",
    "field_value",
    "event_date",
    "data_value",
];

const FIRST_EVENT_HEADER: [&str; 5] = ["eid", "phenotype", "field_id", "source", "event_date"];

/// Open `path` for writing, or stdout when no path is given.
pub fn open_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

pub fn write_events_csv<W: Write>(events: &[CanonicalEvent], writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(EVENT_HEADER)?;
    for event in events {
        let data_value = event
            .data_value
            .map(|value| value.to_string())
            .unwrap_or_default();
        out.write_record([
            event.eid.to_string(),
            event.phenotype.clone(),
            event.field_id.to_string(),
            event.field_value.clone(),
            event.event_date.format("%Y-%m-%d").to_string(),
            data_value,
        ])?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_first_events_csv<W: Write>(rows: &[FirstEvent], writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(FIRST_EVENT_HEADER)?;
    for row in rows {
        out.write_record([
            row.eid.to_string(),
            row.phenotype.clone(),
            row.field_id.to_string(),
            row.source.as_str().to_string(),
            row.event_date.format("%Y-%m-%d").to_string(),
        ])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pheno_model::{FieldId, SourceCategory, sentinel_date};

    use super::*;

    fn to_string(write: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut buffer = Vec::new();
        write(&mut buffer);
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn event_rows_render_dates_and_optional_values() {
        let events = vec![
            CanonicalEvent::new(
                1,
                "av_block_1",
                FieldId::HOSPITAL_PRIMARY_DIAGNOSIS,
                "I440",
                NaiveDate::from_ymd_opt(2010, 5, 1).unwrap(),
            ),
            CanonicalEvent::new(2, "HighLDL_serum", FieldId::new(30780), "4.9", sentinel_date())
                .with_data_value(Some(4.9)),
        ];
        let rendered = to_string(|buffer| write_events_csv(&events, buffer).unwrap());
        insta::assert_snapshot!(rendered, @r"
        eid,phenotype,field_id,field_value,event_date,data_value
        1,av_block_1,41202,I440,2010-05-01,
        2,HighLDL_serum,30780,4.9,1900-01-01,4.9
        ");
    }

    #[test]
    fn first_event_rows_name_their_source() {
        let rows = vec![FirstEvent {
            eid: 7,
            phenotype: "av_block_1".to_string(),
            field_id: FieldId::DEATH_PRIMARY_CAUSE,
            source: SourceCategory::Death,
            event_date: NaiveDate::from_ymd_opt(2015, 2, 3).unwrap(),
        }];
        let rendered = to_string(|buffer| write_first_events_csv(&rows, buffer).unwrap());
        insta::assert_snapshot!(rendered, @r"
        eid,phenotype,field_id,source,event_date
        7,av_block_1,40001,ehr_death,2015-02-03
        ");
    }
}
