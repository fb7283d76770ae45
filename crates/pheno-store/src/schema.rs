//! Event table layout. Installed only on request; the extractor never
//! creates or alters tables.

use std::str::FromStr;

use rusqlite::Connection;
use tracing::info;

use crate::error::{Result, StoreError};

pub const EVENTS_TABLE: &str = "phenotype_events";

/// Version written to `PRAGMA user_version` once the table exists.
pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_PHENOTYPES: &str = "
CREATE TABLE IF NOT EXISTS phenotype_events (
    eid         INTEGER NOT NULL,
    phenotype   TEXT    NOT NULL,
    field_id    INTEGER NOT NULL,
    field_value TEXT    NOT NULL,
    event_date  TEXT    NOT NULL,
    data_value  REAL
);
CREATE INDEX IF NOT EXISTS idx_phenotype_events_key
    ON phenotype_events (phenotype, field_id);
CREATE INDEX IF NOT EXISTS idx_phenotype_events_eid
    ON phenotype_events (eid);
";

/// Create the event table if the database has not been initialised yet.
pub fn install_schema(conn: &Connection) -> Result<()> {
    let current = schema_version(conn)?;
    if current >= SCHEMA_VERSION {
        return Ok(());
    }
    conn.execute_batch(SCHEMA_PHENOTYPES)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    info!(version = SCHEMA_VERSION, table = EVENTS_TABLE, "installed event schema");
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Queryable columns of the event table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventColumn {
    Eid,
    Phenotype,
    FieldId,
    FieldValue,
    EventDate,
    DataValue,
}

impl EventColumn {
    pub const ALL: [Self; 6] = [
        Self::Eid,
        Self::Phenotype,
        Self::FieldId,
        Self::FieldValue,
        Self::EventDate,
        Self::DataValue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Eid => "eid",
            Self::Phenotype => "phenotype",
            Self::FieldId => "field_id",
            Self::FieldValue => "field_value",
            Self::EventDate => "event_date",
            Self::DataValue => "data_value",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Self::Eid | Self::FieldId)
    }
}

impl FromStr for EventColumn {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|column| column.name() == s)
            .ok_or_else(|| StoreError::InvalidColumn(s.to_string()))
    }
}
