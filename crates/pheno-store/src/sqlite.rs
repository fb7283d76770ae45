//! SQLite event store.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;
use pheno_model::{CanonicalEvent, ExtractionKey, FieldId, Predicate};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::schema;
use crate::sql;
use crate::store::{CommitBatch, CommitReport, EventStore};

/// Rows per multi-row INSERT statement.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

const EVENT_COLUMNS: &str = "eid, phenotype, field_id, field_value, event_date, data_value";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteEventStore {
    conn: Connection,
    chunk_size: usize,
}

impl SqliteEventStore {
    /// Open a database file. The event table is expected to exist already;
    /// see [`SqliteEventStore::install_schema`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn install_schema(&self) -> Result<()> {
        schema::install_schema(&self.conn)
    }
}

fn insert_sql(rows: usize) -> String {
    let row = "(?, ?, ?, ?, ?, ?)";
    format!(
        "INSERT INTO {} ({EVENT_COLUMNS}) VALUES {}",
        schema::EVENTS_TABLE,
        vec![row; rows].join(", ")
    )
}

fn event_values(event: &CanonicalEvent) -> [Value; 6] {
    [
        Value::Integer(event.eid),
        Value::Text(event.phenotype.clone()),
        Value::Integer(i64::from(event.field_id.get())),
        Value::Text(event.field_value.clone()),
        Value::Text(event.event_date.format(DATE_FORMAT).to_string()),
        event.data_value.map_or(Value::Null, Value::Real),
    ]
}

struct RawEvent {
    eid: i64,
    phenotype: String,
    field_id: u32,
    field_value: String,
    event_date: String,
    data_value: Option<f64>,
}

impl RawEvent {
    fn into_event(self) -> Result<CanonicalEvent> {
        let date = NaiveDate::parse_from_str(&self.event_date, DATE_FORMAT).map_err(|_| {
            StoreError::InvalidDate {
                value: self.event_date.clone(),
            }
        })?;
        Ok(CanonicalEvent::new(
            self.eid,
            self.phenotype,
            FieldId::new(self.field_id),
            self.field_value,
            date,
        )
        .with_data_value(self.data_value))
    }
}

impl EventStore for SqliteEventStore {
    fn extracted_phenotypes(&self, field_id: FieldId) -> Result<BTreeSet<String>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT phenotype FROM phenotype_events WHERE field_id = ?1",
        )?;
        let rows = stmt.query_map(params![field_id.get()], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<BTreeSet<String>>>()?)
    }

    fn count(&self, key: &ExtractionKey) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM phenotype_events WHERE phenotype = ?1 AND field_id = ?2",
            params![key.phenotype, key.field_id.get()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn commit(&mut self, batch: &CommitBatch) -> Result<CommitReport> {
        let chunk_size = self.chunk_size;
        let tx = self.conn.transaction()?;
        let mut report = CommitReport::default();
        if batch.replace {
            let mut stmt = tx.prepare_cached(
                "DELETE FROM phenotype_events WHERE phenotype = ?1 AND field_id = ?2",
            )?;
            for key in &batch.keys {
                let deleted = stmt.execute(params![key.phenotype, key.field_id.get()])?;
                report.deleted += deleted as u64;
            }
        }
        for chunk in batch.events.chunks(chunk_size) {
            let mut stmt = tx.prepare_cached(&insert_sql(chunk.len()))?;
            let values = chunk.iter().flat_map(event_values);
            report.inserted += stmt.execute(params_from_iter(values))? as u64;
        }
        tx.commit()?;
        debug!(
            keys = batch.keys.len(),
            deleted = report.deleted,
            inserted = report.inserted,
            "committed event batch"
        );
        Ok(report)
    }

    fn events(&self, filter: &[Predicate]) -> Result<Vec<CanonicalEvent>> {
        let clause = sql::compile(filter)?;
        let mut query = format!("SELECT {EVENT_COLUMNS} FROM {}", schema::EVENTS_TABLE);
        if !clause.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clause.sql);
        }
        query.push_str(" ORDER BY rowid");

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(params_from_iter(clause.params.iter()), |row| {
            Ok(RawEvent {
                eid: row.get(0)?,
                phenotype: row.get(1)?,
                field_id: row.get(2)?,
                field_value: row.get(3)?,
                event_date: row.get(4)?,
                data_value: row.get(5)?,
            })
        })?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_statement_has_one_group_per_row() {
        insta::assert_snapshot!(
            insert_sql(2),
            @"INSERT INTO phenotype_events (eid, phenotype, field_id, field_value, event_date, data_value) VALUES (?, ?, ?, ?, ?, ?), (?, ?, ?, ?, ?, ?)"
        );
    }
}
