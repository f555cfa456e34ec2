use crate::error::StoreError;
use crate::events::{EventRecord, NaturalKey, StoredEvent, format_instant, schema};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Row, params};
use std::path::Path;

/// The narrow contract the ingestion core needs from persistence.
///
/// Implementations assign `id` and `created_at` on insert. `delete_where`
/// must be all-or-nothing: on error nothing is deleted.
pub trait RecordStore {
    fn insert(&self, record: &EventRecord) -> Result<i64, StoreError>;
    fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<StoredEvent>, StoreError>;
    fn delete_where(&self, predicate: &dyn Fn(&StoredEvent) -> bool) -> Result<usize, StoreError>;
    fn list_all(&self) -> Result<Vec<StoredEvent>, StoreError>;
}

const SELECT_COLUMNS: &str = "id, title, description, start_date, end_date, location_name, latitude, longitude, organization_id, event_type, source_url, created_at";

pub struct EventStore {
    conn: Connection,
}

impl EventStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db parent dir {}", parent.display()))?;
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
    }

    /// Writes a row verbatim, bypassing validation. Used to load rows that
    /// predate the ingest pipeline (and by tests to seed such rows).
    pub fn insert_raw(&self, row: &StoredEvent) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO events (title, description, start_date, end_date, location_name, latitude, longitude, organization_id, event_type, source_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                row.title,
                row.description,
                row.start_date,
                row.end_date,
                row.location_name,
                row.latitude,
                row.longitude,
                row.organization_id,
                row.event_type,
                row.source_url,
                row.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<StoredEvent> {
    Ok(StoredEvent {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        location_name: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        organization_id: row.get(8)?,
        event_type: row.get(9)?,
        source_url: row.get(10)?,
        created_at: row.get(11)?,
    })
}

impl RecordStore for EventStore {
    fn insert(&self, record: &EventRecord) -> Result<i64, StoreError> {
        let created_at = format_instant(&Utc::now());
        self.conn.execute(
            "INSERT INTO events (title, description, start_date, end_date, location_name, latitude, longitude, organization_id, event_type, source_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.title,
                record.description,
                format_instant(&record.start_time),
                format_instant(&record.end_time),
                record.location_name,
                record.latitude,
                record.longitude,
                record.organization_id,
                record.event_type,
                record.source_url,
                created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Candidates are narrowed by title, then compared on the normalized key
    /// so rows stored in older date formats still match.
    fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<StoredEvent>, StoreError> {
        let shape = key.shape();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM events WHERE title = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map(params![key.title], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().find(|row| row.natural_key(shape) == *key))
    }

    fn delete_where(&self, predicate: &dyn Fn(&StoredEvent) -> bool) -> Result<usize, StoreError> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = {
            let mut stmt = tx.prepare(&format!("SELECT {SELECT_COLUMNS} FROM events"))?;
            let rows = stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter()
                .filter(|row| predicate(row))
                .map(|row| row.id)
                .collect::<Vec<_>>()
        };
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM events WHERE id = ?1")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    fn list_all(&self) -> Result<Vec<StoredEvent>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SELECT_COLUMNS} FROM events ORDER BY id ASC"))?;
        let rows = stmt
            .query_map([], map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
