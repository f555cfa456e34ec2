use rusqlite::{Connection, Result};

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // No UNIQUE constraint on (title, start_date): identity is enforced at
    // insert time by the deduplicator under the configured key shape.
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            location_name TEXT,
            latitude REAL,
            longitude REAL,
            organization_id INTEGER NOT NULL DEFAULT 1,
            event_type TEXT NOT NULL DEFAULT 'other',
            source_url TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_title_start ON events(title, start_date);
        CREATE INDEX IF NOT EXISTS idx_events_start_date ON events(start_date);
        CREATE INDEX IF NOT EXISTS idx_events_event_type ON events(event_type);
        ",
    )?;

    Ok(())
}
