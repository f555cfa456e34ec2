#![allow(dead_code)]

use eventpulse::error::StoreError;
use eventpulse::events::store::{EventStore, RecordStore};
use eventpulse::events::{EventRecord, NaturalKey, StoredEvent};
use serde_json::{Value, json};
use std::cell::Cell;

pub fn candidate(title: &str, start: &str, end: &str) -> Value {
    json!({
        "title": title,
        "start_date": start,
        "end_date": end,
        "location_name": "Raleigh Municipal Building",
        "latitude": 35.7796,
        "longitude": -78.6382,
        "event_type": "government",
        "source_url": "https://raleighnc.gov/events"
    })
}

/// Wraps a real store and fails on demand.
pub struct FlakyStore {
    pub inner: EventStore,
    pub fail_inserts_titled: Option<String>,
    pub fail_deletes: Cell<bool>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: EventStore::open_in_memory().unwrap(),
            fail_inserts_titled: None,
            fail_deletes: Cell::new(false),
        }
    }
}

impl RecordStore for FlakyStore {
    fn insert(&self, record: &EventRecord) -> Result<i64, StoreError> {
        if self.fail_inserts_titled.as_deref() == Some(record.title.as_str()) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.insert(record)
    }

    fn find_by_natural_key(&self, key: &NaturalKey) -> Result<Option<StoredEvent>, StoreError> {
        self.inner.find_by_natural_key(key)
    }

    fn delete_where(&self, predicate: &dyn Fn(&StoredEvent) -> bool) -> Result<usize, StoreError> {
        if self.fail_deletes.get() {
            return Err(StoreError::Unavailable("database locked".to_string()));
        }
        self.inner.delete_where(predicate)
    }

    fn list_all(&self) -> Result<Vec<StoredEvent>, StoreError> {
        self.inner.list_all()
    }
}
