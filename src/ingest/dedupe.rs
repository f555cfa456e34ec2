use crate::error::StoreError;
use crate::events::store::RecordStore;
use crate::events::{EventRecord, KeyShape};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum DedupeVerdict {
    Duplicate { existing_id: i64 },
    Unique,
}

/// Exact natural-key lookup. Near-identical titles or shifted start times
/// are treated as distinct records.
pub fn check_duplicate<S: RecordStore + ?Sized>(
    store: &S,
    record: &EventRecord,
    shape: KeyShape,
) -> Result<DedupeVerdict, StoreError> {
    let key = record.natural_key(shape);
    Ok(match store.find_by_natural_key(&key)? {
        Some(existing) => DedupeVerdict::Duplicate {
            existing_id: existing.id,
        },
        None => DedupeVerdict::Unique,
    })
}
