use crate::error::StoreError;
use crate::events::store::RecordStore;
use crate::events::{KeyShape, NaturalKey};
use crate::ingest::validate::parse_instant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub title: String,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total: u64,
    pub upcoming: u64,
    pub by_type: BTreeMap<String, u64>,
}

/// Natural-key groups with more than one stored member, largest first.
pub fn duplicate_groups<S: RecordStore + ?Sized>(
    store: &S,
    shape: KeyShape,
) -> Result<Vec<DuplicateGroup>, StoreError> {
    let mut counts: BTreeMap<NaturalKey, u64> = BTreeMap::new();
    for row in store.list_all()? {
        *counts.entry(row.natural_key(shape)).or_default() += 1;
    }
    let mut groups = counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(key, count)| DuplicateGroup {
            title: key.title,
            start_date: key.start_date,
            source_url: key.source_url,
            count,
        })
        .collect::<Vec<_>>();
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    Ok(groups)
}

pub fn store_summary<S: RecordStore + ?Sized>(
    store: &S,
    now: DateTime<Utc>,
) -> Result<StoreSummary, StoreError> {
    let mut summary = StoreSummary::default();
    for row in store.list_all()? {
        summary.total += 1;
        if parse_instant(&row.start_date).is_some_and(|start| start > now) {
            summary.upcoming += 1;
        }
        *summary.by_type.entry(row.event_type).or_default() += 1;
    }
    Ok(summary)
}
