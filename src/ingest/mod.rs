//! Validate → dedupe → insert, for one candidate or an ordered batch.
//!
//! The store and the statistics sit behind one mutex, held for the whole of
//! each call. A batch is a plain serial loop, so a later candidate always
//! sees the inserts of earlier candidates in the same batch.

pub mod dedupe;
pub mod stats;
pub mod validate;

use crate::config::PipelineSettings;
use crate::error::{IngestError, StoreError};
use crate::events::store::RecordStore;
use crate::ingest::dedupe::{DedupeVerdict, check_duplicate};
use crate::ingest::stats::{BatchCounts, IngestStatistics};
use crate::ingest::validate::{FailureReason, validate_candidate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Inserted,
    Duplicate,
    Rejected,
    /// Store failure while handling one candidate of a batch.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl IngestOutcome {
    pub fn inserted(id: i64) -> Self {
        Self {
            status: IngestStatus::Inserted,
            id: Some(id),
            reason: None,
        }
    }

    pub fn duplicate(existing_id: i64) -> Self {
        Self {
            status: IngestStatus::Duplicate,
            id: Some(existing_id),
            reason: None,
        }
    }

    pub fn rejected(reason: FailureReason) -> Self {
        Self {
            status: IngestStatus::Rejected,
            id: None,
            reason: Some(reason),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: IngestStatus::Failed,
            id: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
    pub outcomes: Vec<IngestOutcome>,
}

impl BatchSummary {
    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            received: self.received,
            inserted: self.inserted,
            duplicates: self.duplicates,
            failed: self.failed,
        }
    }
}

/// A decoded request body: one candidate, or a batch given either as a bare
/// array or as the `{"events": [...]}` envelope.
#[derive(Debug, Clone)]
pub enum IngestPayload {
    Single(Value),
    Batch(Vec<Value>),
}

impl IngestPayload {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => IngestPayload::Batch(items),
            Value::Object(mut obj) => match obj.remove("events") {
                Some(Value::Array(items)) => IngestPayload::Batch(items),
                Some(other) => {
                    obj.insert("events".to_string(), other);
                    IngestPayload::Single(Value::Object(obj))
                }
                None => IngestPayload::Single(Value::Object(obj)),
            },
            other => IngestPayload::Single(other),
        }
    }
}

pub(crate) struct ServiceState<S> {
    pub(crate) store: S,
    pub(crate) stats: IngestStatistics,
}

pub struct IngestService<S: RecordStore> {
    state: Mutex<ServiceState<S>>,
    settings: PipelineSettings,
}

impl<S: RecordStore> IngestService<S> {
    pub fn new(store: S, settings: PipelineSettings) -> Self {
        Self {
            state: Mutex::new(ServiceState {
                store,
                stats: IngestStatistics::default(),
            }),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ServiceState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the store while holding the service lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        let state = self.lock();
        f(&state.store)
    }

    pub fn stats(&self) -> IngestStatistics {
        self.lock().stats.clone()
    }

    pub fn ingest_one(&self, candidate: &Value) -> Result<IngestOutcome, IngestError> {
        let mut state = self.lock();
        state.stats.record_received(1);
        match process_candidate(&mut state, &self.settings, candidate) {
            Ok(outcome) => {
                debug!(status = ?outcome.status, id = ?outcome.id, reason = ?outcome.reason, "ingested candidate");
                Ok(outcome)
            }
            Err(err) => {
                state.stats.record_store_failure();
                warn!(error = %err, "store failure during single ingest");
                Err(IngestError::Store(err))
            }
        }
    }

    pub fn ingest_batch(&self, candidates: &[Value]) -> BatchSummary {
        let batch_id = Uuid::new_v4();
        let mut state = self.lock();
        let mut summary = BatchSummary {
            batch_id,
            received: candidates.len() as u64,
            inserted: 0,
            duplicates: 0,
            failed: 0,
            outcomes: Vec::with_capacity(candidates.len()),
        };

        for (index, candidate) in candidates.iter().enumerate() {
            let outcome = match process_candidate(&mut state, &self.settings, candidate) {
                Ok(outcome) => outcome,
                Err(err) => {
                    state.stats.record_store_failure();
                    warn!(%batch_id, index, error = %err, "store failure; candidate counted as failed");
                    IngestOutcome::failed()
                }
            };
            match outcome.status {
                IngestStatus::Inserted => summary.inserted += 1,
                IngestStatus::Duplicate => summary.duplicates += 1,
                IngestStatus::Rejected | IngestStatus::Failed => summary.failed += 1,
            }
            summary.outcomes.push(outcome);
        }

        state.stats.finish_batch(summary.counts());
        info!(
            %batch_id,
            received = summary.received,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            failed = summary.failed,
            "batch ingest complete"
        );
        summary
    }
}

/// Classifies one candidate and updates statistics for every terminal
/// outcome except a store error, which the caller accounts for.
fn process_candidate<S: RecordStore>(
    state: &mut ServiceState<S>,
    settings: &PipelineSettings,
    candidate: &Value,
) -> Result<IngestOutcome, StoreError> {
    let record = match validate_candidate(candidate, &settings.rules) {
        Ok(record) => record,
        Err(reason) => {
            state.stats.record_rejected(reason);
            return Ok(IngestOutcome::rejected(reason));
        }
    };

    match check_duplicate(&state.store, &record, settings.key_shape)? {
        DedupeVerdict::Duplicate { existing_id } => {
            state.stats.record_duplicate();
            Ok(IngestOutcome::duplicate(existing_id))
        }
        DedupeVerdict::Unique => {
            let id = state.store.insert(&record)?;
            state.stats.record_inserted();
            Ok(IngestOutcome::inserted(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::store::EventStore;
    use serde_json::json;

    fn service() -> IngestService<EventStore> {
        IngestService::new(EventStore::open_in_memory().unwrap(), PipelineSettings::default())
    }

    fn town_hall() -> Value {
        json!({
            "title": "Town Hall",
            "start_date": "2025-03-01T18:00:00Z",
            "end_date": "2025-03-01T19:00:00Z"
        })
    }

    #[test]
    fn second_single_ingest_references_first_id() {
        let svc = service();
        let first = svc.ingest_one(&town_hall()).unwrap();
        assert_eq!(first.status, IngestStatus::Inserted);
        let second = svc.ingest_one(&town_hall()).unwrap();
        assert_eq!(second, IngestOutcome::duplicate(first.id.unwrap()));

        let stats = svc.stats();
        assert_eq!(stats.totals.received, 2);
        assert_eq!(stats.totals.inserted, 1);
        assert_eq!(stats.totals.duplicate, 1);
        assert!(stats.last_batch.is_none());
    }

    #[test]
    fn rejection_is_counted_under_its_reason() {
        let svc = service();
        let out = svc
            .ingest_one(&json!({
                "title": "Backwards",
                "start_date": "2025-03-01T19:00:00Z",
                "end_date": "2025-03-01T18:00:00Z"
            }))
            .unwrap();
        assert_eq!(out, IngestOutcome::rejected(FailureReason::InvalidOrder));
        let stats = svc.stats();
        assert_eq!(stats.totals.failed, 1);
        assert_eq!(stats.reasons.invalid_order, 1);
        assert_eq!(svc.with_store(|s| s.count().unwrap()), 0);
    }

    #[test]
    fn same_key_twice_in_one_batch_inserts_once() {
        let svc = service();
        let mut variant = town_hall();
        variant["description"] = json!("second copy");
        let summary = svc.ingest_batch(&[town_hall(), variant]);
        assert_eq!(
            (summary.inserted, summary.duplicates, summary.failed),
            (1, 1, 0)
        );
        assert_eq!(summary.outcomes[1].id, summary.outcomes[0].id);
    }

    #[test]
    fn outcome_serializes_typed_reason() {
        let json = serde_json::to_value(IngestOutcome::rejected(FailureReason::InvalidOrder)).unwrap();
        assert_eq!(json, json!({"status": "rejected", "reason": "invalid_order"}));
    }

    #[test]
    fn payload_detection() {
        assert!(matches!(
            IngestPayload::from_json(json!([town_hall()])),
            IngestPayload::Batch(items) if items.len() == 1
        ));
        assert!(matches!(
            IngestPayload::from_json(json!({"events": [town_hall(), town_hall()]})),
            IngestPayload::Batch(items) if items.len() == 2
        ));
        assert!(matches!(
            IngestPayload::from_json(town_hall()),
            IngestPayload::Single(_)
        ));
    }

    #[test]
    fn non_array_events_field_stays_a_single_candidate() {
        let mut candidate = town_hall();
        candidate["events"] = json!("weekly");
        match IngestPayload::from_json(candidate.clone()) {
            IngestPayload::Single(value) => assert_eq!(value, candidate),
            IngestPayload::Batch(_) => panic!("expected a single candidate"),
        }
    }
}
