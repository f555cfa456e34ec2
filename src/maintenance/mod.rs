//! Corrective passes over records that are already stored.
//!
//! Every sweep counts its matches first and, unless it is a dry run, deletes
//! them in one store transaction. A store error aborts the sweep with
//! nothing deleted.

pub mod report;

use crate::error::{StoreError, SweepError};
use crate::events::store::RecordStore;
use crate::events::{KeyShape, NaturalKey, StoredEvent};
use crate::ingest::IngestService;
use crate::ingest::stats::ReasonCounts;
use crate::ingest::validate::{ValidationRules, check_stored, parse_instant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub matched: u64,
    pub deleted: u64,
    pub dry_run: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_reason: Option<ReasonCounts>,
}

/// Operator request for a keyword sweep. Absent `dry_run` means dry run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSweepRequest {
    pub keywords: Vec<String>,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
}

fn default_dry_run() -> bool {
    true
}

impl KeywordSweepRequest {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords,
            dry_run: true,
        }
    }

    pub fn apply(mut self) -> Self {
        self.dry_run = false;
        self
    }
}

fn run_sweep<S: RecordStore + ?Sized>(
    store: &S,
    dry_run: bool,
    predicate: &dyn Fn(&StoredEvent) -> bool,
) -> Result<SweepReport, StoreError> {
    let matched = store.list_all()?.iter().filter(|row| predicate(*row)).count() as u64;
    let deleted = if dry_run || matched == 0 {
        0
    } else {
        store.delete_where(predicate)? as u64
    };
    Ok(SweepReport {
        matched,
        deleted,
        dry_run,
        by_reason: None,
    })
}

/// Rows whose start lies before `cutoff`. Rows with an unparseable start
/// are left for the validity sweep.
pub fn sweep_stale<S: RecordStore + ?Sized>(
    store: &S,
    cutoff: DateTime<Utc>,
    dry_run: bool,
) -> Result<SweepReport, StoreError> {
    run_sweep(store, dry_run, &|row: &StoredEvent| {
        parse_instant(&row.start_date).is_some_and(|start| start < cutoff)
    })
}

pub fn sweep_invalid<S: RecordStore + ?Sized>(
    store: &S,
    rules: &ValidationRules,
    dry_run: bool,
) -> Result<SweepReport, StoreError> {
    let mut by_reason = ReasonCounts::default();
    for row in store.list_all()? {
        if let Err(reason) = check_stored(&row, rules) {
            by_reason.increment(reason);
        }
    }
    let mut report = run_sweep(store, dry_run, &|row: &StoredEvent| check_stored(row, rules).is_err())?;
    report.by_reason = Some(by_reason);
    Ok(report)
}

/// Case-insensitive substring match against title and description. Blank
/// keywords are ignored; with none left nothing matches.
pub fn sweep_keyword<S: RecordStore + ?Sized>(
    store: &S,
    request: &KeywordSweepRequest,
) -> Result<SweepReport, StoreError> {
    let needles = request
        .keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect::<Vec<_>>();
    run_sweep(store, request.dry_run, &|row: &StoredEvent| {
        let title = row.title.to_lowercase();
        let description = row
            .description
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default();
        needles
            .iter()
            .any(|k| title.contains(k.as_str()) || description.contains(k.as_str()))
    })
}

/// Keeps the lowest id of every natural-key group and removes the rest.
pub fn sweep_legacy_duplicates<S: RecordStore + ?Sized>(
    store: &S,
    shape: KeyShape,
    dry_run: bool,
) -> Result<SweepReport, StoreError> {
    let mut keepers: HashMap<NaturalKey, i64> = HashMap::new();
    let rows = store.list_all()?;
    for row in &rows {
        keepers
            .entry(row.natural_key(shape))
            .and_modify(|id| *id = (*id).min(row.id))
            .or_insert(row.id);
    }
    let keep = keepers.into_values().collect::<HashSet<_>>();
    let surplus = rows
        .iter()
        .map(|row| row.id)
        .filter(|id| !keep.contains(id))
        .collect::<HashSet<_>>();
    run_sweep(store, dry_run, &|row: &StoredEvent| surplus.contains(&row.id))
}

impl<S: RecordStore> IngestService<S> {
    pub fn sweep_stale(&self, dry_run: bool) -> Result<SweepReport, SweepError> {
        self.sweep_stale_at(Utc::now(), dry_run)
    }

    pub fn sweep_stale_at(
        &self,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<SweepReport, SweepError> {
        let retention = self.settings().retention;
        let cutoff = now
            .checked_sub_signed(retention)
            .ok_or(SweepError::RetentionOutOfRange {
                days: retention.num_days(),
            })?;
        let state = self.lock();
        let report = sweep_stale(&state.store, cutoff, dry_run)?;
        info!(%cutoff, matched = report.matched, deleted = report.deleted, dry_run, "stale sweep");
        Ok(report)
    }

    pub fn sweep_invalid(&self, dry_run: bool) -> Result<SweepReport, StoreError> {
        let state = self.lock();
        let report = sweep_invalid(&state.store, &self.settings().rules, dry_run)?;
        info!(matched = report.matched, deleted = report.deleted, dry_run, "validity sweep");
        Ok(report)
    }

    pub fn sweep_keyword(&self, request: &KeywordSweepRequest) -> Result<SweepReport, StoreError> {
        let state = self.lock();
        let report = sweep_keyword(&state.store, request)?;
        info!(
            keywords = ?request.keywords,
            matched = report.matched,
            deleted = report.deleted,
            dry_run = request.dry_run,
            "keyword sweep"
        );
        Ok(report)
    }

    pub fn sweep_legacy_duplicates(&self, dry_run: bool) -> Result<SweepReport, StoreError> {
        let state = self.lock();
        let report = sweep_legacy_duplicates(&state.store, self.settings().key_shape, dry_run)?;
        info!(matched = report.matched, deleted = report.deleted, dry_run, "legacy duplicate sweep");
        Ok(report)
    }

    pub fn duplicate_report(&self) -> Result<Vec<report::DuplicateGroup>, StoreError> {
        let state = self.lock();
        report::duplicate_groups(&state.store, self.settings().key_shape)
    }

    pub fn store_summary(&self, now: DateTime<Utc>) -> Result<report::StoreSummary, StoreError> {
        let state = self.lock();
        report::store_summary(&state.store, now)
    }
}
