use crate::ingest::validate::FailureReason;
use serde::{Deserialize, Serialize};

/// Counters accumulated since the owning service was created. They live only
/// in memory and reset when the process restarts; the store is the source of
/// truth for what was actually persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStatistics {
    pub totals: Totals,
    pub last_batch: Option<BatchCounts>,
    pub reasons: ReasonCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub received: u64,
    pub inserted: u64,
    pub duplicate: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub received: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCounts {
    pub invalid_date: u64,
    pub invalid_order: u64,
    pub too_long: u64,
    pub invalid_coordinates: u64,
    pub missing_fields: u64,
}

impl ReasonCounts {
    pub fn increment(&mut self, reason: FailureReason) {
        match reason {
            FailureReason::InvalidDate => self.invalid_date += 1,
            FailureReason::InvalidOrder => self.invalid_order += 1,
            FailureReason::TooLong => self.too_long += 1,
            FailureReason::InvalidCoordinates => self.invalid_coordinates += 1,
            FailureReason::MissingFields => self.missing_fields += 1,
        }
    }

    pub fn sum(&self) -> u64 {
        self.invalid_date
            + self.invalid_order
            + self.too_long
            + self.invalid_coordinates
            + self.missing_fields
    }
}

impl IngestStatistics {
    pub(crate) fn record_rejected(&mut self, reason: FailureReason) {
        self.totals.failed += 1;
        self.reasons.increment(reason);
    }

    pub(crate) fn record_store_failure(&mut self) {
        self.totals.failed += 1;
    }

    pub(crate) fn record_duplicate(&mut self) {
        self.totals.duplicate += 1;
    }

    pub(crate) fn record_inserted(&mut self) {
        self.totals.inserted += 1;
    }

    pub(crate) fn record_received(&mut self, count: u64) {
        self.totals.received += count;
    }

    pub(crate) fn finish_batch(&mut self, counts: BatchCounts) {
        self.totals.received += counts.received;
        self.last_batch = Some(counts);
    }
}
