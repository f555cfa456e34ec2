//! Error types at the ingestion core boundary.
//!
//! Validation rejections are not errors; they are reported as
//! [`crate::ingest::validate::FailureReason`] values inside an outcome.

use thiserror::Error;

/// Infrastructure failure in the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single-candidate ingest that is not a validation rejection.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("record store failed during ingest: {0}")]
    Store(#[from] StoreError),
}

/// Failure of a maintenance sweep.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("retention of {days} days puts the stale cutoff outside the supported date range")]
    RetentionOutOfRange { days: i64 },
}
