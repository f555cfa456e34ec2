use crate::config::{self, AppConfig};
use crate::events::store::EventStore;
use crate::ingest::{IngestOutcome, IngestPayload, IngestService};
use crate::logging::ndjson;
use crate::maintenance::report::{DuplicateGroup, StoreSummary};
use crate::maintenance::{KeywordSweepRequest, SweepReport};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde_json::{Value, json};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub root: PathBuf,
    pub state_db: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct IngestCommand {
    pub input: PathBuf,
    pub store: StoreOptions,
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum SweepCommand {
    Stale { days: Option<u32>, dry_run: bool },
    Invalid { dry_run: bool },
    Keyword { keywords: Vec<String>, apply: bool },
    Duplicates { dry_run: bool },
}

fn open_service(opts: &StoreOptions, cfg: &AppConfig) -> Result<IngestService<EventStore>> {
    let db_path = opts
        .state_db
        .clone()
        .or_else(|| cfg.store_path.clone())
        .unwrap_or_else(config::default_store_path);
    let store = EventStore::open(&db_path)?;
    info!(db = %db_path.display(), key = ?cfg.key_shape, "opened event store");
    Ok(IngestService::new(store, cfg.pipeline_settings()))
}

fn read_input(path: &Path) -> Result<Value> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read candidates from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("read input file {}", path.display()))?
    };
    serde_json::from_str(&raw).with_context(|| format!("parse JSON from {}", path.display()))
}

/// Ingests the candidates in `input` and returns `{result, stats}`.
///
/// Rejections and duplicates are part of the result; only store failures
/// on a single-candidate ingest surface as an error. A failure to write the
/// `--log` mirror is logged and does not fail the command.
pub fn execute_ingest(cmd: IngestCommand) -> Result<Value> {
    let payload = IngestPayload::from_json(read_input(&cmd.input)?);
    let cfg = config::load_config(&cmd.store.root)?;
    let service = open_service(&cmd.store, &cfg)?;

    let result = match payload {
        IngestPayload::Single(candidate) => {
            let outcome = service.ingest_one(&candidate)?;
            if let Some(log) = &cmd.log {
                mirror_or_warn(log, None, std::slice::from_ref(&outcome));
            }
            serde_json::to_value(outcome)?
        }
        IngestPayload::Batch(candidates) => {
            let summary = service.ingest_batch(&candidates);
            if let Some(log) = &cmd.log {
                mirror_or_warn(log, Some(summary.batch_id), &summary.outcomes);
            }
            serde_json::to_value(summary)?
        }
    };
    Ok(json!({ "result": result, "stats": service.stats() }))
}

/// The records are already stored at this point, so a failed mirror write
/// must not hide the result.
fn mirror_or_warn(log: &Path, batch_id: Option<Uuid>, outcomes: &[IngestOutcome]) {
    if let Err(err) = ndjson::mirror_outcomes(log, batch_id, outcomes) {
        warn!(log = %log.display(), error = %err, "failed to mirror ingest outcomes");
    }
}

pub fn execute_sweep(opts: &StoreOptions, sweep: SweepCommand) -> Result<SweepReport> {
    let mut cfg = config::load_config(&opts.root)?;
    if let SweepCommand::Stale {
        days: Some(days), ..
    } = &sweep
    {
        if *days == 0 {
            bail!("--days must be greater than zero");
        }
        if *days > config::MAX_RETENTION_DAYS {
            bail!("--days must be at most {}", config::MAX_RETENTION_DAYS);
        }
        cfg.retention_days = *days;
    }
    let service = open_service(opts, &cfg)?;

    let report = match sweep {
        SweepCommand::Stale { dry_run, .. } => service.sweep_stale(dry_run)?,
        SweepCommand::Invalid { dry_run } => service.sweep_invalid(dry_run)?,
        SweepCommand::Keyword { keywords, apply } => {
            let keywords = if keywords.is_empty() {
                cfg.keywords.clone()
            } else {
                config::sanitize_keywords(keywords)
            };
            if keywords.is_empty() {
                bail!("no keywords given and `[maintenance].keywords` is empty");
            }
            let request = KeywordSweepRequest::new(keywords);
            let request = if apply { request.apply() } else { request };
            service.sweep_keyword(&request)?
        }
        SweepCommand::Duplicates { dry_run } => service.sweep_legacy_duplicates(dry_run)?,
    };
    Ok(report)
}

pub fn list_duplicates(opts: &StoreOptions) -> Result<Vec<DuplicateGroup>> {
    let service = open_service(opts, &config::load_config(&opts.root)?)?;
    Ok(service.duplicate_report()?)
}

pub fn summarize_store(opts: &StoreOptions) -> Result<StoreSummary> {
    let service = open_service(opts, &config::load_config(&opts.root)?)?;
    Ok(service.store_summary(Utc::now())?)
}
