use crate::ingest::IngestOutcome;
use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Appends one line per candidate outcome. `batch_id` is `None` for a
/// single-candidate ingest.
pub fn mirror_outcomes(
    path: &Path,
    batch_id: Option<Uuid>,
    outcomes: &[IngestOutcome],
) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    let ts = Utc::now().to_rfc3339();
    for (index, outcome) in outcomes.iter().enumerate() {
        let line = json!({
            "ts": ts,
            "batch_id": batch_id,
            "index": index,
            "status": outcome.status,
            "id": outcome.id,
            "reason": outcome.reason
        });
        writeln!(f, "{}", line)?;
    }
    Ok(())
}
