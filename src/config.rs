use crate::events::KeyShape;
use crate::ingest::validate::{DEFAULT_MAX_DURATION_HOURS, ValidationRules};
use anyhow::{Context, Result, bail};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_RELATIVE_PATH: &str = ".eventpulse/config.toml";
const SUPPORTED_VERSION: u32 = 1;
pub const DEFAULT_RETENTION_DAYS: u32 = 90;
/// One hundred years.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub version: u32,
    pub store_path: Option<PathBuf>,
    pub key_shape: KeyShape,
    pub max_duration_hours: u32,
    pub retention_days: u32,
    pub keywords: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: SUPPORTED_VERSION,
            store_path: None,
            key_shape: KeyShape::default(),
            max_duration_hours: DEFAULT_MAX_DURATION_HOURS as u32,
            retention_days: DEFAULT_RETENTION_DAYS,
            keywords: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            key_shape: self.key_shape,
            rules: ValidationRules {
                max_duration: Duration::hours(i64::from(self.max_duration_hours)),
            },
            retention: Duration::days(i64::from(self.retention_days)),
        }
    }
}

/// Settings shared by ingestion and the maintenance sweeps.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub key_shape: KeyShape,
    pub rules: ValidationRules,
    pub retention: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        AppConfig::default().pipeline_settings()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawAppConfig {
    version: Option<u32>,
    store: Option<RawStoreConfig>,
    dedupe: Option<RawDedupeConfig>,
    validation: Option<RawValidationConfig>,
    retention: Option<RawRetentionConfig>,
    maintenance: Option<RawMaintenanceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawStoreConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDedupeConfig {
    key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawValidationConfig {
    max_duration_hours: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawRetentionConfig {
    days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawMaintenanceConfig {
    keywords: Option<Vec<String>>,
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_RELATIVE_PATH)
}

/// Loads `.eventpulse/config.toml` under `root`, falling back to defaults
/// when the file does not exist.
pub fn load_config(root: &Path) -> Result<AppConfig> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("read config {}", path.display()))?;
    let parsed: RawAppConfig =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    validate_config(parsed, &path)
}

fn validate_config(raw: RawAppConfig, path: &Path) -> Result<AppConfig> {
    let version = raw
        .version
        .ok_or_else(|| anyhow::anyhow!("{} missing required `version`", path.display()))?;
    if version != SUPPORTED_VERSION {
        bail!(
            "{} has unsupported version {version}; expected version = {SUPPORTED_VERSION}",
            path.display()
        );
    }

    let store_path = raw
        .store
        .and_then(|store| sanitize_optional(store.path))
        .map(PathBuf::from);

    let key_shape = match raw.dedupe.and_then(|d| sanitize_optional(d.key)) {
        None => KeyShape::default(),
        Some(key) => key
            .parse::<KeyShape>()
            .with_context(|| format!("{} has invalid `[dedupe].key`", path.display()))?,
    };

    let max_duration_hours = raw
        .validation
        .and_then(|v| v.max_duration_hours)
        .unwrap_or(DEFAULT_MAX_DURATION_HOURS as u32);
    if max_duration_hours == 0 {
        bail!(
            "{} has zero `[validation].max_duration_hours`",
            path.display()
        );
    }

    let retention_days = raw
        .retention
        .and_then(|r| r.days)
        .unwrap_or(DEFAULT_RETENTION_DAYS);
    if retention_days == 0 {
        bail!("{} has zero `[retention].days`", path.display());
    }
    if retention_days > MAX_RETENTION_DAYS {
        bail!(
            "{} has `[retention].days` = {retention_days}; the maximum is {MAX_RETENTION_DAYS}",
            path.display()
        );
    }

    let keywords = sanitize_keywords(
        raw.maintenance
            .and_then(|m| m.keywords)
            .unwrap_or_default(),
    );

    Ok(AppConfig {
        version,
        store_path,
        key_shape,
        max_duration_hours,
        retention_days,
        keywords,
    })
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn sanitize_keywords(keywords: Vec<String>) -> Vec<String> {
    keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

pub fn default_store_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("eventpulse").join("events.db");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("state")
            .join("eventpulse")
            .join("events.db");
    }
    PathBuf::from(".eventpulse/events.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_config(root: &Path, body: &str) {
        let path = config_path(root);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempdir().unwrap();
        let cfg = load_config(tmp.path()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.key_shape, KeyShape::TitleStart);
        assert_eq!(cfg.retention_days, 90);
        assert_eq!(cfg.max_duration_hours, 14);
    }

    #[test]
    fn parses_full_config() {
        let tmp = tempdir().unwrap();
        write_config(
            tmp.path(),
            r#"
version = 1
[store]
path = "/tmp/events.db"
[dedupe]
key = "title_start_source"
[validation]
max_duration_hours = 10
[retention]
days = 30
[maintenance]
keywords = ["sample", "  ", " test event "]
"#,
        );

        let cfg = load_config(tmp.path()).unwrap();
        assert_eq!(cfg.store_path, Some(PathBuf::from("/tmp/events.db")));
        assert_eq!(cfg.key_shape, KeyShape::TitleStartSource);
        assert_eq!(cfg.max_duration_hours, 10);
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(
            cfg.keywords,
            vec!["sample".to_string(), "test event".to_string()]
        );
        let settings = cfg.pipeline_settings();
        assert_eq!(settings.retention, Duration::days(30));
        assert_eq!(settings.rules.max_duration, Duration::hours(10));
    }

    #[test]
    fn rejects_invalid_version() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 2");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("unsupported version"));
    }

    #[test]
    fn rejects_missing_version() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "[retention]\ndays = 5\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("missing required `version`"));
    }

    #[test]
    fn rejects_unknown_key_shape() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 1\n[dedupe]\nkey = \"title\"\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("unsupported natural key"));
    }

    #[test]
    fn rejects_zero_retention() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 1\n[retention]\ndays = 0\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("zero `[retention].days`"));
    }

    #[test]
    fn rejects_retention_beyond_limit() {
        let tmp = tempdir().unwrap();
        write_config(tmp.path(), "version = 1\n[retention]\ndays = 100000000\n");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(format!("{err}").contains("the maximum is 36500"));

        write_config(tmp.path(), "version = 1\n[retention]\ndays = 36500\n");
        assert_eq!(load_config(tmp.path()).unwrap().retention_days, MAX_RETENTION_DAYS);
    }
}
