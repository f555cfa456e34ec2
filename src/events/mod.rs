pub mod schema;
pub mod store;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Organization assigned when a candidate does not name one.
pub const UNKNOWN_ORGANIZATION_ID: i64 = 1;
pub const DEFAULT_EVENT_TYPE: &str = "other";

/// A candidate that passed validation and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub organization_id: i64,
    pub event_type: String,
    pub source_url: Option<String>,
}

impl EventRecord {
    pub fn natural_key(&self, shape: KeyShape) -> NaturalKey {
        NaturalKey {
            title: self.title.clone(),
            start_date: format_instant(&self.start_time),
            source_url: match shape {
                KeyShape::TitleStart => None,
                KeyShape::TitleStartSource => Some(self.source_url.clone().unwrap_or_default()),
            },
        }
    }
}

/// A row as it sits in the store. Dates stay as stored text because rows
/// written before validation existed may not parse, and older writers used
/// naive `YYYY-MM-DDTHH:MM:SS` text instead of RFC 3339.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub location_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub organization_id: i64,
    pub event_type: String,
    pub source_url: Option<String>,
    pub created_at: String,
}

impl StoredEvent {
    pub fn natural_key(&self, shape: KeyShape) -> NaturalKey {
        NaturalKey {
            title: self.title.clone(),
            start_date: normalize_instant_text(&self.start_date),
            source_url: match shape {
                KeyShape::TitleStart => None,
                KeyShape::TitleStartSource => Some(self.source_url.clone().unwrap_or_default()),
            },
        }
    }
}

/// Which fields make up a record's identity.
///
/// The key has changed shape over the life of the data set, so it is a
/// configuration constant rather than a storage constraint. Switching shapes
/// should be followed by a legacy duplicate sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyShape {
    #[default]
    TitleStart,
    TitleStartSource,
}

impl std::str::FromStr for KeyShape {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "title_start" => Ok(KeyShape::TitleStart),
            "title_start_source" => Ok(KeyShape::TitleStartSource),
            other => Err(anyhow::anyhow!(
                "unsupported natural key `{other}`; expected `title_start` or `title_start_source`"
            )),
        }
    }
}

/// Identity of a record. `source_url` is `Some` only for
/// [`KeyShape::TitleStartSource`], with an absent source compared as "".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub title: String,
    pub start_date: String,
    pub source_url: Option<String>,
}

impl NaturalKey {
    pub fn shape(&self) -> KeyShape {
        match self.source_url {
            None => KeyShape::TitleStart,
            Some(_) => KeyShape::TitleStartSource,
        }
    }
}

pub fn format_instant(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parses RFC 3339, or a naive `YYYY-MM-DD[T ]HH:MM[:SS[.f]]` read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Canonical key text for a stored date; unparseable text is kept verbatim.
pub fn normalize_instant_text(raw: &str) -> String {
    parse_instant(raw)
        .map(|ts| format_instant(&ts))
        .unwrap_or_else(|| raw.to_string())
}
