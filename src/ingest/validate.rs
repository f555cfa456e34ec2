//! Structural and temporal/geospatial checks on untrusted candidates.
//!
//! Rules run in a fixed order and the first failure wins, so every rejected
//! candidate is attributed to exactly one [`FailureReason`].

pub use crate::events::parse_instant;

use crate::events::{DEFAULT_EVENT_TYPE, EventRecord, StoredEvent, UNKNOWN_ORGANIZATION_ID};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MAX_DURATION_HOURS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    MissingFields,
    InvalidDate,
    InvalidOrder,
    TooLong,
    InvalidCoordinates,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::MissingFields => "missing_fields",
            FailureReason::InvalidDate => "invalid_date",
            FailureReason::InvalidOrder => "invalid_order",
            FailureReason::TooLong => "too_long",
            FailureReason::InvalidCoordinates => "invalid_coordinates",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationRules {
    pub max_duration: Duration,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_duration: Duration::hours(DEFAULT_MAX_DURATION_HOURS),
        }
    }
}

enum DateField {
    Missing,
    Unparseable,
    Parsed(DateTime<Utc>),
}

pub fn validate_candidate(
    candidate: &Value,
    rules: &ValidationRules,
) -> Result<EventRecord, FailureReason> {
    let obj = candidate
        .as_object()
        .ok_or(FailureReason::MissingFields)?;

    let title = text_field(obj, &["title"]).ok_or(FailureReason::MissingFields)?;
    let start = date_field(obj, &["start_date", "start_time"]);
    let end = date_field(obj, &["end_date", "end_time"]);
    if matches!(start, DateField::Missing) || matches!(end, DateField::Missing) {
        return Err(FailureReason::MissingFields);
    }
    let (DateField::Parsed(start_time), DateField::Parsed(end_time)) = (start, end) else {
        return Err(FailureReason::InvalidDate);
    };

    check_window(start_time, end_time, rules)?;

    let latitude = coordinate_field(obj, "latitude")?;
    let longitude = coordinate_field(obj, "longitude")?;
    check_coordinates(latitude, longitude)?;

    Ok(EventRecord {
        title,
        description: text_field(obj, &["description"]),
        start_time,
        end_time,
        location_name: text_field(obj, &["location_name"]),
        latitude,
        longitude,
        organization_id: organization_field(obj).unwrap_or(UNKNOWN_ORGANIZATION_ID),
        event_type: text_field(obj, &["event_type"])
            .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
        source_url: text_field(obj, &["source_url"]),
    })
}

/// Re-applies the temporal and coordinate rules to a stored row. Structural
/// completeness is not rechecked; the schema already guarantees it.
pub fn check_stored(row: &StoredEvent, rules: &ValidationRules) -> Result<(), FailureReason> {
    let start = parse_instant(&row.start_date).ok_or(FailureReason::InvalidDate)?;
    let end = parse_instant(&row.end_date).ok_or(FailureReason::InvalidDate)?;
    check_window(start, end, rules)?;
    check_coordinates(row.latitude, row.longitude)
}

fn check_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    rules: &ValidationRules,
) -> Result<(), FailureReason> {
    if end <= start {
        return Err(FailureReason::InvalidOrder);
    }
    if end - start > rules.max_duration {
        return Err(FailureReason::TooLong);
    }
    Ok(())
}

/// Each coordinate is range-checked only when present; supplying one without
/// the other is allowed.
fn check_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Result<(), FailureReason> {
    let lat_ok = latitude.is_none_or(|v| v.is_finite() && (-90.0..=90.0).contains(&v));
    let lon_ok = longitude.is_none_or(|v| v.is_finite() && (-180.0..=180.0).contains(&v));
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(FailureReason::InvalidCoordinates)
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

fn text_field(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    lookup(obj, names)
        .and_then(Value::as_str)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn date_field(obj: &Map<String, Value>, names: &[&str]) -> DateField {
    match lookup(obj, names) {
        None => DateField::Missing,
        Some(Value::String(s)) if s.trim().is_empty() => DateField::Missing,
        Some(Value::String(s)) => match parse_instant(s) {
            Some(ts) => DateField::Parsed(ts),
            None => DateField::Unparseable,
        },
        Some(_) => DateField::Unparseable,
    }
}

fn coordinate_field(obj: &Map<String, Value>, name: &str) -> Result<Option<f64>, FailureReason> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or(FailureReason::InvalidCoordinates),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| FailureReason::InvalidCoordinates),
        Some(_) => Err(FailureReason::InvalidCoordinates),
    }
}

fn organization_field(obj: &Map<String, Value>) -> Option<i64> {
    match obj.get("organization_id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    fn base() -> Value {
        json!({
            "title": "Town Hall",
            "start_date": "2025-03-01T18:00:00Z",
            "end_date": "2025-03-01T19:00:00Z"
        })
    }

    fn with(mut v: Value, key: &str, val: Value) -> Value {
        v.as_object_mut().unwrap().insert(key.to_string(), val);
        v
    }

    #[test]
    fn accepts_minimal_candidate_with_defaults() {
        let rec = validate_candidate(&base(), &rules()).unwrap();
        assert_eq!(rec.title, "Town Hall");
        assert_eq!(rec.event_type, "other");
        assert_eq!(rec.organization_id, UNKNOWN_ORGANIZATION_ID);
        assert_eq!(rec.latitude, None);
        assert_eq!(rec.source_url, None);
    }

    #[test]
    fn missing_or_blank_required_fields() {
        let no_title = json!({"start_date": "2025-03-01T18:00:00Z", "end_date": "2025-03-01T19:00:00Z"});
        assert_eq!(
            validate_candidate(&no_title, &rules()),
            Err(FailureReason::MissingFields)
        );
        let blank_title = with(base(), "title", json!("   "));
        assert_eq!(
            validate_candidate(&blank_title, &rules()),
            Err(FailureReason::MissingFields)
        );
        let null_end = with(base(), "end_date", Value::Null);
        assert_eq!(
            validate_candidate(&null_end, &rules()),
            Err(FailureReason::MissingFields)
        );
        assert_eq!(
            validate_candidate(&json!(["not", "an", "object"]), &rules()),
            Err(FailureReason::MissingFields)
        );
    }

    #[test]
    fn missing_fields_wins_over_bad_date() {
        let v = json!({"start_date": "garbage", "end_date": "2025-03-01T19:00:00Z"});
        assert_eq!(validate_candidate(&v, &rules()), Err(FailureReason::MissingFields));
    }

    #[test]
    fn unparseable_dates_are_invalid_date() {
        let v = with(base(), "start_date", json!("next tuesday"));
        assert_eq!(validate_candidate(&v, &rules()), Err(FailureReason::InvalidDate));
        let v = with(base(), "end_date", json!(1_740_855_600));
        assert_eq!(validate_candidate(&v, &rules()), Err(FailureReason::InvalidDate));
    }

    #[test]
    fn end_not_after_start_is_invalid_order() {
        let equal = with(base(), "end_date", json!("2025-03-01T18:00:00Z"));
        assert_eq!(validate_candidate(&equal, &rules()), Err(FailureReason::InvalidOrder));
        let before = with(base(), "end_date", json!("2025-03-01T17:00:00Z"));
        assert_eq!(validate_candidate(&before, &rules()), Err(FailureReason::InvalidOrder));
    }

    #[test]
    fn fourteen_hours_is_the_inclusive_limit() {
        let exact = with(base(), "end_date", json!("2025-03-02T08:00:00Z"));
        assert!(validate_candidate(&exact, &rules()).is_ok());
        let over = with(base(), "end_date", json!("2025-03-02T08:00:01Z"));
        assert_eq!(validate_candidate(&over, &rules()), Err(FailureReason::TooLong));
    }

    #[test]
    fn invalid_order_wins_over_coordinates() {
        let v = with(
            with(base(), "end_date", json!("2025-03-01T17:00:00Z")),
            "latitude",
            json!(500.0),
        );
        assert_eq!(validate_candidate(&v, &rules()), Err(FailureReason::InvalidOrder));
    }

    #[test]
    fn coordinate_ranges() {
        let edge = with(with(base(), "latitude", json!(90.0)), "longitude", json!(-180.0));
        assert!(validate_candidate(&edge, &rules()).is_ok());
        let over = with(base(), "latitude", json!(90.0001));
        assert_eq!(
            validate_candidate(&over, &rules()),
            Err(FailureReason::InvalidCoordinates)
        );
        let bad_lon = with(base(), "longitude", json!(180.5));
        assert_eq!(
            validate_candidate(&bad_lon, &rules()),
            Err(FailureReason::InvalidCoordinates)
        );
    }

    #[test]
    fn one_sided_coordinates_are_accepted() {
        let lon_only = with(base(), "longitude", json!(-78.9));
        let rec = validate_candidate(&lon_only, &rules()).unwrap();
        assert_eq!(rec.latitude, None);
        assert_eq!(rec.longitude, Some(-78.9));
    }

    #[test]
    fn non_numeric_coordinate_strings_are_rejected() {
        let v = with(base(), "latitude", json!("north"));
        assert_eq!(validate_candidate(&v, &rules()), Err(FailureReason::InvalidCoordinates));
        let v = with(base(), "latitude", json!("NaN"));
        assert_eq!(validate_candidate(&v, &rules()), Err(FailureReason::InvalidCoordinates));
        let v = with(base(), "latitude", json!("35.9"));
        assert_eq!(validate_candidate(&v, &rules()).unwrap().latitude, Some(35.9));
    }

    #[test]
    fn normalizes_offsets_and_naive_times_to_utc() {
        let v = with(
            with(base(), "start_date", json!("2025-03-01T13:00:00-05:00")),
            "end_date",
            json!("2025-03-01 19:00:00"),
        );
        let rec = validate_candidate(&v, &rules()).unwrap();
        assert_eq!(crate::events::format_instant(&rec.start_time), "2025-03-01T18:00:00Z");
        assert_eq!(crate::events::format_instant(&rec.end_time), "2025-03-01T19:00:00Z");
    }

    #[test]
    fn accepts_start_time_aliases() {
        let v = json!({
            "title": "Board Meeting",
            "start_time": "2025-03-01T18:00:00Z",
            "end_time": "2025-03-01T20:00:00Z",
            "organization_id": "7",
            "event_type": "government"
        });
        let rec = validate_candidate(&v, &rules()).unwrap();
        assert_eq!(rec.organization_id, 7);
        assert_eq!(rec.event_type, "government");
    }

    #[test]
    fn stored_rows_are_rechecked_without_structure() {
        let row = StoredEvent {
            id: 1,
            title: "Overnight".to_string(),
            description: None,
            start_date: "2025-03-01T00:00:00Z".to_string(),
            end_date: "2025-03-02T00:00:00Z".to_string(),
            location_name: None,
            latitude: Some(0.0),
            longitude: Some(0.0),
            organization_id: 1,
            event_type: "other".to_string(),
            source_url: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        };
        assert_eq!(check_stored(&row, &rules()), Err(FailureReason::TooLong));

        let mut unparseable = row.clone();
        unparseable.start_date = "TBD".to_string();
        assert_eq!(check_stored(&unparseable, &rules()), Err(FailureReason::InvalidDate));

        let mut ok = row;
        ok.end_date = "2025-03-01T02:00:00Z".to_string();
        assert_eq!(check_stored(&ok, &rules()), Ok(()));
    }
}
