//! Turns one hour's raw feed payload into canonical [`BalloonPoint`]s.
//!
//! The feed has published several shapes over time:
//!
//! * a plain array of tuples, `[[lat, lon, alt?], ...]`;
//! * a feature collection, `{"features": [{"geometry": {"coordinates": [lon, lat]},
//!   "properties": {"alt": .., "id": ..}}]}`;
//! * an error marker, `{"error": "..."}`, when the snapshot is unavailable.
//!
//! Note the coordinate order: tuples are `[lat, lon]`, features are `[lon, lat]`.
//! Entries that cannot be read are dropped one by one; the rest of the hour survives.

use crate::types::balloon_point::BalloonPoint;
use serde_json::Value;

/// The recognized shapes of an hourly payload, detected once up front.
#[derive(Debug, Clone, PartialEq)]
pub enum RawHourPayload {
    /// Top-level array. Entries are tuples, although feature objects are accepted too.
    TupleList(Vec<Value>),
    /// The `features` array of a feature collection.
    FeatureCollection(Vec<Value>),
    /// The feed reported an error instead of data.
    ErrorMarker(String),
    /// Anything else. Normalizes to nothing.
    Unrecognized,
}

impl RawHourPayload {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(entries) => RawHourPayload::TupleList(entries),
            Value::Object(mut map) => {
                if let Some(error) = map.get("error").filter(|e| !e.is_null()) {
                    let message = match error {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    return RawHourPayload::ErrorMarker(message);
                }
                match map.remove("features") {
                    Some(Value::Array(features)) => RawHourPayload::FeatureCollection(features),
                    _ => RawHourPayload::Unrecognized,
                }
            }
            _ => RawHourPayload::Unrecognized,
        }
    }

    /// Number of raw entries, valid or not.
    pub fn len(&self) -> usize {
        match self {
            RawHourPayload::TupleList(entries) | RawHourPayload::FeatureCollection(entries) => {
                entries.len()
            }
            RawHourPayload::ErrorMarker(_) | RawHourPayload::Unrecognized => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Valid points in encounter order.
    pub fn into_points(self) -> Vec<BalloonPoint> {
        match self {
            RawHourPayload::TupleList(entries) => entries.iter().filter_map(parse_entry).collect(),
            RawHourPayload::FeatureCollection(features) => {
                features.iter().filter_map(parse_feature).collect()
            }
            RawHourPayload::ErrorMarker(_) | RawHourPayload::Unrecognized => Vec::new(),
        }
    }
}

/// Normalizes a raw payload in one step.
///
/// # Examples
///
/// ```
/// use balloon_history::normalize;
/// use serde_json::json;
///
/// let tuples = normalize(json!([[10.0, 20.0, 500.0], [1.0], ["x", 2.0]]));
/// assert_eq!(tuples.len(), 1);
/// assert_eq!(tuples[0].lat(), 10.0);
///
/// let features = normalize(json!({"features": [
///     {"geometry": {"coordinates": [20, 10]}, "properties": {"alt": 300}}
/// ]}));
/// assert_eq!((features[0].lat(), features[0].lon()), (10.0, 20.0));
/// ```
pub fn normalize(payload: Value) -> Vec<BalloonPoint> {
    RawHourPayload::classify(payload).into_points()
}

fn parse_entry(entry: &Value) -> Option<BalloonPoint> {
    match entry {
        Value::Array(tuple) => parse_tuple(tuple),
        Value::Object(_) => parse_feature(entry),
        _ => None,
    }
}

fn parse_tuple(tuple: &[Value]) -> Option<BalloonPoint> {
    if tuple.len() < 2 {
        return None;
    }
    let lat = number(&tuple[0])?;
    let lon = number(&tuple[1])?;
    let alt = tuple.get(2).and_then(number);
    BalloonPoint::new(lat, lon, alt)
}

fn parse_feature(feature: &Value) -> Option<BalloonPoint> {
    let coordinates = feature.get("geometry")?.get("coordinates")?.as_array()?;
    if coordinates.len() < 2 {
        return None;
    }
    // [lon, lat], the reverse of the tuple layout
    let lon = number(&coordinates[0])?;
    let lat = number(&coordinates[1])?;

    let properties = feature.get("properties");
    let alt = properties
        .and_then(|p| p.get("alt"))
        .and_then(number)
        .or_else(|| coordinates.get(2).and_then(number));
    let point = BalloonPoint::new(lat, lon, alt)?;

    match properties.and_then(|p| p.get("id")) {
        Some(Value::String(id)) => Some(point.with_id(id.as_str())),
        Some(Value::Number(id)) => Some(point.with_id(id.to_string())),
        _ => Some(point),
    }
}

/// Reads a finite number from a JSON number or a numeric string.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}
