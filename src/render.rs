//! Hand-off to the map renderer: popup text and a GeoJSON feature collection.

use crate::types::air_quality::{AirQualityReading, EnrichedPoint};
use serde_json::{json, Map, Value};

const NOT_AVAILABLE: &str = "N/A";

/// Popup text for one marker.
///
/// Missing altitude and missing particulate values read `N/A`; a point without any
/// air-quality reading, or with a reading that carries no values, says so explicitly
/// instead of leaving the section out.
///
/// # Examples
///
/// ```
/// use balloon_history::{render, BalloonPoint, EnrichedPoint, HourIndex};
///
/// let point = BalloonPoint::new(10.0, 20.0, None).unwrap();
/// let text = render::popup_text(&EnrichedPoint::new(point, HourIndex::new(0).unwrap()));
/// assert!(text.contains("Altitude: N/A"));
/// assert!(text.contains("Air Quality: no data"));
/// ```
pub fn popup_text(point: &EnrichedPoint) -> String {
    let p = &point.point;
    let mut lines = vec!["Balloon".to_string()];
    if let Some(id) = p.id() {
        lines.push(format!("ID: {}", id));
    }
    lines.push(format!("Lat: {:.3}", p.lat()));
    lines.push(format!("Lon: {:.3}", p.lon()));
    lines.push(format!("Altitude: {}", or_na(p.alt().map(|a| format!("{:.1} m", a)))));
    lines.push(format!("Seen: {}h ago", point.hour));

    match point.air_quality.as_ref().filter(|reading| !reading.is_empty()) {
        None => lines.push("Air Quality: no data".to_string()),
        Some(reading) => lines.extend(reading_lines(reading)),
    }
    lines.join("\n")
}

fn reading_lines(reading: &AirQualityReading) -> Vec<String> {
    let aqi = reading
        .aqi
        .map(|aqi| format!("{} ({})", aqi, reading.category().map(|c| c.label()).unwrap_or_default()));
    let mut lines = vec![
        "Air Quality:".to_string(),
        format!("AQI: {}", or_na(aqi)),
        format!("PM2.5: {}", or_na(reading.pm25.map(|v| format!("{:.1} µg/m³", v)))),
        format!("PM10: {}", or_na(reading.pm10.map(|v| format!("{:.1} µg/m³", v)))),
    ];
    if let Some(station) = &reading.station {
        match reading.distance_km {
            Some(km) => lines.push(format!("Station: {} ({:.1} km)", station, km)),
            None => lines.push(format!("Station: {}", station)),
        }
    }
    if let Some(observed) = &reading.observed_at {
        lines.push(format!("Observed: {}", observed));
    }
    lines
}

fn or_na(value: Option<String>) -> String {
    value.unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// GeoJSON `FeatureCollection` of the points, coordinates in `[lon, lat]` order.
///
/// Altitude and id go into `properties`, next to the hour and the air-quality
/// reading (`null` when there is none).
pub fn to_feature_collection(points: &[EnrichedPoint]) -> Value {
    let features: Vec<Value> = points
        .iter()
        .map(|point| {
            let p = &point.point;
            let mut properties = Map::new();
            properties.insert("alt".to_string(), json!(p.alt()));
            if let Some(id) = p.id() {
                properties.insert("id".to_string(), json!(id));
            }
            properties.insert("hour".to_string(), json!(point.hour));
            properties.insert("airQuality".to_string(), json!(point.air_quality));
            json!({
                "type": "Feature",
                "geometry": {"type": "Point", "coordinates": [p.lon(), p.lat()]},
                "properties": properties,
            })
        })
        .collect();

    json!({"type": "FeatureCollection", "features": features})
}
