//! Parsing of the OpenAQ "latest" response into a single [`AirQualityReading`].
//!
//! A response lists nearby monitoring locations, each with its most recent
//! measurement per parameter. The best reading is taken from the closest location
//! that reports a usable PM2.5 or PM10 value.

use crate::types::air_quality::AirQualityReading;
use chrono::DateTime;
use haversine::{distance, Location as HaversineLocation, Units};
use serde::Deserialize;
use serde_json::Value;

// (concentration low, concentration high, index low, index high)
type Breakpoint = (f64, f64, u32, u32);

const PM25_BREAKPOINTS: [Breakpoint; 7] = [
    (0.0, 12.0, 0, 50),
    (12.1, 35.4, 51, 100),
    (35.5, 55.4, 101, 150),
    (55.5, 150.4, 151, 200),
    (150.5, 250.4, 201, 300),
    (250.5, 350.4, 301, 400),
    (350.5, 500.4, 401, 500),
];

const PM10_BREAKPOINTS: [Breakpoint; 7] = [
    (0.0, 54.0, 0, 50),
    (55.0, 154.0, 51, 100),
    (155.0, 254.0, 101, 150),
    (255.0, 354.0, 151, 200),
    (355.0, 424.0, 201, 300),
    (425.0, 504.0, 301, 400),
    (505.0, 604.0, 401, 500),
];

const MAX_AQI: u32 = 500;

// Locations and measurements stay untyped until read one at a time, so a single
// malformed entry only loses itself.
#[derive(Debug, Deserialize)]
struct LatestResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct LatestResult {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    coordinates: Option<Coordinates>,
    #[serde(default)]
    measurements: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct Coordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Measurement {
    parameter: String,
    value: Option<f64>,
    #[serde(default)]
    last_updated: Option<String>,
}

/// Picks the best reading for `(lat, lon)` from an OpenAQ "latest" body.
///
/// Locations that cannot be read are skipped. Returns `Ok(None)` when no location has
/// usable particulate data, and an error only when the body is not an object or its
/// `results` is not an array.
pub fn best_reading(
    body: Value,
    lat: f64,
    lon: f64,
) -> Result<Option<AirQualityReading>, serde_json::Error> {
    let response: LatestResponse = serde_json::from_value(body)?;

    let best = response
        .results
        .into_iter()
        .filter_map(|value| serde_json::from_value::<LatestResult>(value).ok())
        .filter_map(|result| {
            let mut reading = reading_from(&result)?;
            reading.distance_km = result
                .coordinates
                .as_ref()
                .and_then(|c| Some((c.latitude?, c.longitude?)))
                .filter(|(la, lo)| la.is_finite() && lo.is_finite())
                .map(|(latitude, longitude)| {
                    distance(
                        HaversineLocation {
                            latitude: lat,
                            longitude: lon,
                        },
                        HaversineLocation {
                            latitude,
                            longitude,
                        },
                        Units::Kilometers,
                    )
                });
            Some(reading)
        })
        .min_by(|a, b| {
            let da = a.distance_km.unwrap_or(f64::INFINITY);
            let db = b.distance_km.unwrap_or(f64::INFINITY);
            da.total_cmp(&db)
        });

    Ok(best)
}

fn reading_from(result: &LatestResult) -> Option<AirQualityReading> {
    let measurements: Vec<Measurement> = result
        .measurements
        .iter()
        .flatten()
        .filter_map(|m| serde_json::from_value(m.clone()).ok())
        .collect();
    let pm25 = latest_value(&measurements, &["pm25", "pm2.5"]);
    let pm10 = latest_value(&measurements, &["pm10"]);
    if pm25.is_none() && pm10.is_none() {
        return None;
    }

    let aqi = [
        pm25.map(|(value, _)| pm25_sub_index(value)),
        pm10.map(|(value, _)| pm10_sub_index(value)),
    ]
    .into_iter()
    .flatten()
    .max();

    let observed_at = [pm25, pm10]
        .into_iter()
        .flatten()
        .filter_map(|(_, observed)| observed)
        .max_by_key(|observed| DateTime::parse_from_rfc3339(observed).ok())
        .map(str::to_string);

    Some(AirQualityReading {
        aqi,
        pm25: pm25.map(|(value, _)| value),
        pm10: pm10.map(|(value, _)| value),
        observed_at,
        station: result.location.clone(),
        distance_km: None,
    })
}

/// Most recent usable value for one of `names`. OpenAQ reports missing values as
/// negative sentinels such as `-999`.
fn latest_value<'a>(
    measurements: &'a [Measurement],
    names: &[&str],
) -> Option<(f64, Option<&'a str>)> {
    measurements
        .iter()
        .filter(|m| names.iter().any(|n| m.parameter.eq_ignore_ascii_case(n)))
        .filter_map(|m| {
            let value = m.value.filter(|v| v.is_finite() && *v >= 0.0)?;
            Some((value, m.last_updated.as_deref()))
        })
        .max_by_key(|(_, observed)| observed.and_then(|o| DateTime::parse_from_rfc3339(o).ok()))
}

pub fn pm25_sub_index(concentration: f64) -> u32 {
    sub_index((concentration * 10.0).floor() / 10.0, &PM25_BREAKPOINTS)
}

pub fn pm10_sub_index(concentration: f64) -> u32 {
    sub_index(concentration.floor(), &PM10_BREAKPOINTS)
}

fn sub_index(concentration: f64, table: &[Breakpoint]) -> u32 {
    for &(c_low, c_high, i_low, i_high) in table {
        if concentration <= c_high {
            let slope = (i_high - i_low) as f64 / (c_high - c_low);
            let index = slope * (concentration - c_low).max(0.0) + i_low as f64;
            return index.round() as u32;
        }
    }
    MAX_AQI
}
