//! Air-quality readings and the enriched points handed to the renderer.

use crate::types::balloon_point::BalloonPoint;
use crate::types::hour::HourIndex;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The best available air-quality measurement near a balloon position.
///
/// Every field is optional: a station may report PM10 but not PM2.5, or omit the
/// timestamp. A missing reading altogether is modelled as `Option<AirQualityReading>`
/// on [`EnrichedPoint`], never as an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualityReading {
    /// US EPA air quality index derived from the particulate readings.
    pub aqi: Option<u32>,
    /// PM2.5 concentration in µg/m³.
    pub pm25: Option<f64>,
    /// PM10 concentration in µg/m³.
    pub pm10: Option<f64>,
    /// Timestamp of the most recent measurement used, as reported by the feed.
    pub observed_at: Option<String>,
    /// Name of the reporting station, if the feed provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    /// Great-circle distance between the balloon and the station.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl AirQualityReading {
    /// Parses [`observed_at`](Self::observed_at) as an RFC 3339 timestamp.
    pub fn observed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.observed_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn category(&self) -> Option<AqiCategory> {
        self.aqi.map(AqiCategory::from_aqi)
    }

    /// `true` when the reading carries no measurement at all.
    pub fn is_empty(&self) -> bool {
        self.aqi.is_none() && self.pm25.is_none() && self.pm10.is_none()
    }
}

/// US EPA AQI bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    pub fn from_aqi(aqi: u32) -> Self {
        match aqi {
            0..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitiveGroups,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A deduplicated balloon point together with the hour it was first seen in and
/// its air-quality reading. `air_quality` is `None` when enrichment was disabled,
/// the lookup failed, or the feed had no data for the position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPoint {
    #[serde(flatten)]
    pub point: BalloonPoint,
    pub hour: HourIndex,
    pub air_quality: Option<AirQualityReading>,
}

impl EnrichedPoint {
    pub fn new(point: BalloonPoint, hour: HourIndex) -> Self {
        Self {
            point,
            hour,
            air_quality: None,
        }
    }

    pub fn with_air_quality(mut self, reading: Option<AirQualityReading>) -> Self {
        self.air_quality = reading;
        self
    }
}
