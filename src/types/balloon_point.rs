//! Canonical balloon positions and the spatial bucket used to deduplicate them.

use serde::Serialize;
use std::fmt;

/// A single normalized balloon position.
///
/// Latitude and longitude are always finite and inside `[-90, 90]` / `[-180, 180]`;
/// [`BalloonPoint::new`] refuses anything else. Points are immutable once built.
///
/// # Examples
///
/// ```
/// use balloon_history::BalloonPoint;
///
/// let point = BalloonPoint::new(10.0, 20.0, Some(300.0)).unwrap();
/// assert_eq!(point.lat(), 10.0);
/// assert_eq!(point.lon(), 20.0);
/// assert_eq!(point.alt(), Some(300.0));
///
/// assert!(BalloonPoint::new(f64::NAN, 20.0, None).is_none());
/// assert!(BalloonPoint::new(91.0, 20.0, None).is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalloonPoint {
    lat: f64,
    lon: f64,
    alt: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

impl BalloonPoint {
    /// Builds a point, or `None` when the coordinates are not a valid position.
    /// A non-finite altitude is stored as "unknown" rather than rejecting the point.
    pub fn new(lat: f64, lon: f64, alt: Option<f64>) -> Option<Self> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self {
            lat,
            lon,
            alt: alt.filter(|a| a.is_finite()),
            id: None,
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn alt(&self) -> Option<f64> {
        self.alt
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::of(self.lat, self.lon)
    }
}

/// A ~0.01° spatial bucket: latitude and longitude rounded to two decimals.
///
/// Stored as whole hundredths so equal buckets compare and hash exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    lat_hundredths: i64,
    lon_hundredths: i64,
}

impl DedupKey {
    pub fn of(lat: f64, lon: f64) -> Self {
        Self {
            lat_hundredths: (lat * 100.0).round() as i64,
            lon_hundredths: (lon * 100.0).round() as i64,
        }
    }
}

/// Formats as `"lat,lon"` with two decimals, e.g. `10.01,20.00`.
impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2},{:.2}",
            self.lat_hundredths as f64 / 100.0,
            self.lon_hundredths as f64 / 100.0
        )
    }
}
