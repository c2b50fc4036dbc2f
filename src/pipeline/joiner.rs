//! Attaches air-quality readings to deduplicated points.

use crate::feeds::gateway::FeedGateway;
use crate::types::air_quality::EnrichedPoint;
use futures_util::stream::{self, StreamExt};
use log::{debug, warn};

/// Default upper bound on simultaneous air-quality lookups.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Looks up air quality for points through a [`FeedGateway`].
///
/// Lookups are best effort: a failed call and a "no data" answer both leave the
/// point's `air_quality` empty, and the point always stays in the result.
pub struct AirQualityJoiner<'a, G> {
    gateway: &'a G,
    max_concurrent: usize,
}

impl<'a, G: FeedGateway> AirQualityJoiner<'a, G> {
    pub fn new(gateway: &'a G, max_concurrent: usize) -> Self {
        Self {
            gateway,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub async fn enrich(&self, point: EnrichedPoint) -> EnrichedPoint {
        let (lat, lon) = (point.point.lat(), point.point.lon());
        let reading = match self.gateway.fetch_air_quality(lat, lon).await {
            Ok(Some(reading)) => Some(reading),
            Ok(None) => {
                debug!("No air-quality data near {:.3},{:.3}", lat, lon);
                None
            }
            Err(e) => {
                warn!("Air-quality lookup failed near {:.3},{:.3}: {}", lat, lon, e);
                None
            }
        };
        point.with_air_quality(reading)
    }

    /// Enriches every point with at most `max_concurrent` lookups in flight.
    /// The output keeps the input order regardless of completion order.
    pub async fn enrich_all(&self, points: Vec<EnrichedPoint>) -> Vec<EnrichedPoint> {
        stream::iter(points)
            .map(|point| self.enrich(point))
            .buffered(self.max_concurrent)
            .collect()
            .await
    }
}
