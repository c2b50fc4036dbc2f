//! The entry point: aggregates the 24-hour balloon history into enriched points.
//!
//! A run fetches every hour of the window, normalizes each payload, deduplicates
//! positions across hours with the earliest hour winning, and finally joins each
//! surviving point with an air-quality reading. Failures of single hours or single
//! lookups only shrink the result; they never end the run.

use crate::error::BalloonHistoryError;
use crate::feeds::config::FeedConfig;
use crate::feeds::gateway::{FeedGateway, HttpFeedGateway};
use crate::pipeline::deduplicator::Deduplicator;
use crate::pipeline::joiner::{AirQualityJoiner, DEFAULT_MAX_CONCURRENT_LOOKUPS};
use crate::pipeline::normalizer::RawHourPayload;
use crate::types::air_quality::EnrichedPoint;
use crate::types::hour::HourIndex;
use bon::bon;
use futures_util::stream::{self, StreamExt};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Refresh period for [`HistoryAggregator::watch`] when the caller has no preference.
pub const DEFAULT_REFRESH_PERIOD: Duration = Duration::from_secs(60);

/// What happened to one hour of the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HourOutcome {
    /// The payload was read. `received` raw entries, `valid` of which normalized,
    /// `kept` of which survived deduplication.
    Fetched {
        received: usize,
        valid: usize,
        kept: usize,
    },
    /// The feed answered with an error marker or a shape that is not understood.
    Skipped(String),
    /// The call itself failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourReport {
    pub hour: HourIndex,
    pub outcome: HourOutcome,
}

/// Result of one aggregation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Hour-ascending, then in arrival order within each hour.
    pub points: Vec<EnrichedPoint>,
    /// One report per hour of the window, `00` first.
    pub hours: Vec<HourReport>,
}

impl Aggregation {
    /// Hours whose payload contributed to the run, even if every point was a duplicate.
    pub fn hours_covered(&self) -> usize {
        self.hours
            .iter()
            .filter(|h| matches!(h.outcome, HourOutcome::Fetched { .. }))
            .count()
    }

    pub fn missing_hours(&self) -> Vec<HourIndex> {
        self.hours
            .iter()
            .filter(|h| !matches!(h.outcome, HourOutcome::Fetched { .. }))
            .map(|h| h.hour)
            .collect()
    }
}

/// Drives the fetch, normalize, deduplicate and enrich pipeline.
///
/// Each call to [`run`](Self::run) or [`aggregate`](Self::aggregate) owns its own
/// deduplication state. Starting a run cancels any run still in progress on the
/// same aggregator, and [`cancel`](Self::cancel) stops the current one.
///
/// # Examples
///
/// ```no_run
/// # use balloon_history::{BalloonHistoryError, FeedConfig, FeedMode, HistoryAggregator, HttpFeedGateway};
/// # #[tokio::main]
/// # async fn main() -> Result<(), BalloonHistoryError> {
/// let gateway = HttpFeedGateway::new(
///     FeedConfig::builder()
///         .mode(FeedMode::proxy("http://localhost:3000/api"))
///         .build(),
/// )?;
/// let aggregator = HistoryAggregator::builder()
///     .gateway(gateway)
///     .max_concurrent_lookups(4)
///     .build();
///
/// let points = aggregator.aggregate().await?;
/// println!("{} balloons", points.len());
/// # Ok(())
/// # }
/// ```
pub struct HistoryAggregator<G> {
    gateway: G,
    enrich_air_quality: bool,
    max_concurrent_lookups: usize,
    hour_fetch_concurrency: usize,
    next_run_id: AtomicU64,
    current_run: Mutex<Option<(u64, CancellationToken)>>,
}

#[bon]
impl<G: FeedGateway> HistoryAggregator<G> {
    /// # Arguments
    ///
    /// * `.gateway(G)`: **Required.** Where the feeds are fetched from.
    /// * `.enrich_air_quality(bool)`: Look up air quality for every point. Defaults to `true`.
    /// * `.max_concurrent_lookups(usize)`: Bound on simultaneous air-quality lookups. Defaults to `8`.
    /// * `.hour_fetch_concurrency(usize)`: Hours fetched at once. Defaults to `1`, one
    ///   request in flight at a time. Deduplication order is hour-ascending either way.
    #[builder]
    pub fn new(
        gateway: G,
        #[builder(default = true)] enrich_air_quality: bool,
        #[builder(default = DEFAULT_MAX_CONCURRENT_LOOKUPS)] max_concurrent_lookups: usize,
        #[builder(default = 1)] hour_fetch_concurrency: usize,
    ) -> Self {
        Self {
            gateway,
            enrich_air_quality,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
            hour_fetch_concurrency: hour_fetch_concurrency.max(1),
            next_run_id: AtomicU64::new(0),
            current_run: Mutex::new(None),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// The deduplicated, enriched points of a fresh run.
    ///
    /// # Errors
    ///
    /// Returns [`BalloonHistoryError::Cancelled`] if the run was superseded or cancelled.
    /// Feed failures never surface here; they only reduce the result.
    pub async fn aggregate(&self) -> Result<Vec<EnrichedPoint>, BalloonHistoryError> {
        Ok(self.run().await?.points)
    }

    /// Like [`aggregate`](Self::aggregate), but also reports what happened to each hour.
    pub async fn run(&self) -> Result<Aggregation, BalloonHistoryError> {
        let (run_id, token) = self.begin_run();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(BalloonHistoryError::Cancelled),
            aggregation = self.collect() => Ok(aggregation),
        };
        self.finish_run(run_id);
        result
    }

    /// Cancels the run in progress, if any. Its in-flight requests are dropped.
    pub fn cancel(&self) {
        let current = self
            .current_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((run_id, token)) = current {
            info!("Cancelling aggregation run {}", run_id);
            token.cancel();
        }
    }

    /// Re-runs the aggregation every `period` until `shutdown` is cancelled, handing
    /// each completed result to `on_update`. A run still going when the next period
    /// starts is abandoned in favour of a fresh one.
    pub async fn watch<F>(&self, period: Duration, shutdown: CancellationToken, mut on_update: F)
    where
        F: FnMut(Aggregation),
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.cancel();
                    break;
                }
                _ = ticker.tick() => {
                    warn!("Aggregation did not finish within {:?}; starting over", period);
                    continue;
                }
                result = self.run() => match result {
                    Ok(aggregation) => on_update(aggregation),
                    Err(e) => warn!("Aggregation run ended early: {}", e),
                },
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }
    }

    fn begin_run(&self) -> (u64, CancellationToken) {
        let run_id = self.next_run_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self
            .current_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((run_id, token.clone()));
        if let Some((previous_id, previous_token)) = previous {
            info!(
                "Aggregation run {} supersedes unfinished run {}",
                run_id, previous_id
            );
            previous_token.cancel();
        }
        (run_id, token)
    }

    fn finish_run(&self, run_id: u64) {
        let mut current = self
            .current_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|(id, _)| *id == run_id) {
            *current = None;
        }
    }

    async fn collect(&self) -> Aggregation {
        let fetched: Vec<_> = stream::iter(HourIndex::all())
            .map(|hour| async move { (hour, self.gateway.fetch_hour(hour).await) })
            .buffered(self.hour_fetch_concurrency)
            .collect()
            .await;

        // buffered() yields in hour order, so the earliest hour claims each bucket
        let mut dedup = Deduplicator::new();
        let mut points = Vec::new();
        let mut hours = Vec::with_capacity(fetched.len());

        for (hour, result) in fetched {
            let outcome = match result.map(RawHourPayload::classify) {
                Err(e) => {
                    warn!("Error fetching hour {}: {}", hour, e);
                    HourOutcome::Failed(e.to_string())
                }
                Ok(RawHourPayload::ErrorMarker(message)) => {
                    info!("Skipped corrupted hour {}: {}", hour, message);
                    HourOutcome::Skipped(message)
                }
                Ok(RawHourPayload::Unrecognized) => {
                    info!("Skipped hour {}: unrecognized payload shape", hour);
                    HourOutcome::Skipped("unrecognized payload shape".to_string())
                }
                Ok(payload) => {
                    let received = payload.len();
                    let normalized = payload.into_points();
                    let valid = normalized.len();
                    let before = points.len();
                    points.extend(
                        dedup
                            .dedupe(normalized)
                            .into_iter()
                            .map(|point| EnrichedPoint::new(point, hour)),
                    );
                    HourOutcome::Fetched {
                        received,
                        valid,
                        kept: points.len() - before,
                    }
                }
            };
            hours.push(HourReport { hour, outcome });
        }

        let covered = hours
            .iter()
            .filter(|h| matches!(h.outcome, HourOutcome::Fetched { .. }))
            .count();
        info!(
            "Collected {} unique positions from {}/{} hours",
            points.len(),
            covered,
            hours.len()
        );

        let points = if self.enrich_air_quality && !points.is_empty() {
            AirQualityJoiner::new(&self.gateway, self.max_concurrent_lookups)
                .enrich_all(points)
                .await
        } else {
            points
        };

        Aggregation { points, hours }
    }
}

impl HistoryAggregator<HttpFeedGateway> {
    /// An HTTP-backed aggregator with default settings.
    pub fn from_config(config: FeedConfig) -> Result<Self, BalloonHistoryError> {
        Ok(HistoryAggregator::builder()
            .gateway(HttpFeedGateway::new(config)?)
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::testing::{AirScript, ScriptedGateway};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn hour(h: u8) -> HourIndex {
        HourIndex::new(h).unwrap()
    }

    #[tokio::test]
    async fn test_earliest_hour_wins_shared_bucket() -> Result<(), BalloonHistoryError> {
        let gateway = ScriptedGateway::new()
            .hour(0, json!([[10.005, 20.001, 500]]))
            .hour(1, json!([[10.006, 20.002, 510]]));
        let aggregator = HistoryAggregator::builder()
            .gateway(gateway)
            .enrich_air_quality(false)
            .build();

        let points = aggregator.aggregate().await?;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].point.alt(), Some(500.0));
        assert_eq!(points[0].hour, hour(0));
        assert_eq!(points[0].air_quality, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_all_hours_failing_is_empty_not_error() -> Result<(), BalloonHistoryError> {
        let aggregator = HistoryAggregator::builder()
            .gateway(ScriptedGateway::new())
            .build();

        let aggregation = aggregator.run().await?;
        assert!(aggregation.points.is_empty());
        assert_eq!(aggregation.hours.len(), 24);
        assert_eq!(aggregation.hours_covered(), 0);
        assert_eq!(aggregation.missing_hours().len(), 24);
        assert!(aggregation
            .hours
            .iter()
            .all(|h| matches!(h.outcome, HourOutcome::Failed(_))));
        assert_eq!(aggregator.gateway().air_calls.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_hours_do_not_hide_others() -> Result<(), BalloonHistoryError> {
        let gateway = ScriptedGateway::new()
            .hour(3, json!([[1.0, 1.0, 100], [2.0, 2.0]]))
            .hour(7, json!({"error": "WindBorne returned an error."}))
            .hour(12, json!({"features": [{"geometry": {"coordinates": [30.0, 3.0]}, "properties": {"alt": 7}}]}))
            .hour(15, json!("not a payload"))
            .hour(23, json!([[1.001, 1.001, 999], ["bad"], [4.0, 4.0, 40]]));
        let aggregator = HistoryAggregator::builder().gateway(gateway).build();

        let aggregation = aggregator.run().await?;
        let summary: Vec<(u8, f64, f64)> = aggregation
            .points
            .iter()
            .map(|p| (p.hour.get(), p.point.lat(), p.point.lon()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (3, 1.0, 1.0),
                (3, 2.0, 2.0),
                (12, 3.0, 30.0),
                (23, 4.0, 4.0),
            ]
        );

        // enrichment echoes the latitude back as PM2.5, in point order
        let pm25: Vec<Option<f64>> = aggregation
            .points
            .iter()
            .map(|p| p.air_quality.as_ref().and_then(|r| r.pm25))
            .collect();
        assert_eq!(pm25, vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);

        let outcome = |h: u8| aggregation.hours[h as usize].outcome.clone();
        assert_eq!(
            outcome(3),
            HourOutcome::Fetched {
                received: 2,
                valid: 2,
                kept: 2
            }
        );
        assert_eq!(
            outcome(7),
            HourOutcome::Skipped("WindBorne returned an error.".to_string())
        );
        assert!(matches!(outcome(15), HourOutcome::Skipped(_)));
        assert!(matches!(outcome(0), HourOutcome::Failed(_)));
        assert_eq!(
            outcome(23),
            HourOutcome::Fetched {
                received: 3,
                valid: 2,
                kept: 1
            }
        );
        assert_eq!(aggregation.hours_covered(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_every_hour_requested_once_in_order() -> Result<(), BalloonHistoryError> {
        let aggregator = HistoryAggregator::builder()
            .gateway(ScriptedGateway::new())
            .build();
        aggregator.run().await?;
        let requested = aggregator.gateway().hours_requested();
        assert_eq!(requested, HourIndex::all().collect::<Vec<_>>());
        Ok(())
    }

    #[tokio::test]
    async fn test_parallel_hour_fetch_keeps_hour_order_for_dedup(
    ) -> Result<(), BalloonHistoryError> {
        let mut gateway = ScriptedGateway::new().hour_delay(Duration::from_millis(2));
        for h in 0..24u8 {
            gateway = gateway.hour(h, json!([[50.0, 50.0, h], [h as f64, 0.0, h]]));
        }
        let aggregator = HistoryAggregator::builder()
            .gateway(gateway)
            .hour_fetch_concurrency(6)
            .enrich_air_quality(false)
            .build();

        let points = aggregator.aggregate().await?;
        // hour 00 claims the shared bucket, every hour adds its own distinct point
        assert_eq!(points[0].point.lat(), 50.0);
        assert_eq!(points[0].point.alt(), Some(0.0));
        assert_eq!(points.len(), 25);
        let hours: Vec<u8> = points.iter().map(|p| p.hour.get()).collect();
        let mut sorted = hours.clone();
        sorted.sort();
        assert_eq!(hours, sorted);
        Ok(())
    }

    #[tokio::test]
    async fn test_no_air_quality_keeps_points() -> Result<(), BalloonHistoryError> {
        let gateway = ScriptedGateway::new()
            .hour(0, json!([[5.0, 5.0]]))
            .air(AirScript::Fail);
        let aggregator = HistoryAggregator::builder().gateway(gateway).build();
        let points = aggregator.aggregate().await?;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].air_quality, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_runs_do_not_share_seen_buckets() -> Result<(), BalloonHistoryError> {
        let gateway = ScriptedGateway::new().hour(0, json!([[5.0, 5.0]]));
        let aggregator = HistoryAggregator::builder()
            .gateway(gateway)
            .enrich_air_quality(false)
            .build();
        assert_eq!(aggregator.aggregate().await?.len(), 1);
        assert_eq!(aggregator.aggregate().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_stops_current_run() {
        let gateway = ScriptedGateway::new().hour_delay(Duration::from_millis(20));
        let aggregator = HistoryAggregator::builder().gateway(gateway).build();

        let (result, _) = tokio::join!(aggregator.run(), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            aggregator.cancel();
        });
        assert!(matches!(result, Err(BalloonHistoryError::Cancelled)));
        assert!(aggregator.gateway().hours_requested().len() < 24);
    }

    #[tokio::test]
    async fn test_new_run_supersedes_previous() {
        let gateway = ScriptedGateway::new()
            .hour(0, json!([[1.0, 1.0]]))
            .hour_delay(Duration::from_millis(5));
        let aggregator = HistoryAggregator::builder()
            .gateway(gateway)
            .enrich_air_quality(false)
            .build();

        let (first, second) = tokio::join!(aggregator.run(), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            aggregator.run().await
        });
        assert!(matches!(first, Err(BalloonHistoryError::Cancelled)));
        let second = second.unwrap();
        assert_eq!(second.points.len(), 1);
        assert_eq!(second.hours.len(), 24);
    }

    #[tokio::test]
    async fn test_watch_delivers_updates_until_shutdown() {
        let gateway = ScriptedGateway::new().hour(0, json!([[1.0, 1.0]]));
        let aggregator = HistoryAggregator::builder()
            .gateway(gateway)
            .enrich_air_quality(false)
            .build();
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        let mut updates = Vec::new();
        aggregator
            .watch(Duration::from_millis(30), shutdown, |aggregation| {
                updates.push(aggregation.points.len());
                if updates.len() == 2 {
                    stop.cancel();
                }
            })
            .await;
        assert_eq!(updates, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_watch_restarts_slow_runs() {
        let gateway = ScriptedGateway::new().hour_delay(Duration::from_millis(30));
        let aggregator = HistoryAggregator::builder().gateway(gateway).build();
        let shutdown = CancellationToken::new();

        let mut updates = 0;
        tokio::join!(
            aggregator.watch(Duration::from_millis(100), shutdown.clone(), |_| updates += 1),
            async {
                tokio::time::sleep(Duration::from_millis(350)).await;
                shutdown.cancel();
            }
        );
        assert_eq!(updates, 0);
        let restarts = aggregator
            .gateway()
            .hours_requested()
            .into_iter()
            .filter(|h| *h == hour(0))
            .count();
        assert!(restarts >= 2, "hour 00 requested {} times", restarts);
    }
}
