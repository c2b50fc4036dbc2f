//! Collapses positions that fall into the same ~0.01° bucket.

use crate::types::balloon_point::{BalloonPoint, DedupKey};
use std::collections::HashSet;

/// Per-run set of occupied buckets. The first point seen in a bucket wins and every
/// later one is discarded, even if it comes from a more recent snapshot.
///
/// One instance belongs to one aggregation run; create a fresh one per run.
///
/// # Examples
///
/// ```
/// use balloon_history::{BalloonPoint, Deduplicator};
///
/// let mut dedup = Deduplicator::new();
/// let hour_00 = vec![BalloonPoint::new(10.005, 20.001, Some(500.0)).unwrap()];
/// let hour_01 = vec![BalloonPoint::new(10.006, 20.002, Some(510.0)).unwrap()];
///
/// let kept_00 = dedup.dedupe(hour_00);
/// let kept_01 = dedup.dedupe(hour_01);
/// assert_eq!(kept_00[0].alt(), Some(500.0));
/// assert!(kept_01.is_empty());
/// ```
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    seen: HashSet<DedupKey>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the point's bucket as seen. Returns `false` if it already was.
    pub fn admit(&mut self, point: &BalloonPoint) -> bool {
        self.seen.insert(point.dedup_key())
    }

    /// Keeps the points whose bucket is new to this run, in arrival order.
    pub fn dedupe(&mut self, points: impl IntoIterator<Item = BalloonPoint>) -> Vec<BalloonPoint> {
        points.into_iter().filter(|p| self.admit(p)).collect()
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains(key)
    }

    /// Number of occupied buckets.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
