//! Aggregates the last 24 hourly snapshots of a high-altitude balloon feed into one
//! deduplicated set of positions, each joined with a nearby air-quality reading.
//!
//! Start with [`HistoryAggregator`]; the individual stages ([`normalize`],
//! [`Deduplicator`], [`AirQualityJoiner`]) are public for callers that want them alone.

mod error;
mod feeds;
mod history;
mod pipeline;
pub mod render;
mod types;

pub use error::BalloonHistoryError;
pub use history::*;

pub use feeds::config::{FeedConfig, FeedMode};
pub use feeds::error::FeedError;
pub use feeds::gateway::{FeedGateway, HttpFeedGateway};
pub use feeds::openaq::{pm10_sub_index, pm25_sub_index};

pub use pipeline::deduplicator::Deduplicator;
pub use pipeline::joiner::{AirQualityJoiner, DEFAULT_MAX_CONCURRENT_LOOKUPS};
pub use pipeline::normalizer::{normalize, RawHourPayload};

pub use types::air_quality::{AirQualityReading, AqiCategory, EnrichedPoint};
pub use types::balloon_point::{BalloonPoint, DedupKey};
pub use types::hour::{HourError, HourIndex, HOURS_IN_WINDOW};
