use crate::feeds::error::FeedError;
use crate::types::hour::HourError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalloonHistoryError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Hour(#[from] HourError),

    #[error("Aggregation run was cancelled before it finished")]
    Cancelled,
}
