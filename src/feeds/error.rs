use thiserror::Error;

/// Failure of a single call to one of the feeds.
///
/// The gateway returns these instead of panicking or retrying; callers degrade the
/// affected hour or point to "absent".
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {0}")]
    Transport(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}: {}", .message.as_deref().unwrap_or("no error message"))]
    Upstream {
        url: String,
        status: reqwest::StatusCode,
        message: Option<String>,
    },

    #[error("Response body from {url} exceeds {limit} bytes")]
    PayloadTooLarge { url: String, limit: usize },

    #[error("Response body from {url} is not valid JSON")]
    MalformedPayload {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FeedError {
    /// `true` when the feed could not be reached at all, as opposed to answering badly.
    pub fn is_transport(&self) -> bool {
        matches!(self, FeedError::Transport(..))
    }
}
