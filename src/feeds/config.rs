//! Where the gateway sends its requests and how.

use crate::types::hour::HourIndex;
use bon::Builder;
use std::time::Duration;

const WINDBORNE_TREASURE_URL: &str = "https://a.windbornesystems.com/treasure";
const OPENAQ_LATEST_URL: &str = "https://api.openaq.org/v2/latest";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; BalloonHistory/0.1)";
const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Which endpoints serve the balloon and air-quality feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMode {
    /// The two pass-through proxy endpoints, `/balloon-history?hour=HH` and
    /// `/air-quality?lat=LAT&lon=LON`, mounted under `base_url`.
    Proxy { base_url: String },
    /// The upstream feeds themselves.
    Upstream,
}

impl FeedMode {
    pub fn proxy(base_url: impl Into<String>) -> Self {
        FeedMode::Proxy {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Gateway settings.
///
/// # Examples
///
/// ```
/// use balloon_history::{FeedConfig, FeedMode, HourIndex};
/// use std::time::Duration;
///
/// let config = FeedConfig::builder()
///     .mode(FeedMode::proxy("http://localhost:3000/api/"))
///     .timeout(Duration::from_secs(5))
///     .build();
///
/// let hour = HourIndex::new(4).unwrap();
/// assert_eq!(
///     config.hour_url(hour),
///     "http://localhost:3000/api/balloon-history?hour=04"
/// );
/// ```
#[derive(Debug, Clone, Builder)]
pub struct FeedConfig {
    #[builder(default = FeedMode::Upstream)]
    pub mode: FeedMode,
    /// Per-request timeout, covering connect and body.
    #[builder(default = Duration::from_secs(10))]
    pub timeout: Duration,
    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,
    /// Responses larger than this are refused.
    #[builder(default = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig::builder().build()
    }
}

impl FeedConfig {
    pub fn hour_url(&self, hour: HourIndex) -> String {
        match &self.mode {
            FeedMode::Proxy { base_url } => format!("{}/balloon-history?hour={}", base_url, hour),
            FeedMode::Upstream => format!("{}/{}.json", WINDBORNE_TREASURE_URL, hour),
        }
    }

    pub fn air_quality_url(&self, lat: f64, lon: f64) -> String {
        match &self.mode {
            FeedMode::Proxy { base_url } => {
                format!("{}/air-quality?lat={}&lon={}", base_url, lat, lon)
            }
            FeedMode::Upstream => format!("{}?coordinates={},{}", OPENAQ_LATEST_URL, lat, lon),
        }
    }
}
