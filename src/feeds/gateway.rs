//! Outbound calls to the balloon and air-quality feeds.

use crate::feeds::config::FeedConfig;
use crate::feeds::error::FeedError;
use crate::feeds::openaq::best_reading;
use crate::types::air_quality::AirQualityReading;
use crate::types::hour::HourIndex;
use log::{debug, warn};
use reqwest::{Client, Response};
use serde_json::Value;
use std::future::Future;

/// The network seam of the pipeline.
///
/// Implementations make exactly one attempt per call and report every failure as a
/// [`FeedError`]; nothing panics or retries past this boundary.
pub trait FeedGateway {
    /// Fetches the raw JSON snapshot for one hour of the window.
    fn fetch_hour(&self, hour: HourIndex) -> impl Future<Output = Result<Value, FeedError>> + Send;

    /// Looks up air quality near a position. `Ok(None)` means the feed answered
    /// but had nothing usable, which is distinct from a failed call.
    fn fetch_air_quality(
        &self,
        lat: f64,
        lon: f64,
    ) -> impl Future<Output = Result<Option<AirQualityReading>, FeedError>> + Send;
}

/// [`FeedGateway`] over HTTP with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFeedGateway {
    config: FeedConfig,
    client: Client,
}

impl HttpFeedGateway {
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FeedError::ClientBuild)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    async fn get_json(&self, url: String) -> Result<Value, FeedError> {
        debug!("Requesting {}", url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json,text/plain,*/*")
            .send()
            .await
            .map_err(|e| FeedError::Transport(url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            let message = match self.read_body(&url, response).await {
                Ok(body) => error_message(&body),
                Err(e) => {
                    debug!("Could not read error body from {}: {}", url, e);
                    None
                }
            };
            warn!(
                "HTTP error for {}: {} ({})",
                url,
                status,
                message.as_deref().unwrap_or("no error message")
            );
            return Err(FeedError::Upstream {
                url,
                status,
                message,
            });
        }

        let body = self.read_body(&url, response).await?;
        serde_json::from_slice(&body).map_err(|source| FeedError::MalformedPayload { url, source })
    }

    /// Reads the body chunk by chunk, giving up once it exceeds `max_body_bytes`.
    async fn read_body(&self, url: &str, mut response: Response) -> Result<Vec<u8>, FeedError> {
        let limit = self.config.max_body_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FeedError::PayloadTooLarge {
                url: url.to_string(),
                limit,
            });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FeedError::Transport(url.to_string(), e))?
        {
            if body.len() + chunk.len() > limit {
                return Err(FeedError::PayloadTooLarge {
                    url: url.to_string(),
                    limit,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

impl FeedGateway for HttpFeedGateway {
    async fn fetch_hour(&self, hour: HourIndex) -> Result<Value, FeedError> {
        self.get_json(self.config.hour_url(hour)).await
    }

    async fn fetch_air_quality(
        &self,
        lat: f64,
        lon: f64,
    ) -> Result<Option<AirQualityReading>, FeedError> {
        let url = self.config.air_quality_url(lat, lon);
        let body = self.get_json(url.clone()).await?;
        best_reading(body, lat, lon).map_err(|source| FeedError::MalformedPayload { url, source })
    }
}

/// Extracts the `error` field of a proxy error body such as
/// `{"error": "Invalid hour format. Use 00-23."}`.
fn error_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}
