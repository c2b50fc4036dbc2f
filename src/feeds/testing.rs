//! A scripted in-memory [`FeedGateway`] for pipeline tests.

use crate::feeds::error::FeedError;
use crate::feeds::gateway::FeedGateway;
use crate::types::air_quality::AirQualityReading;
use crate::types::hour::HourIndex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum AirScript {
    /// Reading whose PM2.5 equals the queried latitude, so tests can check ordering.
    EchoLatitude,
    NoData,
    Fail,
    /// Fails only for this latitude, echoes otherwise.
    FailAt(f64),
}

pub(crate) struct ScriptedGateway {
    hours: HashMap<HourIndex, Value>,
    air: AirScript,
    hour_delay: Duration,
    air_delay: Duration,
    pub hour_calls: Mutex<Vec<HourIndex>>,
    pub air_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

pub(crate) fn upstream_failure(url: &str) -> FeedError {
    FeedError::Upstream {
        url: url.to_string(),
        status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        message: Some("WindBorne returned an error.".to_string()),
    }
}

impl ScriptedGateway {
    /// Every hour not given a body fails with an upstream error.
    pub fn new() -> Self {
        Self {
            hours: HashMap::new(),
            air: AirScript::EchoLatitude,
            hour_delay: Duration::ZERO,
            air_delay: Duration::ZERO,
            hour_calls: Mutex::new(Vec::new()),
            air_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn hour(mut self, hour: u8, body: Value) -> Self {
        self.hours.insert(HourIndex::new(hour).unwrap(), body);
        self
    }

    pub fn air(mut self, air: AirScript) -> Self {
        self.air = air;
        self
    }

    pub fn hour_delay(mut self, delay: Duration) -> Self {
        self.hour_delay = delay;
        self
    }

    pub fn air_delay(mut self, delay: Duration) -> Self {
        self.air_delay = delay;
        self
    }

    pub fn hours_requested(&self) -> Vec<HourIndex> {
        self.hour_calls.lock().unwrap().clone()
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FeedGateway for ScriptedGateway {
    async fn fetch_hour(&self, hour: HourIndex) -> Result<Value, FeedError> {
        self.hour_calls.lock().unwrap().push(hour);
        if !self.hour_delay.is_zero() {
            tokio::time::sleep(self.hour_delay).await;
        }
        self.hours
            .get(&hour)
            .cloned()
            .ok_or_else(|| upstream_failure(&format!("scripted://balloon-history?hour={}", hour)))
    }

    async fn fetch_air_quality(
        &self,
        lat: f64,
        _lon: f64,
    ) -> Result<Option<AirQualityReading>, FeedError> {
        self.air_calls.fetch_add(1, Ordering::SeqCst);
        self.enter();
        if !self.air_delay.is_zero() {
            tokio::time::sleep(self.air_delay).await;
        }
        self.leave();

        let echo = AirQualityReading {
            pm25: Some(lat),
            ..Default::default()
        };
        match self.air {
            AirScript::EchoLatitude => Ok(Some(echo)),
            AirScript::NoData => Ok(None),
            AirScript::Fail => Err(upstream_failure("scripted://air-quality")),
            AirScript::FailAt(bad) if bad == lat => Err(upstream_failure("scripted://air-quality")),
            AirScript::FailAt(_) => Ok(Some(echo)),
        }
    }
}
