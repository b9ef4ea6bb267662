use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::Value;

use crate::{
    error::WeatherError,
    model::{WeatherRequest, WeatherView},
    normalize::{iso_date, normalize, today_in},
};

use super::WeatherProvider;

/// Open-Meteo forecast endpoint, queried for a single local day.
#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    base_url: String,
    http: Client,
    clock: fn() -> DateTime<Utc>,
}

impl OpenMeteoProvider {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("wxdash/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Open-Meteo")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            clock: Utc::now,
        })
    }

    /// Replace the clock used to decide which local day is "today".
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    async fn fetch_raw(&self, request: &WeatherRequest, today: &str) -> Result<Value, WeatherError> {
        let lat = request.coords.lat.to_string();
        let lon = request.coords.lon.to_string();

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("timezone", request.time_zone.name()),
                ("current", "temperature_2m"),
                ("daily", "temperature_2m_min,temperature_2m_max"),
                ("hourly", "temperature_2m"),
                ("start_date", today),
                ("end_date", today),
            ])
            .send()
            .await
            .map_err(|e| WeatherError::FetchFailed(format!("request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(WeatherError::FetchFailed(format!(
                "status {}: {}",
                status,
                truncate_body(&body)
            )));
        }

        let body = res
            .text()
            .await
            .map_err(|e| WeatherError::FetchFailed(format!("failed to read body: {e}")))?;

        serde_json::from_str(&body)
            .map_err(|e| WeatherError::DataMissing(format!("response is not JSON: {e}")))
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherView, WeatherError> {
        let today = today_in(request.time_zone, (self.clock)());
        let raw = self.fetch_raw(request, &iso_date(today)).await?;

        let view = normalize(&raw, today, &request.place_name)?;
        tracing::debug!(
            "Fetched weather for {} ({})",
            request.place_name,
            request.coords.place_id()
        );
        Ok(view)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
