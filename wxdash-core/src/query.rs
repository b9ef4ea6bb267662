//! Cached, retrying access to a [`WeatherProvider`].
//!
//! Entries are keyed by the place id derived from the coordinates plus the time
//! zone, so the same spot requested under two names shares one fetch.

use chrono_tz::Tz;
use futures::{StreamExt, stream::FuturesOrdered};
use parking_lot::Mutex;
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    config::WeatherConfig,
    error::WeatherError,
    favorites::FAVORITES_LIMIT,
    model::{FavoritePlace, WeatherRequest, WeatherView},
    provider::WeatherProvider,
};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub place_id: String,
    pub time_zone: &'static str,
}

impl QueryKey {
    pub fn for_request(request: &WeatherRequest) -> Self {
        Self {
            place_id: request.coords.place_id(),
            time_zone: request.time_zone.name(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub retries: u32,
    pub retry_delay: Duration,
    pub stale_after: Duration,
}

impl From<&WeatherConfig> for QueryOptions {
    fn from(cfg: &WeatherConfig) -> Self {
        Self {
            retries: cfg.retries,
            retry_delay: Duration::from_millis(cfg.retry_delay_ms),
            stale_after: Duration::from_secs(cfg.stale_secs),
        }
    }
}

/// Current/min/max for one favorite, as shown in a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum FavoriteWeatherSummary {
    Error {
        #[serde(skip)]
        error: WeatherError,
    },
    #[serde(rename_all = "camelCase")]
    Success {
        temp_now_c: f64,
        temp_min_today_c: f64,
        temp_max_today_c: f64,
    },
}

impl From<Result<WeatherView, WeatherError>> for FavoriteWeatherSummary {
    fn from(result: Result<WeatherView, WeatherError>) -> Self {
        match result {
            Ok(view) => FavoriteWeatherSummary::Success {
                temp_now_c: view.temp_now_c,
                temp_min_today_c: view.temp_min_today_c,
                temp_max_today_c: view.temp_max_today_c,
            },
            Err(error) => FavoriteWeatherSummary::Error { error },
        }
    }
}

#[derive(Debug)]
struct CachedView {
    fetched_at: Instant,
    view: WeatherView,
}

#[derive(Debug)]
pub struct WeatherQueries {
    provider: Arc<dyn WeatherProvider>,
    options: QueryOptions,
    cache: Mutex<HashMap<QueryKey, CachedView>>,
}

impl WeatherQueries {
    pub fn new(provider: Arc<dyn WeatherProvider>, options: QueryOptions) -> Self {
        Self {
            provider,
            options,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Weather for the active place, served from cache while fresh.
    pub async fn fetch(&self, request: &WeatherRequest) -> Result<WeatherView, WeatherError> {
        let key = QueryKey::for_request(request);

        if let Some(view) = self.cached(&key) {
            return Ok(WeatherView {
                place_name: request.place_name.clone(),
                ..view
            });
        }

        let view = self.fetch_with_retry(request).await?;
        self.cache.lock().insert(
            key,
            CachedView {
                fetched_at: Instant::now(),
                view: view.clone(),
            },
        );
        Ok(view)
    }

    /// One independent fetch per favorite, all in flight at once.
    ///
    /// Results keep the input order; a failure only affects its own entry.
    pub async fn fetch_favorites(
        &self,
        items: &[FavoritePlace],
        time_zone: Tz,
    ) -> Vec<(String, FavoriteWeatherSummary)> {
        items
            .iter()
            .take(FAVORITES_LIMIT)
            .map(|item| async move {
                let request = WeatherRequest::new(&item.place_name, item.coordinates(), time_zone);
                let summary: FavoriteWeatherSummary = self.fetch(&request).await.into();
                (item.id.clone(), summary)
            })
            .collect::<FuturesOrdered<_>>()
            .collect()
            .await
    }

    pub fn invalidate(&self, key: &QueryKey) {
        self.cache.lock().remove(key);
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Fresh entry for `key`; an expired one is evicted.
    fn cached(&self, key: &QueryKey) -> Option<WeatherView> {
        let mut cache = self.cache.lock();
        let entry = cache.get(key)?;
        if entry.fetched_at.elapsed() < self.options.stale_after {
            return Some(entry.view.clone());
        }
        cache.remove(key);
        None
    }

    async fn fetch_with_retry(&self, request: &WeatherRequest) -> Result<WeatherView, WeatherError> {
        let mut attempt = 0;
        loop {
            match self.provider.get_weather(request).await {
                Ok(view) => return Ok(view),
                Err(e) if attempt < self.options.retries => {
                    let delay = retry_delay(self.options.retry_delay, attempt);
                    tracing::debug!(
                        "Weather fetch for {} failed ({}), retrying in {:?}",
                        request.place_name,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!("Weather fetch for {} failed: {}", request.place_name, e);
                    return Err(e);
                }
            }
        }
    }
}

/// `base * 2^attempt`, capped at 30 seconds.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt))
        .unwrap_or(MAX_RETRY_DELAY)
        .min(MAX_RETRY_DELAY)
}
