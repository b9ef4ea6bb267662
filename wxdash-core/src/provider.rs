use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    config::Config,
    error::WeatherError,
    model::{WeatherRequest, WeatherView},
};

pub mod open_meteo;

pub use open_meteo::OpenMeteoProvider;

/// A source of normalized weather for one place.
///
/// Implementations do not retry; that is left to [`crate::query::WeatherQueries`].
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn get_weather(&self, request: &WeatherRequest) -> Result<WeatherView, WeatherError>;
}

/// Construct the configured provider.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let provider = OpenMeteoProvider::new(&config.weather.base_url)?;
    Ok(Box::new(provider))
}
