use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::sync::Arc;

use wxdash_core::{
    Config, CurrentPosition, FavoritesStore, FileStorage, NominatimGeocoder, PlaceDirectory,
    PlaceSearch, WeatherQueries, WeatherRequest,
    location::{ConfiguredPosition, PositionOptions},
    model::SelectedPlace,
    provider::provider_from_config,
    query::QueryOptions,
};

/// Everything a command needs, wired from the config file.
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub time_zone: Tz,
    pub queries: WeatherQueries,
    pub favorites: Arc<FavoritesStore>,
    pub search: PlaceSearch,
    geocoder: Arc<NominatimGeocoder>,
}

impl App {
    pub fn from_config(mut config: Config, tz_override: Option<&str>) -> Result<Self> {
        if let Some(name) = tz_override {
            config.time_zone = name.to_string();
        }
        let time_zone = config.time_zone()?;

        let provider = provider_from_config(&config)?;
        let queries = WeatherQueries::new(Arc::from(provider), QueryOptions::from(&config.weather));

        let storage_path = config.storage_file_path()?;
        let favorites = Arc::new(FavoritesStore::open(Arc::new(FileStorage::new(storage_path))));

        let geocoder = Arc::new(NominatimGeocoder::new(&config.geocoder)?);

        let directory = match &config.directory.path {
            Some(path) => PlaceDirectory::load(path)?,
            None => PlaceDirectory::bundled().clone(),
        };
        let search = PlaceSearch::new(
            Arc::new(directory),
            geocoder.clone(),
            config.geocoder.search_prefix.clone(),
        );

        Ok(Self {
            config,
            time_zone,
            queries,
            favorites,
            search,
            geocoder,
        })
    }

    pub fn load(tz_override: Option<&str>) -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::from_config(config, tz_override)
    }

    pub fn current_position(&self) -> CurrentPosition {
        CurrentPosition::new(
            Arc::new(ConfiguredPosition::from(&self.config.location)),
            self.geocoder.clone(),
            PositionOptions::from(&self.config.location),
        )
    }

    pub fn request_for(&self, place: &SelectedPlace) -> WeatherRequest {
        WeatherRequest::new(&place.place_name, place.coordinates(), self.time_zone)
    }
}
