//! Core library for the `wxdash` weather dashboard.
//!
//! This crate defines:
//! - Configuration handling
//! - Weather fetching, normalization and caching
//! - Favorites persisted in durable key/value storage
//! - Place resolvers (current position, directory search, favorites)
//!
//! It is used by `wxdash-cli`, but can also back other front ends.

pub mod config;
pub mod error;
pub mod favorites;
pub mod format;
pub mod geocode;
pub mod location;
pub mod model;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod search;
pub mod storage;

pub use config::Config;
pub use error::{FavoriteError, LocationError, StorageError, WeatherError};
pub use favorites::{FAVORITES_LIMIT, FavoritesStore};
pub use geocode::{Geocoder, NominatimGeocoder};
pub use location::{ConfiguredPosition, CurrentPosition, PositionSource, PositionState};
pub use model::{
    Coordinates, FavoritePlace, HourlyTemperaturePoint, SelectedPlace, WeatherRequest, WeatherView,
};
pub use provider::{OpenMeteoProvider, WeatherProvider};
pub use query::{FavoriteWeatherSummary, WeatherQueries};
pub use search::{PlaceDirectory, PlaceSearch, Suggestion};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
