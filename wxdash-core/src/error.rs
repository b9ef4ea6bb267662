//! Typed failures surfaced by the core.
//!
//! Every variant carries a user-facing message so front ends can branch on the
//! kind of failure instead of parsing error strings.

use thiserror::Error;

/// Failures while fetching or normalizing weather data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeatherError {
    /// The transport call did not complete with a 2xx status.
    #[error("WEATHER_FETCH_FAILED: {0}")]
    FetchFailed(String),

    /// The response lacked a required field or had the wrong shape.
    #[error("WEATHER_DATA_MISSING: {0}")]
    DataMissing(String),

    /// Fewer than 24 valid same-day hourly points were present.
    #[error("WEATHER_HOURLY_INCOMPLETE: got {found} of 24 hourly points")]
    HourlyIncomplete { found: usize },
}

impl WeatherError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            WeatherError::FetchFailed(_) => "WEATHER_FETCH_FAILED",
            WeatherError::DataMissing(_) => "WEATHER_DATA_MISSING",
            WeatherError::HourlyIncomplete { .. } => "WEATHER_HOURLY_INCOMPLETE",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::FetchFailed(_) => {
                "Could not reach the weather service. Please try again later."
            }
            WeatherError::DataMissing(_) | WeatherError::HourlyIncomplete { .. } => {
                "No weather data is available for this place."
            }
        }
    }
}

/// Failures of the location service.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location service is not supported")]
    Unsupported,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("location request timed out")]
    Timeout,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::Unsupported => "This system does not provide a location service.",
            LocationError::PermissionDenied => {
                "Location permission is required. Search for a place instead."
            }
            LocationError::PositionUnavailable | LocationError::Timeout => {
                "Could not get the current position. Please try again shortly."
            }
        }
    }
}

/// Rejections returned by favorites mutations.
///
/// Callers branch on the variant (or [`FavoriteError::reason`]) to pick a message.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum FavoriteError {
    #[error("favorites limit reached")]
    Limit,
    #[error("place is already a favorite")]
    Duplicate,
    #[error("place name is empty")]
    Empty,
    #[error("favorites could not be saved")]
    Storage,
}

impl FavoriteError {
    pub fn reason(&self) -> &'static str {
        match self {
            FavoriteError::Limit => "limit",
            FavoriteError::Duplicate => "duplicate",
            FavoriteError::Empty => "empty",
            FavoriteError::Storage => "storage",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            FavoriteError::Limit => "You can save at most 6 favorites. Remove one first.",
            FavoriteError::Duplicate => "This place is already in your favorites.",
            FavoriteError::Empty => "Enter a name for the place.",
            FavoriteError::Storage => "Favorites could not be saved.",
        }
    }
}

/// Durable key/value storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("storage write rejected: {0}")]
    Rejected(String),
}
