use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Identifier derived from the coordinates rounded to 5 decimal places.
    pub fn place_id(&self) -> String {
        place_id(self.lat, self.lon)
    }
}

/// `"{lat},{lon}"` with both values fixed to 5 decimals.
///
/// Two places within rounding distance share an id.
pub fn place_id(lat: f64, lon: f64) -> String {
    format!("{lat:.5},{lon:.5}")
}

/// Output of every place resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedPlace {
    pub place_name: String,
    pub lat: f64,
    pub lon: f64,
}

impl SelectedPlace {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }
}

/// A saved place as persisted in durable storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritePlace {
    pub id: String,
    pub place_name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl FavoritePlace {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    pub fn as_selected(&self) -> SelectedPlace {
        SelectedPlace {
            place_name: self.place_name.clone(),
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeatherRequest {
    pub place_name: String,
    pub coords: Coordinates,
    pub time_zone: Tz,
}

impl WeatherRequest {
    pub fn new(place_name: impl Into<String>, coords: Coordinates, time_zone: Tz) -> Self {
        Self {
            place_name: place_name.into(),
            coords,
            time_zone,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyTemperaturePoint {
    /// Local `YYYY-MM-DDTHH:MM` timestamp as reported by the provider.
    pub time: String,
    pub temp_c: f64,
}

/// Normalized weather for one place and one local calendar day.
///
/// `hourly_today` always holds exactly 24 points of the same date, ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherView {
    pub place_name: String,
    pub temp_now_c: f64,
    pub temp_min_today_c: f64,
    pub temp_max_today_c: f64,
    pub hourly_today: Vec<HourlyTemperaturePoint>,
}
