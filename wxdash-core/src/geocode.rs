//! Reverse and forward geocoding against a Nominatim server.
//!
//! Both directions are best-effort: every failure collapses to `None` and is
//! only logged, since coordinates alone are still usable.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::Deserialize;
use std::fmt::Debug;

use crate::{config::GeocoderConfig, model::Coordinates};

/// A forward lookup hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardMatch {
    pub coords: Coordinates,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Human-readable name for `coords`, if one can be found.
    async fn reverse(&self, coords: Coordinates) -> Option<String>;

    /// First coordinate match for free text.
    async fn forward(&self, query: &str) -> Option<ForwardMatch>;
}

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    base_url: String,
    accept_language: String,
    country_codes: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    address: Option<ReverseAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct ReverseAddress {
    road: Option<String>,
    house_number: Option<String>,
    city: Option<String>,
    borough: Option<String>,
    suburb: Option<String>,
    neighbourhood: Option<String>,
    county: Option<String>,
    state: Option<String>,
    region: Option<String>,
}

impl ReverseAddress {
    /// Administrative area followed by street, e.g. `서울특별시 강남구 역삼동 테헤란로 152`.
    fn label(&self) -> String {
        let area = compact_join(&[
            &self.state,
            &self.region,
            &self.county,
            &self.city,
            &self.borough,
            &self.suburb,
            &self.neighbourhood,
        ]);
        let road = compact_join(&[&self.road, &self.house_number]);
        compact_join(&[&Some(area), &Some(road)])
    }
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    lat: Option<String>,
    lon: Option<String>,
    display_name: Option<String>,
}

fn compact_join(parts: &[&Option<String>]) -> String {
    parts
        .iter()
        .filter_map(|p| p.as_deref())
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_coord(raw: Option<&str>) -> Option<f64> {
    raw?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client for geocoding")?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
            country_codes: config.country_codes.clone(),
            http,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Option<T> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = match self.http.get(&url).query(query).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Geocode request to {} failed: {}", endpoint, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Geocode {} returned status {}", endpoint, response.status());
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!("Geocode {} parse error: {}", endpoint, e);
                None
            }
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn reverse(&self, coords: Coordinates) -> Option<String> {
        let lat = coords.lat.to_string();
        let lon = coords.lon.to_string();

        let body: ReverseResponse = self
            .get_json(
                "reverse",
                &[
                    ("format", "jsonv2"),
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("zoom", "18"),
                    ("addressdetails", "1"),
                    ("accept-language", self.accept_language.as_str()),
                ],
            )
            .await?;

        let label = body.address.unwrap_or_default().label();
        let name = if label.is_empty() {
            body.display_name
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())?
        } else {
            label
        };

        tracing::info!("Reverse geocoded to: {}", name);
        Some(name)
    }

    async fn forward(&self, query: &str) -> Option<ForwardMatch> {
        let q = query.trim();
        if q.is_empty() {
            return None;
        }

        let items: Vec<SearchItem> = self
            .get_json(
                "search",
                &[
                    ("format", "jsonv2"),
                    ("q", q),
                    ("limit", "1"),
                    ("addressdetails", "1"),
                    ("accept-language", self.accept_language.as_str()),
                    ("countrycodes", self.country_codes.as_str()),
                ],
            )
            .await?;

        let first = items.into_iter().next()?;
        let lat = parse_coord(first.lat.as_deref())?;
        let lon = parse_coord(first.lon.as_deref())?;

        Some(ForwardMatch {
            coords: Coordinates::new(lat, lon),
            display_name: first.display_name,
        })
    }
}
