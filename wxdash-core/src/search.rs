//! Free-text place search: directory autocomplete followed by a forward lookup.

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio_util::sync::CancellationToken;

use crate::{geocode::Geocoder, model::SelectedPlace};

pub mod directory;

pub use directory::{DEFAULT_SUGGESTION_LIMIT, PlaceDirectory, Suggestion};

#[derive(Debug)]
pub struct PlaceSearch {
    directory: Arc<PlaceDirectory>,
    geocoder: Arc<dyn Geocoder>,
    /// Prepended to the label for the forward lookup, e.g. `대한민국`.
    prefix: String,
    inflight: Mutex<Option<(u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl PlaceSearch {
    pub fn new(
        directory: Arc<PlaceDirectory>,
        geocoder: Arc<dyn Geocoder>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            geocoder,
            prefix: prefix.into(),
            inflight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn suggest(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        self.directory.autocomplete(query, limit)
    }

    /// Resolve a chosen directory label to coordinates.
    ///
    /// Starting a new selection cancels the one in flight; the superseded call
    /// returns `None`. The resulting place is named after the label.
    pub async fn select(&self, label: &str) -> Option<SelectedPlace> {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        if let Some((_, previous)) = self.inflight.lock().replace((generation, token.clone())) {
            previous.cancel();
        }

        let query = match self.prefix.trim() {
            "" => label.to_string(),
            prefix => format!("{prefix} {label}"),
        };

        let found = tokio::select! {
            _ = token.cancelled() => {
                tracing::debug!("Lookup for '{}' superseded", label);
                return None;
            }
            found = self.geocoder.forward(&query) => found,
        };

        {
            let mut inflight = self.inflight.lock();
            if inflight.as_ref().is_some_and(|(g, _)| *g == generation) {
                *inflight = None;
            }
        }

        let found = found.filter(|m| m.coords.is_finite())?;
        Some(SelectedPlace {
            place_name: label.to_string(),
            lat: found.coords.lat,
            lon: found.coords.lon,
        })
    }

    /// Best suggestion for `query`, resolved to coordinates.
    ///
    /// `None` for queries under two characters, no directory match or an
    /// unusable lookup result.
    pub async fn resolve(&self, query: &str) -> Option<SelectedPlace> {
        let best = self.suggest(query, 1).into_iter().next()?;
        self.select(&best.label).await
    }

    /// Abort the lookup in flight, if any.
    pub fn cancel(&self) {
        if let Some((_, token)) = self.inflight.lock().take() {
            token.cancel();
        }
    }
}

impl Drop for PlaceSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}
