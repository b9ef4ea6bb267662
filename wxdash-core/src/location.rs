//! One-shot current-position lookup with best-effort place-name enrichment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    config::LocationConfig,
    error::LocationError,
    geocode::Geocoder,
    model::{Coordinates, SelectedPlace},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coords: Coordinates,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct PositionOptions {
    pub timeout: Duration,
    /// A previous fix younger than this is reused instead of asking again.
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }
}

impl From<&LocationConfig> for PositionOptions {
    fn from(cfg: &LocationConfig) -> Self {
        Self {
            timeout: cfg.timeout(),
            maximum_age: cfg.maximum_age(),
        }
    }
}

/// The platform location service.
#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    fn is_supported(&self) -> bool;
    async fn current_position(&self) -> Result<Position, LocationError>;
}

/// Position pinned in the config file. Unsupported when no coordinates are set.
#[derive(Debug, Clone)]
pub struct ConfiguredPosition {
    coords: Option<Coordinates>,
}

impl ConfiguredPosition {
    pub fn new(coords: Option<Coordinates>) -> Self {
        Self { coords }
    }
}

impl From<&LocationConfig> for ConfiguredPosition {
    fn from(cfg: &LocationConfig) -> Self {
        Self::new(cfg.coordinates())
    }
}

#[async_trait]
impl PositionSource for ConfiguredPosition {
    fn is_supported(&self) -> bool {
        self.coords.is_some()
    }

    async fn current_position(&self) -> Result<Position, LocationError> {
        let coords = self.coords.ok_or(LocationError::Unsupported)?;
        if !coords.is_finite() {
            return Err(LocationError::PositionUnavailable);
        }
        Ok(Position {
            coords,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    /// Not requested yet, or the service is unsupported.
    Idle,
    Loading,
    Success {
        coords: Coordinates,
        place_name: Option<String>,
    },
    Error {
        error: LocationError,
        message: String,
    },
}

#[derive(Debug)]
pub struct CurrentPosition {
    source: Arc<dyn PositionSource>,
    geocoder: Arc<dyn Geocoder>,
    options: PositionOptions,
    state: Arc<watch::Sender<PositionState>>,
    /// True while a reverse lookup for the current fix is outstanding.
    naming: Arc<watch::Sender<bool>>,
    last_fix: Mutex<Option<Position>>,
    cancel: CancellationToken,
}

impl CurrentPosition {
    pub fn new(
        source: Arc<dyn PositionSource>,
        geocoder: Arc<dyn Geocoder>,
        options: PositionOptions,
    ) -> Self {
        let (state, _) = watch::channel(PositionState::Idle);
        let (naming, _) = watch::channel(false);
        Self {
            source,
            geocoder,
            options,
            state: Arc::new(state),
            naming: Arc::new(naming),
            last_fix: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> PositionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PositionState> {
        self.state.subscribe()
    }

    /// Ask for the current position.
    ///
    /// On success a reverse lookup for the place name starts in the background
    /// and is folded into the `Success` state if it resolves before
    /// [`detach`](Self::detach). Its failure is ignored.
    pub async fn request(&self) -> Result<Coordinates, LocationError> {
        if !self.source.is_supported() {
            self.state.send_replace(PositionState::Idle);
            return Err(LocationError::Unsupported);
        }

        self.state.send_replace(PositionState::Loading);

        let position = match self.fresh_fix() {
            Some(fix) => Ok(fix),
            None => tokio::time::timeout(self.options.timeout, self.source.current_position())
                .await
                .unwrap_or(Err(LocationError::Timeout)),
        };

        match position {
            Ok(position) => {
                *self.last_fix.lock() = Some(position);
                self.state.send_replace(PositionState::Success {
                    coords: position.coords,
                    place_name: None,
                });
                self.spawn_enrichment(position.coords);
                Ok(position.coords)
            }
            Err(error) => {
                tracing::debug!("Position request failed: {}", error);
                self.state.send_replace(PositionState::Error {
                    error,
                    message: error.user_message().to_string(),
                });
                Err(error)
            }
        }
    }

    /// Wait up to `wait` for the place name of the current fix.
    ///
    /// Returns as soon as the reverse lookup settles, whether or not it found a name.
    pub async fn place_name_within(&self, wait: Duration) -> Option<String> {
        let mut pending = self.naming.subscribe();
        let _ = tokio::time::timeout(wait, pending.wait_for(|p| !*p)).await;

        match &*self.state.borrow() {
            PositionState::Success { place_name, .. } => place_name.clone(),
            _ => None,
        }
    }

    /// The current fix as a resolved place, falling back to `fallback_name`.
    pub fn selected_place(&self, fallback_name: &str) -> Option<SelectedPlace> {
        match &*self.state.borrow() {
            PositionState::Success { coords, place_name } => Some(SelectedPlace {
                place_name: place_name.clone().unwrap_or_else(|| fallback_name.to_string()),
                lat: coords.lat,
                lon: coords.lon,
            }),
            _ => None,
        }
    }

    /// Cancel any enrichment still in flight.
    pub fn detach(&self) {
        self.cancel.cancel();
    }

    fn fresh_fix(&self) -> Option<Position> {
        let fix = (*self.last_fix.lock())?;
        let age = (Utc::now() - fix.timestamp).to_std().unwrap_or(Duration::ZERO);
        (age <= self.options.maximum_age).then_some(fix)
    }

    fn spawn_enrichment(&self, coords: Coordinates) {
        let state = Arc::clone(&self.state);
        let naming = Arc::clone(&self.naming);
        let geocoder = Arc::clone(&self.geocoder);
        let token = self.cancel.child_token();

        naming.send_replace(true);
        tokio::spawn(async move {
            let name = tokio::select! {
                _ = token.cancelled() => None,
                name = geocoder.reverse(coords) => name,
            };

            if let Some(name) = name {
                state.send_if_modified(|current| match current {
                    PositionState::Success { coords: c, place_name } if *c == coords => {
                        *place_name = Some(name);
                        true
                    }
                    _ => false,
                });
            }
            naming.send_replace(false);
        });
    }
}

impl Drop for CurrentPosition {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::ForwardMatch;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeSource {
        result: Result<Coordinates, LocationError>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeSource {
        fn ok(lat: f64, lon: f64) -> Self {
            Self {
                result: Ok(Coordinates::new(lat, lon)),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn err(error: LocationError) -> Self {
            Self {
                result: Err(error),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PositionSource for FakeSource {
        fn is_supported(&self) -> bool {
            true
        }

        async fn current_position(&self) -> Result<Position, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.map(|coords| Position {
                coords,
                timestamp: Utc::now(),
            })
        }
    }

    #[derive(Debug)]
    struct SlowNamer {
        name: Option<String>,
        delay: Duration,
        finished: AtomicBool,
    }

    impl SlowNamer {
        fn new(name: Option<&str>, delay_ms: u64) -> Self {
            Self {
                name: name.map(str::to_string),
                delay: Duration::from_millis(delay_ms),
                finished: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl Geocoder for SlowNamer {
        async fn reverse(&self, _coords: Coordinates) -> Option<String> {
            tokio::time::sleep(self.delay).await;
            self.finished.store(true, Ordering::SeqCst);
            self.name.clone()
        }

        async fn forward(&self, _query: &str) -> Option<ForwardMatch> {
            None
        }
    }

    fn resolver(source: FakeSource, namer: SlowNamer) -> (Arc<FakeSource>, Arc<SlowNamer>, CurrentPosition) {
        let source = Arc::new(source);
        let namer = Arc::new(namer);
        let current = CurrentPosition::new(source.clone(), namer.clone(), PositionOptions::default());
        (source, namer, current)
    }

    #[tokio::test(start_paused = true)]
    async fn success_then_enriched_name() {
        let (_, _, current) = resolver(FakeSource::ok(37.5665, 126.978), SlowNamer::new(Some("서울특별시 중구"), 50));
        assert_eq!(current.state(), PositionState::Idle);

        let coords = current.request().await.unwrap();
        assert_eq!(coords, Coordinates::new(37.5665, 126.978));
        assert_eq!(
            current.state(),
            PositionState::Success { coords, place_name: None }
        );

        let name = current.place_name_within(Duration::from_secs(5)).await;
        assert_eq!(name.as_deref(), Some("서울특별시 중구"));
        assert_eq!(current.selected_place("Current position").unwrap().place_name, "서울특별시 중구");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_enrichment_keeps_coordinates() {
        let (_, _, current) = resolver(FakeSource::ok(35.0, 129.0), SlowNamer::new(None, 10));

        current.request().await.unwrap();
        let started = tokio::time::Instant::now();
        assert_eq!(current.place_name_within(Duration::from_secs(3)).await, None);
        assert!(started.elapsed() < Duration::from_secs(1));

        let place = current.selected_place("Current position").unwrap();
        assert_eq!(place.place_name, "Current position");
        assert_eq!(place.lat, 35.0);
    }

    #[tokio::test(start_paused = true)]
    async fn detach_cancels_enrichment() {
        let (_, namer, current) = resolver(FakeSource::ok(35.0, 129.0), SlowNamer::new(Some("Busan"), 1000));

        current.request().await.unwrap();
        current.detach();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert!(!namer.finished.load(Ordering::SeqCst));
        assert!(matches!(current.state(), PositionState::Success { place_name: None, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_source_times_out() {
        let mut source = FakeSource::ok(1.0, 1.0);
        source.delay = Duration::from_secs(30);
        let (_, _, current) = resolver(source, SlowNamer::new(None, 0));

        assert_eq!(current.request().await, Err(LocationError::Timeout));
        match current.state() {
            PositionState::Error { error, message } => {
                assert_eq!(error, LocationError::Timeout);
                assert_eq!(message, LocationError::Timeout.user_message());
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn permission_denied_is_reported() {
        let (_, _, current) = resolver(FakeSource::err(LocationError::PermissionDenied), SlowNamer::new(None, 0));

        assert_eq!(current.request().await, Err(LocationError::PermissionDenied));
        assert!(matches!(
            current.state(),
            PositionState::Error { error: LocationError::PermissionDenied, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn recent_fix_is_reused() {
        let (source, _, current) = resolver(FakeSource::ok(1.0, 2.0), SlowNamer::new(None, 0));

        current.request().await.unwrap();
        current.request().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_service_stays_idle() {
        let current = CurrentPosition::new(
            Arc::new(ConfiguredPosition::new(None)),
            Arc::new(SlowNamer::new(None, 0)),
            PositionOptions::default(),
        );

        assert_eq!(current.request().await, Err(LocationError::Unsupported));
        assert_eq!(current.state(), PositionState::Idle);
        assert!(current.selected_place("x").is_none());
    }

    #[tokio::test]
    async fn configured_position_is_returned() {
        let source = ConfiguredPosition::new(Some(Coordinates::new(33.4996, 126.5312)));
        assert!(source.is_supported());
        let pos = source.current_position().await.unwrap();
        assert_eq!(pos.coords, Coordinates::new(33.4996, 126.5312));
    }
}
