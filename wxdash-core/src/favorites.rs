//! Saved places, capped at [`FAVORITES_LIMIT`] and persisted in durable storage.
//!
//! Every successful mutation is written through to storage first and only then
//! published to subscribers, so a failed write leaves the visible list untouched.
//! Other processes sharing the same storage are picked up by [`FavoritesStore::sync`]
//! or the polling task from [`FavoritesStore::watch_durable`].

use chrono::{SubsecRound, Utc};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    error::FavoriteError,
    model::{FavoritePlace, SelectedPlace, place_id},
    storage::KeyValueStorage,
};

pub mod record;

pub const FAVORITES_LIMIT: usize = 6;
pub const FAVORITES_KEY: &str = "wxdash:favorites:v1";

pub type Snapshot = Arc<Vec<FavoritePlace>>;

#[derive(Debug)]
pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStorage>,
    state: watch::Sender<Snapshot>,
    // Held across read-modify-persist so same-process writers never interleave.
    write_lock: Mutex<()>,
    last_raw: Mutex<Option<String>>,
}

impl FavoritesStore {
    /// Open the store, loading whatever the durable record currently holds.
    pub fn open(storage: Arc<dyn KeyValueStorage>) -> Self {
        let raw = read_raw(storage.as_ref());
        let items = raw.as_deref().map(record::decode).unwrap_or_default();
        let (state, _) = watch::channel(Arc::new(items));

        Self {
            storage,
            state,
            write_lock: Mutex::new(()),
            last_raw: Mutex::new(raw),
        }
    }

    /// Current snapshot, oldest first.
    pub fn list(&self) -> Vec<FavoritePlace> {
        (**self.state.borrow()).clone()
    }

    pub fn limit(&self) -> usize {
        FAVORITES_LIMIT
    }

    pub fn get(&self, id: &str) -> Option<FavoritePlace> {
        self.state.borrow().iter().find(|f| f.id == id).cloned()
    }

    pub fn is_favorite(&self, lat: f64, lon: f64) -> bool {
        let id = place_id(lat, lon);
        self.state.borrow().iter().any(|f| f.id == id)
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.state.subscribe()
    }

    /// Save a new place.
    ///
    /// Fails with `Storage` for a blank name, `Duplicate` if the derived id is already
    /// saved and `Limit` when the list is full. Duplicates are checked first, so
    /// re-adding a saved place never reports `Limit`.
    pub fn add(&self, place: &SelectedPlace) -> Result<FavoritePlace, FavoriteError> {
        let place_name = place.place_name.trim();
        if place_name.is_empty() {
            return Err(FavoriteError::Storage);
        }

        let _guard = self.write_lock.lock();
        let current = self.snapshot();

        let id = place_id(place.lat, place.lon);
        if current.iter().any(|f| f.id == id) {
            return Err(FavoriteError::Duplicate);
        }
        if current.len() >= FAVORITES_LIMIT {
            return Err(FavoriteError::Limit);
        }

        let item = FavoritePlace {
            id,
            place_name: place_name.to_string(),
            lat: place.lat,
            lon: place.lon,
            // Durable records keep millisecond precision.
            created_at: Utc::now().trunc_subsecs(3),
        };

        let mut next = (*current).clone();
        next.push(item.clone());
        self.commit(next)?;

        tracing::info!("Added favorite {} ({})", item.place_name, item.id);
        Ok(item)
    }

    /// Remove by id. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> Result<(), FavoriteError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot();

        if !current.iter().any(|f| f.id == id) {
            return Ok(());
        }

        let next: Vec<_> = current.iter().filter(|f| f.id != id).cloned().collect();
        self.commit(next)?;

        tracing::info!("Removed favorite {}", id);
        Ok(())
    }

    /// Change the display name, keeping id, coordinates and creation time.
    ///
    /// Fails with `Empty` for a blank name and `Storage` for an unknown id.
    pub fn rename(&self, id: &str, new_name: &str) -> Result<FavoritePlace, FavoriteError> {
        let place_name = new_name.trim();
        if place_name.is_empty() {
            return Err(FavoriteError::Empty);
        }

        let _guard = self.write_lock.lock();
        let current = self.snapshot();

        let Some(existing) = current.iter().find(|f| f.id == id) else {
            return Err(FavoriteError::Storage);
        };
        let renamed = FavoritePlace {
            place_name: place_name.to_string(),
            ..existing.clone()
        };

        let next: Vec<_> = current
            .iter()
            .map(|f| if f.id == id { renamed.clone() } else { f.clone() })
            .collect();
        self.commit(next)?;

        Ok(renamed)
    }

    /// Reload from durable storage and publish if the list changed.
    ///
    /// Returns whether subscribers were notified.
    pub fn sync(&self) -> bool {
        let _guard = self.write_lock.lock();
        let raw = read_raw(self.storage.as_ref());
        let items = raw.as_deref().map(record::decode).unwrap_or_default();
        *self.last_raw.lock() = raw;

        self.state.send_if_modified(|current| {
            if **current == items {
                false
            } else {
                *current = Arc::new(items);
                true
            }
        })
    }

    /// Poll durable storage and [`sync`](Self::sync) whenever the raw record changes.
    ///
    /// Picks up writes from other processes sharing the same storage. The task
    /// ends when `cancel` fires.
    pub fn watch_durable(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let raw = read_raw(store.storage.as_ref());
                let changed = *store.last_raw.lock() != raw;
                if changed && store.sync() {
                    tracing::debug!("Favorites changed in durable storage");
                }
            }
        })
    }

    fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.state.borrow())
    }

    /// Persist `next`, then publish it. Nothing is published if the write fails.
    fn commit(&self, next: Vec<FavoritePlace>) -> Result<(), FavoriteError> {
        let raw = record::encode(&next).map_err(|e| {
            tracing::warn!("Failed to encode favorites: {}", e);
            FavoriteError::Storage
        })?;

        self.storage.set_item(FAVORITES_KEY, &raw).map_err(|e| {
            tracing::warn!("Failed to persist favorites: {}", e);
            FavoriteError::Storage
        })?;

        *self.last_raw.lock() = Some(raw);
        self.state.send_replace(Arc::new(next));
        Ok(())
    }
}

fn read_raw(storage: &dyn KeyValueStorage) -> Option<String> {
    match storage.get_item(FAVORITES_KEY) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Failed to read favorites: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};

    fn place(name: &str, lat: f64, lon: f64) -> SelectedPlace {
        SelectedPlace {
            place_name: name.to_string(),
            lat,
            lon,
        }
    }

    fn memory_store() -> (Arc<MemoryStorage>, FavoritesStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = FavoritesStore::open(storage.clone());
        (storage, store)
    }

    fn fill(store: &FavoritesStore, n: usize) {
        for i in 0..n {
            store.add(&place(&format!("Place {i}"), 37.0 + i as f64, 127.0)).unwrap();
        }
    }

    #[test]
    fn add_trims_and_persists() {
        let (storage, store) = memory_store();

        let item = store.add(&place("  Gangnam  ", 37.4979, 127.0276)).unwrap();
        assert_eq!(item.place_name, "Gangnam");
        assert_eq!(item.id, "37.49790,127.02760");
        assert!(store.is_favorite(37.4979, 127.0276));
        assert!(store.is_favorite(37.497900001, 127.027600001));

        let raw = storage.get_item(FAVORITES_KEY).unwrap().unwrap();
        assert_eq!(record::decode(&raw), vec![item]);
    }

    #[test]
    fn added_item_matches_durable_record() {
        let (storage, store) = memory_store();
        let item = store.add(&place("Mapo", 37.5663, 126.9019)).unwrap();

        assert_eq!(item.created_at.timestamp_subsec_nanos() % 1_000_000, 0);
        assert!(!store.sync());
        assert_eq!(FavoritesStore::open(storage).list(), vec![item]);
    }

    #[test]
    fn blank_name_fails_with_storage() {
        let (_, store) = memory_store();
        assert_eq!(store.add(&place("   ", 1.0, 2.0)), Err(FavoriteError::Storage));
        assert!(store.list().is_empty());
    }

    #[test]
    fn duplicate_add_is_rejected_without_change() {
        let (_, store) = memory_store();
        store.add(&place("Seoul", 37.5665, 126.978)).unwrap();

        let err = store.add(&place("Seoul again", 37.5665, 126.978)).unwrap_err();
        assert_eq!(err, FavoriteError::Duplicate);
        assert_eq!(store.list().len(), 1);
        assert_eq!(store.list()[0].place_name, "Seoul");
    }

    #[test]
    fn seventh_add_hits_the_limit() {
        let (_, store) = memory_store();
        fill(&store, FAVORITES_LIMIT);
        let before = store.list();

        let err = store.add(&place("Seventh", 10.0, 10.0)).unwrap_err();
        assert_eq!(err, FavoriteError::Limit);
        assert_eq!(store.list(), before);
    }

    #[test]
    fn duplicate_is_checked_before_limit() {
        let (_, store) = memory_store();
        fill(&store, FAVORITES_LIMIT);

        let err = store.add(&place("Again", 37.0, 127.0)).unwrap_err();
        assert_eq!(err, FavoriteError::Duplicate);
    }

    #[test]
    fn remove_frees_a_slot() {
        let (_, store) = memory_store();
        fill(&store, FAVORITES_LIMIT);
        assert_eq!(store.add(&place("Seventh", 10.0, 10.0)), Err(FavoriteError::Limit));

        let first = store.list()[0].id.clone();
        store.remove(&first).unwrap();
        assert_eq!(store.list().len(), FAVORITES_LIMIT - 1);

        let seventh = store.add(&place("Seventh", 10.0, 10.0)).unwrap();
        assert_eq!(store.list().len(), FAVORITES_LIMIT);
        assert_eq!(store.list().last(), Some(&seventh));
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let (_, store) = memory_store();
        fill(&store, 2);
        let before = store.list();
        let mut rx = store.subscribe();

        store.remove("0.00000,0.00000").unwrap();
        assert_eq!(store.list(), before);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn rename_keeps_identity() {
        let (_, store) = memory_store();
        let original = store.add(&place("Old", 35.1796, 129.0756)).unwrap();

        let renamed = store.rename(&original.id, "  Busan ").unwrap();
        assert_eq!(renamed.place_name, "Busan");
        assert_eq!(renamed.id, original.id);
        assert_eq!(renamed.lat, original.lat);
        assert_eq!(renamed.lon, original.lon);
        assert_eq!(renamed.created_at, original.created_at);
        assert_eq!(store.get(&original.id), Some(renamed));
    }

    #[test]
    fn rename_to_blank_is_rejected() {
        let (_, store) = memory_store();
        let item = store.add(&place("Jeju", 33.4996, 126.5312)).unwrap();

        assert_eq!(store.rename(&item.id, " \t "), Err(FavoriteError::Empty));
        assert_eq!(store.get(&item.id).unwrap().place_name, "Jeju");
    }

    #[test]
    fn rename_unknown_id_fails_with_storage() {
        let (_, store) = memory_store();
        assert_eq!(store.rename("nope", "Name"), Err(FavoriteError::Storage));
    }

    #[test]
    fn failed_write_commits_nothing() {
        let (storage, store) = memory_store();
        let kept = store.add(&place("Kept", 1.0, 1.0)).unwrap();
        let mut rx = store.subscribe();
        storage.fail_writes(true);

        assert_eq!(store.add(&place("Lost", 2.0, 2.0)), Err(FavoriteError::Storage));
        assert_eq!(store.rename(&kept.id, "Renamed"), Err(FavoriteError::Storage));
        assert_eq!(store.remove(&kept.id), Err(FavoriteError::Storage));

        assert_eq!(store.list(), vec![kept]);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn mutations_notify_subscribers() {
        let (_, store) = memory_store();
        let mut rx = store.subscribe();

        let item = store.add(&place("A", 1.0, 1.0)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update().clone(), vec![item.clone()]);

        store.rename(&item.id, "B").unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update()[0].place_name, "B");

        store.remove(&item.id).unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_empty());
    }

    #[test]
    fn malformed_record_loads_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(FAVORITES_KEY, "[{\"id\": ").unwrap();

        let store = FavoritesStore::open(storage);
        assert!(store.list().is_empty());
        store.add(&place("Fresh", 1.0, 1.0)).unwrap();
        assert_eq!(store.list().len(), 1);
    }

    #[test]
    fn sync_picks_up_another_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let tab_a = FavoritesStore::open(Arc::new(FileStorage::new(&path)));
        let tab_b = FavoritesStore::open(Arc::new(FileStorage::new(&path)));
        let mut rx_b = tab_b.subscribe();

        let item = tab_a.add(&place("Incheon", 37.4563, 126.7052)).unwrap();
        assert!(tab_b.list().is_empty());

        assert!(tab_b.sync());
        assert!(rx_b.has_changed().unwrap());
        assert_eq!(tab_b.list(), vec![item]);

        assert!(!tab_b.sync());
    }

    #[test]
    fn cross_writer_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let tab_a = FavoritesStore::open(Arc::new(FileStorage::new(&path)));
        let tab_b = FavoritesStore::open(Arc::new(FileStorage::new(&path)));

        tab_a.add(&place("From A", 1.0, 1.0)).unwrap();
        tab_b.add(&place("From B", 2.0, 2.0)).unwrap();

        tab_a.sync();
        let names: Vec<_> = tab_a.list().into_iter().map(|f| f.place_name).collect();
        assert_eq!(names, vec!["From B"]);
    }

    #[tokio::test]
    async fn watch_durable_publishes_external_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let watcher = Arc::new(FavoritesStore::open(Arc::new(FileStorage::new(&path))));
        let writer = FavoritesStore::open(Arc::new(FileStorage::new(&path)));

        let cancel = CancellationToken::new();
        let task = watcher.watch_durable(Duration::from_millis(10), cancel.clone());
        let mut rx = watcher.subscribe();

        writer.add(&place("Daegu", 35.8714, 128.6014)).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("watcher should observe the write")
            .unwrap();
        assert_eq!(rx.borrow()[0].place_name, "Daegu");

        cancel.cancel();
        task.await.unwrap();
    }
}
