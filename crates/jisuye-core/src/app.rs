//! Store wiring
//!
//! Builds the three domain stores around one cache and one remote handle,
//! registers them with a coordinator in push order (settings, links, skins)
//! and carries the durable `pending_sync` marker for processes that exit
//! before the auto-sync timer could fire.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{keys, KeyValueStore};
use crate::error::Result;
use crate::stores::{LinksStore, RemoteHandle, SettingsStore, SkinStore};
use crate::sync::{SyncCoordinator, SyncOutcome};

/// Where the initial state came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Fresh remote read (with per-store cache fallback)
    Remote,
    /// Unsynced local edits from an earlier run
    PendingCache,
}

/// The wired domain stores and their coordinator
pub struct DataStores {
    pub coordinator: Arc<SyncCoordinator>,
    pub settings: Arc<SettingsStore>,
    pub links: Arc<LinksStore>,
    pub skins: Arc<SkinStore>,
    cache: Arc<dyn KeyValueStore>,
}

impl DataStores {
    pub fn wire(cache: Arc<dyn KeyValueStore>, remote: RemoteHandle, interval: Duration) -> Self {
        let coordinator = SyncCoordinator::new(interval);

        let settings = Arc::new(SettingsStore::new(
            cache.clone(),
            remote.clone(),
            coordinator.notifier(),
        ));
        let links = Arc::new(LinksStore::new(
            cache.clone(),
            remote.clone(),
            coordinator.notifier(),
        ));
        let skins = Arc::new(SkinStore::new(cache.clone(), remote, coordinator.notifier()));

        coordinator.register(settings.clone());
        coordinator.register(links.clone());
        coordinator.register(skins.clone());

        Self {
            coordinator,
            settings,
            links,
            skins,
            cache,
        }
    }

    /// Whether an earlier run left edits that never reached the remote
    pub fn has_pending_sync(&self) -> bool {
        self.cache.contains(keys::PENDING_SYNC)
    }

    /// Load initial state
    ///
    /// With a pending marker the cache holds newer data than the remote, so
    /// the stores are hydrated from it and the coordinator is marked dirty.
    /// Collections missing from the cache are still read from the remote;
    /// until that succeeds they stay unloaded and are never pushed.
    pub async fn load(&self) -> Result<LoadSource> {
        if self.has_pending_sync() {
            info!("Unsynced changes from a previous run; loading from cache");
            self.settings.restore_from_cache()?;
            self.links.restore_from_cache()?;
            self.skins.restore_from_cache()?;
            self.coordinator.mark_as_modified();
            self.coordinator.load_from_remote().await?;
            return Ok(LoadSource::PendingCache);
        }

        self.coordinator.load_from_remote().await?;
        Ok(LoadSource::Remote)
    }

    /// Sync now, keeping the durable marker in step with the outcome
    pub async fn sync(&self) -> Result<SyncOutcome> {
        match self.coordinator.sync_to_remote().await {
            Ok(SyncOutcome::Synced) => {
                if !self.coordinator.has_unsynced_changes() {
                    self.cache.remove(keys::PENDING_SYNC)?;
                }
                Ok(SyncOutcome::Synced)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Sync failed; local changes kept for the next run: {}", e);
                self.cache.set(keys::PENDING_SYNC, "true")?;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{write_json, MemoryKeyValueStore};
    use crate::models::{patch_from_pairs, Category, Link, NewLink, Settings};
    use crate::remote::{
        DocumentCache, DocumentPath, DocumentStore, FixtureSource, LocalDocumentStore, VersionToken,
        Versioned,
    };
    use crate::skin::Skin;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use crate::stores::test_support::offline_remote;
    use crate::sync::DEFAULT_AUTO_SYNC_INTERVAL;
    use crate::Error;
    use tempfile::TempDir;

    /// Remote that fails every read but still accepts writes
    struct ReadFailingStore {
        inner: Arc<LocalDocumentStore>,
    }

    #[async_trait]
    impl DocumentStore for ReadFailingStore {
        fn describe(&self) -> String {
            "read-failing".into()
        }

        async fn fetch(&self, _path: DocumentPath) -> Result<Option<Versioned<Value>>> {
            Err(Error::remote_status(502, "bad gateway"))
        }

        async fn current_version(&self, path: DocumentPath) -> Result<Option<VersionToken>> {
            self.inner.current_version(path).await
        }

        async fn write(
            &self,
            path: DocumentPath,
            content: &Value,
            message: &str,
            expected: Option<VersionToken>,
        ) -> Result<VersionToken> {
            self.inner.write(path, content, message, expected).await
        }
    }

    fn local_store(dir: &TempDir) -> Arc<LocalDocumentStore> {
        Arc::new(LocalDocumentStore::new(
            FixtureSource::Directory(dir.path().to_path_buf()),
            Arc::new(DocumentCache::new()),
        ))
    }

    /// Cache contents of a session that loaded an empty remote
    fn seed_empty_session(cache: &dyn KeyValueStore) {
        write_json(cache, keys::CACHED_SETTINGS, &Settings::default()).unwrap();
        write_json(cache, keys::CACHED_LINKS, &Vec::<Link>::new()).unwrap();
        write_json(cache, keys::CACHED_CATEGORIES, &Vec::<Category>::new()).unwrap();
        write_json(cache, keys::CACHED_CUSTOM_SKINS, &Vec::<Skin>::new()).unwrap();
    }

    #[tokio::test]
    async fn test_failed_sync_sets_marker_and_next_run_restores() {
        let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        seed_empty_session(cache.as_ref());

        // First run: remote unreachable, cache carries the session
        let first = DataStores::wire(cache.clone(), offline_remote(), DEFAULT_AUTO_SYNC_INTERVAL);
        assert_eq!(first.load().await.unwrap(), LoadSource::Remote);
        first
            .links
            .add_link(NewLink::new("Offline edit", "https://example.com", "cat1"))
            .unwrap();
        assert!(first.sync().await.is_err());
        assert!(first.has_pending_sync());

        // Next run: remote is back
        let dir = TempDir::new().unwrap();
        let remote = local_store(&dir);
        let second = DataStores::wire(
            cache.clone(),
            RemoteHandle::connected(remote.clone()),
            DEFAULT_AUTO_SYNC_INTERVAL,
        );

        assert_eq!(second.load().await.unwrap(), LoadSource::PendingCache);
        assert_eq!(second.links.links()[0].title, "Offline edit");
        assert!(second.coordinator.has_unsynced_changes());

        assert_eq!(second.sync().await.unwrap(), SyncOutcome::Synced);
        assert!(!second.has_pending_sync());
        let pushed = remote.get(DocumentPath::Links).await.unwrap().unwrap();
        assert_eq!(pushed[0]["title"], "Offline edit");
    }

    #[tokio::test]
    async fn test_failed_load_never_overwrites_remote() {
        let dir = TempDir::new().unwrap();
        let inner = local_store(&dir);
        let existing = json!([
            { "id": "5f0c6a4e-2a7f-4c1b-9d59-1a2b3c4d5e61", "title": "One", "url": "https://1.example", "categoryId": "c" },
            { "id": "5f0c6a4e-2a7f-4c1b-9d59-1a2b3c4d5e62", "title": "Two", "url": "https://2.example", "categoryId": "c" },
            { "id": "5f0c6a4e-2a7f-4c1b-9d59-1a2b3c4d5e63", "title": "Three", "url": "https://3.example", "categoryId": "c" }
        ]);
        inner.put(DocumentPath::Links, &existing, "seed").await.unwrap();

        let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(ReadFailingStore { inner: inner.clone() });
        let stores = DataStores::wire(cache.clone(), RemoteHandle::connected(remote), DEFAULT_AUTO_SYNC_INTERVAL);

        let err = stores.load().await.unwrap_err();
        assert!(err.is_recoverable());

        let err = stores
            .links
            .add_link(NewLink::new("New", "https://new.example", "c"))
            .unwrap_err();
        assert!(matches!(err, Error::NotLoaded(_)));
        assert!(stores
            .settings
            .update_settings(&patch_from_pairs([("siteName", "Lost")]))
            .is_err());
        assert!(!stores.coordinator.has_unsynced_changes());

        assert_eq!(stores.sync().await.unwrap(), SyncOutcome::Synced);
        assert_eq!(inner.get(DocumentPath::Links).await.unwrap(), Some(existing));
        assert_eq!(inner.current_version(DocumentPath::Settings).await.unwrap(), None);
        assert!(cache.get(keys::CACHED_LINKS).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_run_reads_collections_missing_from_cache() {
        let dir = TempDir::new().unwrap();
        let remote = local_store(&dir);
        let categories = json!([{ "id": "5f0c6a4e-2a7f-4c1b-9d59-1a2b3c4d5e6f", "name": "Remote" }]);
        remote.put(DocumentPath::Categories, &categories, "seed").await.unwrap();

        // Only links survived the earlier run
        let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        write_json(cache.as_ref(), keys::CACHED_LINKS, &Vec::<Link>::new()).unwrap();
        cache.set(keys::PENDING_SYNC, "true").unwrap();

        let stores = DataStores::wire(cache, RemoteHandle::connected(remote.clone()), DEFAULT_AUTO_SYNC_INTERVAL);
        assert_eq!(stores.load().await.unwrap(), LoadSource::PendingCache);
        assert_eq!(stores.links.categories()[0].name, "Remote");

        stores.sync().await.unwrap();
        let pushed = remote.get(DocumentPath::Categories).await.unwrap().unwrap();
        assert_eq!(pushed[0]["name"], "Remote");
    }

    #[tokio::test]
    async fn test_load_without_session_fails() {
        let cache: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let stores = DataStores::wire(cache, RemoteHandle::disconnected(), DEFAULT_AUTO_SYNC_INTERVAL);
        let err = stores.load().await.unwrap_err();
        assert!(matches!(err, Error::NotAuthenticated));
        assert!(!stores.coordinator.state().initialized);
    }
}
