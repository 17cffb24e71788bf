//! Domain stores
//!
//! Each store owns one slice of user data in memory, mirrors it into the
//! durable cache after every mutation and pushes full collections to the
//! remote document store when the sync coordinator asks it to.
//!
//! Stores never talk to the coordinator directly. They hold a
//! [`ChangeNotifier`], a weak link to whatever [`ChangeListener`] was wired
//! in by the composition root.

mod links;
mod settings;
mod skins;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{read_json, write_json, KeyValueStore};
use crate::error::{Error, Result};
use crate::remote::{DocumentPath, SharedDocumentStore};

pub use links::{CategoryDeletion, LinksStore};
pub use settings::SettingsStore;
pub use skins::SkinStore;

/// The remote document store for the current session, if any
#[derive(Clone, Default)]
pub struct RemoteHandle {
    store: Option<SharedDocumentStore>,
}

impl RemoteHandle {
    pub fn connected(store: SharedDocumentStore) -> Self {
        Self { store: Some(store) }
    }

    /// No session: every remote operation fails with `NotAuthenticated`
    pub fn disconnected() -> Self {
        Self { store: None }
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_some()
    }

    /// The document store, or `NotAuthenticated` when there is no session
    pub fn require(&self) -> Result<SharedDocumentStore> {
        self.store.clone().ok_or(Error::NotAuthenticated)
    }
}

impl std::fmt::Debug for RemoteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.store {
            Some(store) => write!(f, "RemoteHandle({})", store.describe()),
            None => f.write_str("RemoteHandle(disconnected)"),
        }
    }
}

/// Receives "local data changed" signals
pub trait ChangeListener: Send + Sync {
    fn mark_as_modified(&self);
}

/// Weak link from a store to its change listener
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    listener: Option<Weak<dyn ChangeListener>>,
}

impl ChangeNotifier {
    pub fn new(listener: Weak<dyn ChangeListener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    /// A notifier that goes nowhere
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        match self.listener.as_ref().and_then(Weak::upgrade) {
            Some(listener) => listener.mark_as_modified(),
            None => debug!("change notification dropped: no listener"),
        }
    }
}

/// What the sync coordinator drives on every store
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Populate from cache or remote
    async fn fetch(&self) -> Result<()>;

    /// Push the full in-memory state to the remote store
    async fn synchronize_to_remote(&self) -> Result<()>;
}

/// Shared handle to a registered store
pub type SharedRemoteSync = Arc<dyn RemoteSync>;

/// Cache-or-remote read of one document
///
/// When the store already loaded this session and the cache has the key,
/// the cached copy is returned with no remote call. Otherwise the remote
/// document is fetched, decoded and mirrored into the cache. Any remote
/// failure falls back to an existing cache entry; only when there is none
/// does the remote error propagate.
pub(crate) async fn read_through<T, F>(
    remote: &RemoteHandle,
    cache: &dyn KeyValueStore,
    key: &str,
    path: DocumentPath,
    loaded: bool,
    decode: F,
) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce(Option<Value>) -> Result<T>,
{
    if loaded {
        if let Some(cached) = read_json::<T>(cache, key)? {
            debug!("{} served from cache", path);
            return Ok(cached);
        }
    }

    let fetched = async {
        let store = remote.require()?;
        let content = store.get(path).await?;
        decode(content)
    }
    .await;

    match fetched {
        Ok(value) => {
            write_json(cache, key, &value)?;
            Ok(value)
        }
        Err(e) => match read_json::<T>(cache, key) {
            Ok(Some(cached)) => {
                warn!("Remote read of {} failed, using cache: {}", path, e);
                Ok(cached)
            }
            Ok(None) => Err(e),
            Err(cache_err) => {
                warn!("Cache fallback for {} unreadable: {}", path, cache_err);
                Err(e)
            }
        },
    }
}

/// Decode an optional JSON document, treating a missing one as `T::default()`
pub(crate) fn decode_or_default<T>(content: Option<Value>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match content {
        Some(Value::Null) | None => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}
