//! Skin selection and custom skins

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{read_through, ChangeNotifier, RemoteHandle, RemoteSync};
use crate::cache::{keys, read_json, write_json, KeyValueStore};
use crate::error::{Error, Result};
use crate::models::{merge_patch, Extra};
use crate::remote::DocumentPath;
use crate::skin::{self, apply_variables, builtin_skins, Skin, SkinsDocument, SkinsEnvelope, StyleSink, DEFAULT_SKIN_ID};

#[derive(Debug)]
struct SkinState {
    current_skin: String,
    custom_skins: Vec<Skin>,
    loaded: bool,
}

impl SkinState {
    fn require_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(Error::NotLoaded("custom skins"))
        }
    }
}

impl Default for SkinState {
    fn default() -> Self {
        Self {
            current_skin: DEFAULT_SKIN_ID.to_string(),
            custom_skins: Vec::new(),
            loaded: false,
        }
    }
}

/// Owns the active skin and the user's custom skins
///
/// Built-in skins need no session. Only custom skins are read from and
/// written to the remote store.
pub struct SkinStore {
    state: Mutex<SkinState>,
    cache: Arc<dyn KeyValueStore>,
    remote: RemoteHandle,
    notifier: ChangeNotifier,
}

impl SkinStore {
    pub fn new(cache: Arc<dyn KeyValueStore>, remote: RemoteHandle, notifier: ChangeNotifier) -> Self {
        Self {
            state: Mutex::new(SkinState::default()),
            cache,
            remote,
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SkinState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load custom skins
    ///
    /// Without a session only the cached custom skins (if any) are used and
    /// no error is raised. With nothing cached the custom skins stay
    /// unloaded and read-only.
    pub async fn fetch_custom_skins(&self) -> Result<()> {
        if !self.remote.is_connected() {
            let cached: Option<Vec<Skin>> = read_json(self.cache.as_ref(), keys::CACHED_CUSTOM_SKINS)?;
            let mut state = self.lock();
            if let Some(skins) = cached {
                state.custom_skins = skins;
                state.loaded = true;
            }
            debug!("No session; custom skins not fetched");
            return Ok(());
        }

        let loaded = self.lock().loaded;
        let skins: Vec<Skin> = read_through(
            &self.remote,
            self.cache.as_ref(),
            keys::CACHED_CUSTOM_SKINS,
            DocumentPath::Skins,
            loaded,
            decode_skins,
        )
        .await?;

        let mut state = self.lock();
        state.custom_skins = skins;
        state.loaded = true;
        Ok(())
    }

    pub fn restore_from_cache(&self) -> Result<bool> {
        let skins: Option<Vec<Skin>> = read_json(self.cache.as_ref(), keys::CACHED_CUSTOM_SKINS)?;
        let current = self.cache.get(keys::CURRENT_SKIN)?;
        if skins.is_none() && current.is_none() {
            return Ok(false);
        }

        let mut state = self.lock();
        if let Some(skins) = skins {
            state.custom_skins = skins;
            state.loaded = true;
        }
        if let Some(current) = current {
            state.current_skin = current;
        }
        Ok(true)
    }

    /// Built-in skins followed by custom ones
    pub fn all_skins(&self) -> Vec<Skin> {
        let mut skins = builtin_skins();
        skins.extend(self.lock().custom_skins.iter().cloned());
        skins
    }

    pub fn custom_skins(&self) -> Vec<Skin> {
        self.lock().custom_skins.clone()
    }

    pub fn current_skin(&self) -> String {
        self.lock().current_skin.clone()
    }

    /// The active skin, or the first available one if the id is stale
    pub fn current_skin_data(&self) -> Skin {
        let current = self.current_skin();
        let mut skins = self.all_skins();
        match skins.iter().position(|s| s.id == current) {
            Some(index) => skins.swap_remove(index),
            None => skins.swap_remove(0),
        }
    }

    pub fn is_builtin(&self, id: &str) -> bool {
        skin::is_builtin(id)
    }

    /// Add a custom skin, assigning an id when none is given
    pub fn add_custom_skin(&self, mut skin: Skin) -> Result<Skin> {
        if skin.id.is_empty() {
            skin.id = Uuid::new_v4().to_string();
        }
        skin.is_default = false;
        skin.is_system = false;

        {
            let mut state = self.lock();
            state.require_loaded()?;
            if skin::is_builtin(&skin.id) || state.custom_skins.iter().any(|s| s.id == skin.id) {
                return Err(Error::InvalidRequest(format!(
                    "skin id '{}' is already taken",
                    skin.id
                )));
            }
            state.custom_skins.push(skin.clone());
            write_json(self.cache.as_ref(), keys::CACHED_CUSTOM_SKINS, &state.custom_skins)?;
        }
        info!("Added custom skin {}", skin.id);
        self.notifier.notify();
        Ok(skin)
    }

    /// Shallow-merge a patch into a custom skin; `None` when unknown
    pub fn update_custom_skin(&self, id: &str, patch: &Extra) -> Result<Option<Skin>> {
        let updated = {
            let mut state = self.lock();
            state.require_loaded()?;
            let Some(skin) = state.custom_skins.iter_mut().find(|s| s.id == id) else {
                return Ok(None);
            };
            *skin = merge_patch(&*skin, patch)?;
            let updated = skin.clone();
            write_json(self.cache.as_ref(), keys::CACHED_CUSTOM_SKINS, &state.custom_skins)?;
            updated
        };
        self.notifier.notify();
        Ok(Some(updated))
    }

    pub fn delete_custom_skin(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut state = self.lock();
            state.require_loaded()?;
            let before = state.custom_skins.len();
            state.custom_skins.retain(|s| s.id != id);
            write_json(self.cache.as_ref(), keys::CACHED_CUSTOM_SKINS, &state.custom_skins)?;
            before != state.custom_skins.len()
        };
        self.notifier.notify();
        Ok(removed)
    }

    /// Make `id` the active skin and write its variables to `sink`
    pub fn apply_skin(&self, id: &str, sink: &mut dyn StyleSink) -> Result<Skin> {
        let Some(skin) = self.all_skins().into_iter().find(|s| s.id == id) else {
            warn!("Skin {} not found", id);
            return Err(Error::NotFound(format!("skin '{}'", id)));
        };

        self.lock().current_skin = skin.id.clone();
        apply_variables(&skin, sink);
        self.cache.set(keys::CURRENT_SKIN, &skin.id)?;
        debug!("Applied skin {}", skin.id);
        Ok(skin)
    }

    /// Re-apply the skin recorded in the cache, or the first available one
    pub async fn load_saved_skin(&self, sink: &mut dyn StyleSink) -> Result<Skin> {
        let saved = self.cache.get(keys::CURRENT_SKIN)?;

        if let Some(ref id) = saved {
            if !skin::is_builtin(id) {
                if let Err(e) = self.fetch_custom_skins().await {
                    warn!("Failed to fetch custom skins: {}", e);
                }
            }
        }

        let skins = self.all_skins();
        let target = match saved {
            Some(id) if skins.iter().any(|s| s.id == id) => id,
            _ => skins
                .first()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| DEFAULT_SKIN_ID.to_string()),
        };
        self.apply_skin(&target, sink)
    }

    /// Push custom skins as a `{"skins": [...]}` envelope
    ///
    /// Nothing happens when the custom skins were never loaded.
    pub async fn synchronize_to_remote(&self) -> Result<()> {
        let skins = {
            let state = self.lock();
            if !state.loaded {
                debug!("custom skins never loaded; not pushed");
                return Ok(());
            }
            state.custom_skins.clone()
        };

        let store = self.remote.require()?;
        let envelope = serde_json::to_value(SkinsEnvelope {
            skins: skins.clone(),
        })?;
        store
            .put(DocumentPath::Skins, &envelope, "Update custom skins")
            .await?;
        write_json(self.cache.as_ref(), keys::CACHED_CUSTOM_SKINS, &skins)
    }
}

/// Accept either stored shape and keep only the skin list
fn decode_skins(content: Option<Value>) -> Result<Vec<Skin>> {
    match content {
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(value) => {
            let document: SkinsDocument = serde_json::from_value(value)?;
            Ok(document.migrate().skins)
        }
    }
}

#[async_trait]
impl RemoteSync for SkinStore {
    fn name(&self) -> &'static str {
        "skins"
    }

    async fn fetch(&self) -> Result<()> {
        self.fetch_custom_skins().await
    }

    async fn synchronize_to_remote(&self) -> Result<()> {
        SkinStore::synchronize_to_remote(self).await
    }
}
