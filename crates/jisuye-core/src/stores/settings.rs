//! Site settings

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::{decode_or_default, read_through, ChangeNotifier, RemoteHandle, RemoteSync};
use crate::cache::{keys, read_json, write_json, KeyValueStore};
use crate::error::{Error, Result};
use crate::models::{Extra, Settings};
use crate::remote::DocumentPath;

#[derive(Debug, Default)]
struct SettingsState {
    settings: Settings,
    loaded: bool,
}

/// Owns the settings singleton
pub struct SettingsStore {
    state: Mutex<SettingsState>,
    cache: Arc<dyn KeyValueStore>,
    remote: RemoteHandle,
    notifier: ChangeNotifier,
}

impl SettingsStore {
    pub fn new(cache: Arc<dyn KeyValueStore>, remote: RemoteHandle, notifier: ChangeNotifier) -> Self {
        Self {
            state: Mutex::new(SettingsState::default()),
            cache,
            remote,
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SettingsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn fetch(&self) -> Result<()> {
        let loaded = self.lock().loaded;
        let settings: Settings = read_through(
            &self.remote,
            self.cache.as_ref(),
            keys::CACHED_SETTINGS,
            DocumentPath::Settings,
            loaded,
            decode_or_default,
        )
        .await?;

        let mut state = self.lock();
        state.settings = settings;
        state.loaded = true;
        Ok(())
    }

    pub fn restore_from_cache(&self) -> Result<bool> {
        let Some(settings) = read_json::<Settings>(self.cache.as_ref(), keys::CACHED_SETTINGS)? else {
            return Ok(false);
        };
        let mut state = self.lock();
        state.settings = settings;
        state.loaded = true;
        Ok(true)
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().loaded
    }

    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }

    /// Shallow-merge `patch` over the current settings
    pub fn update_settings(&self, patch: &Extra) -> Result<Settings> {
        let updated = {
            let mut state = self.lock();
            if !state.loaded {
                return Err(Error::NotLoaded("settings"));
            }
            let merged = state.settings.merged(patch)?;
            state.settings = merged.clone();
            write_json(self.cache.as_ref(), keys::CACHED_SETTINGS, &state.settings)?;
            merged
        };
        debug!("Settings updated ({} keys)", patch.len());
        self.notifier.notify();
        Ok(updated)
    }

    /// Push the settings; never-loaded defaults are not written
    pub async fn synchronize_to_remote(&self) -> Result<()> {
        let store = self.remote.require()?;
        let settings = {
            let state = self.lock();
            if !state.loaded {
                debug!("settings never loaded; not pushed");
                return Ok(());
            }
            serde_json::to_value(&state.settings)?
        };
        store
            .put(DocumentPath::Settings, &settings, "Update settings")
            .await?;
        write_json(self.cache.as_ref(), keys::CACHED_SETTINGS, &settings)
    }
}

#[async_trait]
impl RemoteSync for SettingsStore {
    fn name(&self) -> &'static str {
        "settings"
    }

    async fn fetch(&self) -> Result<()> {
        SettingsStore::fetch(self).await
    }

    async fn synchronize_to_remote(&self) -> Result<()> {
        SettingsStore::synchronize_to_remote(self).await
    }
}
