//! Composition root
//!
//! Turns the configuration into concrete collaborators: the durable cache,
//! the auth store, the remote backend and finally the wired domain stores.

use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use jisuye_core::remote::{DocumentCache, FixtureSource};
use jisuye_core::{
    AuthStore, Backend, Config, DataStores, FileKeyValueStore, GitHubDocumentStore, GuardDecision,
    GuardMode, KeyValueStore, LoadSource, LocalDocumentStore, MemoryKeyValueStore, OAuthConfig,
    RemoteHandle, RepositoryGuard,
};

use crate::output::Output;

/// Everything a command may need, built once per process
pub struct AppContext {
    pub config: Config,
    pub cache: Arc<dyn KeyValueStore>,
    pub session: Arc<dyn KeyValueStore>,
    pub auth: AuthStore,
}

/// The selected backend and how the guard should treat it
pub struct Remote {
    pub handle: RemoteHandle,
    pub mode: GuardMode,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let cache: Arc<dyn KeyValueStore> = Arc::new(
            FileKeyValueStore::open(config.cache_dir())
                .with_context(|| format!("Failed to open cache at {:?}", config.cache_dir()))?,
        );
        let session: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());

        let auth = AuthStore::new(OAuthConfig::from_config(&config), cache.clone(), session.clone())
            .context("Failed to build auth store")?;
        if auth.check_auth() {
            debug!("Restored session for {:?}", auth.user().map(|u| u.login));
        }

        Ok(Self {
            config,
            cache,
            session,
            auth,
        })
    }

    /// Build the remote document store the configuration asks for
    pub fn remote(&self) -> Result<Remote> {
        match self.config.backend() {
            Backend::Local { fixtures } => {
                info!("Using local development backend ({})", fixtures);
                let store = Arc::new(LocalDocumentStore::new(
                    FixtureSource::parse(&fixtures),
                    Arc::new(DocumentCache::new()),
                ));
                Ok(Remote {
                    handle: RemoteHandle::connected(store),
                    mode: GuardMode::Dev,
                })
            }
            Backend::GitHub => match self.github_store()? {
                Some(store) => Ok(Remote {
                    handle: RemoteHandle::connected(store.clone()),
                    mode: GuardMode::GitHub(store),
                }),
                None => Ok(Remote {
                    handle: RemoteHandle::disconnected(),
                    mode: GuardMode::Anonymous,
                }),
            },
        }
    }

    /// The logged-in user's data repository, if there is a session
    pub fn github_store(&self) -> Result<Option<Arc<GitHubDocumentStore>>> {
        let (Some(token), Some(user)) = (self.auth.access_token(), self.auth.user()) else {
            return Ok(None);
        };
        let store = GitHubDocumentStore::new(token, user.login, self.config.repo_name.clone())
            .context("Failed to build GitHub client")?
            .with_api_base(self.config.api_base_url.clone());
        Ok(Some(Arc::new(store)))
    }

    /// Run the navigation guard, then wire and load the stores
    pub async fn open_stores(&self, output: &Output) -> Result<DataStores> {
        let remote = self.remote()?;

        let guard = RepositoryGuard::new(self.session.clone(), remote.mode.clone());
        match guard.check(true).await {
            GuardDecision::Proceed => {}
            GuardDecision::Login => bail!("Not logged in. Run `jisuye login` first."),
            GuardDecision::Setup => {
                bail!("Data repository not found. Run `jisuye setup` to create it.")
            }
        }

        let stores = DataStores::wire(
            self.cache.clone(),
            remote.handle,
            self.config.auto_sync_interval(),
        );
        match stores.load().await {
            Ok(LoadSource::PendingCache) => {
                output.warn("Using local changes from an earlier run that were never synced");
            }
            Ok(LoadSource::Remote) => {}
            Err(e) if e.is_recoverable() => {
                // Collections that could not be loaded stay read-only
                output.warn(&format!(
                    "Could not load remote data, showing cached data only: {}",
                    e
                ));
            }
            Err(e) => return Err(e).context("Failed to load data"),
        }
        Ok(stores)
    }
}

/// Push local changes after a mutating command
///
/// A failed push is not fatal: the change is already in the local cache and
/// the pending marker makes the next run pick it up.
pub async fn push_changes(stores: &DataStores, output: &Output) {
    if let Err(e) = stores.sync().await {
        output.warn(&format!("Sync failed, changes kept locally: {}", e));
        if let Some(hint) = e.recovery_suggestion() {
            output.warn(hint);
        }
    }
}

/// Initialize logging
///
/// Level comes from JISUYE_LOG (default `warn`). With `log_file` set, logs
/// are appended to that file without colours; otherwise they go to stderr.
pub fn init_logging(config: &Config) {
    let level = std::env::var("JISUYE_LOG").unwrap_or_else(|_| "warn".to_string());
    let env_filter = EnvFilter::new(format!("jisuye_core={},jisuye_cli={}", level, level));

    match config.log_file {
        Some(ref path) => {
            let file = match OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", path, e);
                    return;
                }
            };
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(file)
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
