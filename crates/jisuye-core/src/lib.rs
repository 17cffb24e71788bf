//! jisuye Core Library
//!
//! This crate provides the core functionality for jisuye, a personal
//! bookmark navigation page whose links, categories, settings and skins live
//! as JSON documents in a private GitHub repository.
//!
//! # Architecture
//!
//! - **Remote document store**: source of truth, one JSON file per document
//! - **Local cache**: durable mirror of every collection, serves reads when
//!   the remote is unreachable
//! - **Deferred sync**: mutations are local; a coordinator pushes full
//!   collections on a timer or on demand
//!
//! # Quick Start
//!
//! ```text
//! let stores = DataStores::wire(cache, RemoteHandle::connected(remote), interval);
//! stores.load().await?;
//!
//! // Add a link (local only, marks the coordinator dirty)
//! stores.links.add_link(NewLink::new("Example", "https://example.com", category))?;
//!
//! // Push everything now
//! stores.sync().await?;
//! ```
//!
//! # Modules
//!
//! - `app`: wires stores, coordinator and the pending-sync marker
//! - `auth`: GitHub OAuth login with PKCE
//! - `cache`: durable and session key/value stores
//! - `config`: application configuration
//! - `guard`: login and first-run repository checks
//! - `models`: links, categories and settings
//! - `pkce`: random strings and S256 challenges
//! - `remote`: GitHub and local development document stores
//! - `skin`: built-in skins and CSS variable application
//! - `stores`: the domain stores
//! - `sync`: the sync coordinator

pub mod app;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod pkce;
pub mod remote;
pub mod skin;
pub mod stores;
pub mod sync;

pub use app::{DataStores, LoadSource};
pub use auth::{parse_callback_url, AuthStore, OAuthConfig};
pub use cache::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
pub use config::{Backend, Config};
pub use error::{Error, Result};
pub use guard::{GuardDecision, GuardMode, RepositoryGuard};
pub use models::{Category, Link, NewCategory, NewLink, SearchEngine, Settings};
pub use remote::{DocumentPath, DocumentStore, GitHubDocumentStore, GitHubUser, LocalDocumentStore};
pub use skin::{Skin, StyleSheet, StyleSink};
pub use stores::{LinksStore, RemoteHandle, SettingsStore, SkinStore};
pub use sync::{SyncCoordinator, SyncOutcome, SyncState, SyncStatus};
