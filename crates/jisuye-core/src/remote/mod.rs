//! Remote document store
//!
//! A path-addressed JSON blob store with an optimistic-concurrency token per
//! document. Two backends implement [`DocumentStore`]:
//!
//! - [`GitHubDocumentStore`]: a private repository owned by the user,
//!   addressed through the GitHub contents API (token = blob SHA)
//! - [`LocalDocumentStore`]: a development store seeded from fixtures whose
//!   writes only live in an injected [`DocumentCache`]
//!
//! The composition root picks one and hands it to the domain stores as an
//! `Arc<dyn DocumentStore>`.

mod github;
mod local;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

pub(crate) use github::fetch_user;
pub use github::{GitHubDocumentStore, GitHubUser};
pub use local::{fallback_document, CacheStatus, DocumentCache, FixtureSource, LocalDocumentStore};

/// Logical document locations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentPath {
    Links,
    Categories,
    Settings,
    Skins,
}

impl DocumentPath {
    pub const ALL: [DocumentPath; 4] = [
        DocumentPath::Links,
        DocumentPath::Categories,
        DocumentPath::Settings,
        DocumentPath::Skins,
    ];

    /// Repository-relative path
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentPath::Links => "data/links.json",
            DocumentPath::Categories => "data/categories.json",
            DocumentPath::Settings => "config/settings.json",
            DocumentPath::Skins => "config/skins.json",
        }
    }

    /// Bare file name, used by flat fixture layouts
    pub fn file_name(&self) -> &'static str {
        match self {
            DocumentPath::Links => "links.json",
            DocumentPath::Categories => "categories.json",
            DocumentPath::Settings => "settings.json",
            DocumentPath::Skins => "skins.json",
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optimistic-concurrency token of one stored document version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document together with the token of the version that was read
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub content: T,
    pub version: VersionToken,
}

/// A path-addressed JSON document store
///
/// `write` is the explicit concurrency primitive: pass the token you read
/// (or `None` to create) and get the new token back, or
/// [`Error::Conflict`](crate::Error::Conflict) when the document moved on.
/// Retry policy belongs to the caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short name for logs
    fn describe(&self) -> String;

    /// Read a document; a missing path is `Ok(None)`
    async fn fetch(&self, path: DocumentPath) -> Result<Option<Versioned<Value>>>;

    /// Current version token, `None` when the document does not exist
    async fn current_version(&self, path: DocumentPath) -> Result<Option<VersionToken>>;

    /// Write a document against an expected version
    async fn write(
        &self,
        path: DocumentPath,
        content: &Value,
        message: &str,
        expected: Option<VersionToken>,
    ) -> Result<VersionToken>;

    /// Read just the content
    async fn get(&self, path: DocumentPath) -> Result<Option<Value>> {
        Ok(self.fetch(path).await?.map(|doc| doc.content))
    }

    /// Last-write-wins put: re-read the current token, then write once
    ///
    /// Creation when the path does not exist yet. A writer slipping in
    /// between the two calls surfaces as a conflict; no retry happens here.
    async fn put(&self, path: DocumentPath, content: &Value, message: &str) -> Result<VersionToken> {
        let expected = self.current_version(path).await?;
        debug!(
            "put {} on {} (expected version: {:?})",
            path,
            self.describe(),
            expected
        );
        self.write(path, content, message, expected).await
    }
}

/// Shared handle to whichever backend the composition root selected
pub type SharedDocumentStore = Arc<dyn DocumentStore>;
