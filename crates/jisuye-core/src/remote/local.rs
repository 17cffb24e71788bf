//! Local development document store
//!
//! Reads seed documents from a fixture directory or an HTTP base URL and
//! keeps every write in an injected [`DocumentCache`]. Nothing is persisted:
//! dropping the cache loses all edits.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{DocumentPath, DocumentStore, VersionToken, Versioned};
use crate::error::{Error, Result};
use crate::models::Settings;
use crate::skin::SkinsEnvelope;

/// Where seed documents come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixtureSource {
    /// A directory holding `links.json`, `categories.json`, ...
    Directory(PathBuf),
    /// A base URL serving the same files
    Http(String),
}

impl FixtureSource {
    /// Interpret a configured location: `http(s)://` is a URL, anything
    /// else a directory
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            FixtureSource::Http(location.trim_end_matches('/').to_string())
        } else {
            FixtureSource::Directory(PathBuf::from(location))
        }
    }
}

#[derive(Debug, Clone)]
struct CachedDocument {
    content: Value,
    revision: u64,
}

/// Snapshot of what a [`DocumentCache`] currently holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub size: usize,
    pub keys: Vec<String>,
}

/// In-memory document cache owned by whoever builds the local store
#[derive(Debug, Default)]
pub struct DocumentCache {
    documents: Mutex<HashMap<DocumentPath, CachedDocument>>,
}

impl DocumentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DocumentPath, CachedDocument>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop every cached document
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn status(&self) -> CacheStatus {
        let documents = self.lock();
        let mut keys: Vec<String> = documents.keys().map(|p| p.as_str().to_string()).collect();
        keys.sort();
        CacheStatus {
            size: documents.len(),
            keys,
        }
    }

    fn get(&self, path: DocumentPath) -> Option<CachedDocument> {
        self.lock().get(&path).cloned()
    }

    fn seed(&self, path: DocumentPath, content: Value) -> CachedDocument {
        self.lock()
            .entry(path)
            .or_insert(CachedDocument {
                content,
                revision: 0,
            })
            .clone()
    }

    /// Store a write, checking the expected revision under the lock
    fn store(
        &self,
        path: DocumentPath,
        content: Value,
        expected: Option<&VersionToken>,
    ) -> Result<u64> {
        let mut documents = self.lock();
        let current = documents.get(&path).map(|doc| doc.revision);

        let accepted = match (current, expected) {
            (None, _) => true,
            (Some(current), Some(expected)) => revision_token(current) == *expected,
            (Some(_), None) => false,
        };
        if !accepted {
            return Err(Error::Conflict {
                path: path.as_str().to_string(),
            });
        }

        let revision = current.map_or(1, |r| r + 1);
        documents.insert(path, CachedDocument { content, revision });
        Ok(revision)
    }
}

fn revision_token(revision: u64) -> VersionToken {
    VersionToken(format!("rev-{}", revision))
}

/// Default content served when a fixture cannot be read
pub fn fallback_document(path: DocumentPath) -> Result<Value> {
    Ok(match path {
        DocumentPath::Links | DocumentPath::Categories => json!([]),
        DocumentPath::Settings => serde_json::to_value(Settings::default())?,
        DocumentPath::Skins => serde_json::to_value(SkinsEnvelope::default())?,
    })
}

/// Non-durable store for local development
pub struct LocalDocumentStore {
    fixtures: FixtureSource,
    cache: Arc<DocumentCache>,
    client: Client,
}

impl LocalDocumentStore {
    pub fn new(fixtures: FixtureSource, cache: Arc<DocumentCache>) -> Self {
        info!("Using local document store ({:?})", fixtures);
        Self {
            fixtures,
            cache,
            client: Client::new(),
        }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    async fn read_fixture(&self, path: DocumentPath) -> Result<Value> {
        match &self.fixtures {
            FixtureSource::Directory(dir) => {
                let file = dir.join(path.file_name());
                let raw = tokio::fs::read_to_string(&file).await?;
                Ok(serde_json::from_str(&raw)?)
            }
            FixtureSource::Http(base) => {
                let url = format!("{}/{}", base, path.file_name());
                let response = self.client.get(&url).send().await?;
                if !response.status().is_success() {
                    return Err(Error::remote_status(
                        response.status().as_u16(),
                        format!("fixture not found: {}", url),
                    ));
                }
                Ok(response.json().await?)
            }
        }
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn describe(&self) -> String {
        "local".to_string()
    }

    async fn fetch(&self, path: DocumentPath) -> Result<Option<Versioned<Value>>> {
        if let Some(doc) = self.cache.get(path) {
            return Ok(Some(Versioned {
                content: doc.content,
                version: revision_token(doc.revision),
            }));
        }

        match self.read_fixture(path).await {
            Ok(content) => {
                let doc = self.cache.seed(path, content);
                Ok(Some(Versioned {
                    content: doc.content,
                    version: revision_token(doc.revision),
                }))
            }
            Err(e) => {
                warn!("Failed to read fixture for {}: {}", path, e);
                Ok(Some(Versioned {
                    content: fallback_document(path)?,
                    version: revision_token(0),
                }))
            }
        }
    }

    async fn current_version(&self, path: DocumentPath) -> Result<Option<VersionToken>> {
        Ok(self.cache.get(path).map(|doc| revision_token(doc.revision)))
    }

    async fn write(
        &self,
        path: DocumentPath,
        content: &Value,
        message: &str,
        expected: Option<VersionToken>,
    ) -> Result<VersionToken> {
        let revision = self.cache.store(path, content.clone(), expected.as_ref())?;
        debug!("[local] {}: {} (rev {})", message, path, revision);
        Ok(revision_token(revision))
    }
}
