//! Links and categories

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use super::{decode_or_default, read_through, ChangeNotifier, RemoteHandle, RemoteSync};
use crate::cache::{keys, read_json, write_json, KeyValueStore};
use crate::error::{Error, Result};
use crate::models::{Category, Extra, Link, NewCategory, NewLink};
use crate::remote::DocumentPath;

#[derive(Debug, Default)]
struct LinksState {
    links: Vec<Link>,
    categories: Vec<Category>,
    links_loaded: bool,
    categories_loaded: bool,
}

impl LinksState {
    fn require_links(&self) -> Result<()> {
        if self.links_loaded {
            Ok(())
        } else {
            Err(Error::NotLoaded("links"))
        }
    }

    fn require_categories(&self) -> Result<()> {
        if self.categories_loaded {
            Ok(())
        } else {
            Err(Error::NotLoaded("categories"))
        }
    }
}

/// Result of a cascading category delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDeletion {
    pub category_removed: bool,
    pub links_removed: usize,
}

/// Owns the link and category collections
pub struct LinksStore {
    state: Mutex<LinksState>,
    cache: Arc<dyn KeyValueStore>,
    remote: RemoteHandle,
    notifier: ChangeNotifier,
}

impl LinksStore {
    pub fn new(cache: Arc<dyn KeyValueStore>, remote: RemoteHandle, notifier: ChangeNotifier) -> Self {
        Self {
            state: Mutex::new(LinksState::default()),
            cache,
            remote,
            notifier,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LinksState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load links and categories from cache or remote
    ///
    /// Each collection is committed on its own: a failed categories read
    /// does not discard links that were served from the cache. The first
    /// error is still returned, and the collection it belongs to stays
    /// unloaded so it cannot be edited or pushed.
    pub async fn fetch(&self) -> Result<()> {
        let (links_loaded, categories_loaded) = {
            let state = self.lock();
            (state.links_loaded, state.categories_loaded)
        };

        let links: Result<Vec<Link>> = read_through(
            &self.remote,
            self.cache.as_ref(),
            keys::CACHED_LINKS,
            DocumentPath::Links,
            links_loaded,
            decode_or_default,
        )
        .await;
        let categories: Result<Vec<Category>> = read_through(
            &self.remote,
            self.cache.as_ref(),
            keys::CACHED_CATEGORIES,
            DocumentPath::Categories,
            categories_loaded,
            decode_or_default,
        )
        .await;

        let mut state = self.lock();
        let links = links.map(|links| {
            state.links = links;
            state.links_loaded = true;
        });
        let categories = categories.map(|categories| {
            state.categories = categories;
            state.categories_loaded = true;
        });
        debug!(
            "Loaded {} links in {} categories",
            state.links.len(),
            state.categories.len()
        );
        links.and(categories)
    }

    /// Hydrate from the durable cache only
    ///
    /// Only the collections found in the cache count as loaded. Returns
    /// `false` when neither is cached.
    pub fn restore_from_cache(&self) -> Result<bool> {
        let links: Option<Vec<Link>> = read_json(self.cache.as_ref(), keys::CACHED_LINKS)?;
        let categories: Option<Vec<Category>> =
            read_json(self.cache.as_ref(), keys::CACHED_CATEGORIES)?;
        if links.is_none() && categories.is_none() {
            return Ok(false);
        }

        let mut state = self.lock();
        if let Some(links) = links {
            state.links = links;
            state.links_loaded = true;
        }
        if let Some(categories) = categories {
            state.categories = categories;
            state.categories_loaded = true;
        }
        Ok(true)
    }

    /// Both collections are loaded
    pub fn is_loaded(&self) -> bool {
        let state = self.lock();
        state.links_loaded && state.categories_loaded
    }

    pub fn links(&self) -> Vec<Link> {
        self.lock().links.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock().categories.clone()
    }

    pub fn link(&self, id: &Uuid) -> Option<Link> {
        self.lock().links.iter().find(|l| l.id == *id).cloned()
    }

    pub fn category(&self, id: &Uuid) -> Option<Category> {
        self.lock().categories.iter().find(|c| c.id == *id).cloned()
    }

    pub fn links_in_category(&self, category_id: &Uuid) -> Vec<Link> {
        self.lock()
            .links
            .iter()
            .filter(|l| l.belongs_to(category_id))
            .cloned()
            .collect()
    }

    pub fn add_link(&self, input: NewLink) -> Result<Link> {
        let link = Link::create(input);
        {
            let mut state = self.lock();
            state.require_links()?;
            state.links.push(link.clone());
            write_json(self.cache.as_ref(), keys::CACHED_LINKS, &state.links)?;
        }
        debug!("Added link {} ({})", link.id, link.title);
        self.notifier.notify();
        Ok(link)
    }

    /// Shallow-merge `patch` into a link; `None` when the id is unknown
    pub fn update_link(&self, id: &Uuid, patch: &Extra) -> Result<Option<Link>> {
        let updated = {
            let mut state = self.lock();
            state.require_links()?;
            let Some(link) = state.links.iter_mut().find(|l| l.id == *id) else {
                debug!("update_link: {} not found", id);
                return Ok(None);
            };
            link.apply_patch(patch)?;
            let updated = link.clone();
            write_json(self.cache.as_ref(), keys::CACHED_LINKS, &state.links)?;
            updated
        };
        self.notifier.notify();
        Ok(Some(updated))
    }

    /// Remove a link; returns whether anything matched
    pub fn delete_link(&self, id: &Uuid) -> Result<bool> {
        let removed = {
            let mut state = self.lock();
            state.require_links()?;
            let before = state.links.len();
            state.links.retain(|l| l.id != *id);
            write_json(self.cache.as_ref(), keys::CACHED_LINKS, &state.links)?;
            before != state.links.len()
        };
        self.notifier.notify();
        Ok(removed)
    }

    pub fn add_category(&self, input: NewCategory) -> Result<Category> {
        let category = Category::create(input);
        {
            let mut state = self.lock();
            state.require_categories()?;
            state.categories.push(category.clone());
            write_json(self.cache.as_ref(), keys::CACHED_CATEGORIES, &state.categories)?;
        }
        debug!("Added category {} ({})", category.id, category.name);
        self.notifier.notify();
        Ok(category)
    }

    pub fn update_category(&self, id: &Uuid, patch: &Extra) -> Result<Option<Category>> {
        let updated = {
            let mut state = self.lock();
            state.require_categories()?;
            let Some(category) = state.categories.iter_mut().find(|c| c.id == *id) else {
                debug!("update_category: {} not found", id);
                return Ok(None);
            };
            category.apply_patch(patch)?;
            let updated = category.clone();
            write_json(self.cache.as_ref(), keys::CACHED_CATEGORIES, &state.categories)?;
            updated
        };
        self.notifier.notify();
        Ok(Some(updated))
    }

    /// Remove a category and every link that references it
    pub fn delete_category(&self, id: &Uuid) -> Result<CategoryDeletion> {
        let deletion = {
            let mut state = self.lock();
            state.require_categories()?;
            state.require_links()?;
            let categories_before = state.categories.len();
            let links_before = state.links.len();

            state.categories.retain(|c| c.id != *id);
            state.links.retain(|l| !l.belongs_to(id));

            write_json(self.cache.as_ref(), keys::CACHED_CATEGORIES, &state.categories)?;
            write_json(self.cache.as_ref(), keys::CACHED_LINKS, &state.links)?;

            CategoryDeletion {
                category_removed: categories_before != state.categories.len(),
                links_removed: links_before - state.links.len(),
            }
        };
        info!(
            "Deleted category {} ({} links removed)",
            id, deletion.links_removed
        );
        self.notifier.notify();
        Ok(deletion)
    }

    /// Push the loaded collections, then refresh the cache
    ///
    /// A collection that was never loaded has no local edits and is not
    /// written, so it cannot replace the remote document with an empty one.
    pub async fn synchronize_to_remote(&self) -> Result<()> {
        let store = self.remote.require()?;
        let (links, categories) = {
            let state = self.lock();
            (
                state
                    .links_loaded
                    .then(|| serde_json::to_value(&state.links))
                    .transpose()?,
                state
                    .categories_loaded
                    .then(|| serde_json::to_value(&state.categories))
                    .transpose()?,
            )
        };

        match links {
            Some(links) => {
                store.put(DocumentPath::Links, &links, "Update links").await?;
                write_json(self.cache.as_ref(), keys::CACHED_LINKS, &links)?;
            }
            None => debug!("links never loaded; not pushed"),
        }
        match categories {
            Some(categories) => {
                store
                    .put(DocumentPath::Categories, &categories, "Update categories")
                    .await?;
                write_json(self.cache.as_ref(), keys::CACHED_CATEGORIES, &categories)?;
            }
            None => debug!("categories never loaded; not pushed"),
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSync for LinksStore {
    fn name(&self) -> &'static str {
        "links"
    }

    async fn fetch(&self) -> Result<()> {
        LinksStore::fetch(self).await
    }

    async fn synchronize_to_remote(&self) -> Result<()> {
        LinksStore::synchronize_to_remote(self).await
    }
}
