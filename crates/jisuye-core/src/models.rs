//! Data models for jisuye
//!
//! Defines the core data structures: Link, Category and Settings. Every
//! model keeps unknown JSON fields in a flattened `extra` map so documents
//! written by other clients survive a load/save cycle untouched.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Free-form JSON fields carried alongside the typed ones
pub type Extra = Map<String, Value>;

/// Fields a partial update may never touch
const PROTECTED_FIELDS: &[&str] = &["id", "createdAt"];

/// A bookmarked link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    /// Unique identifier
    pub id: Uuid,
    /// Display title
    #[serde(default)]
    pub title: String,
    /// The URL
    #[serde(default)]
    pub url: String,
    /// Owning category (not enforced, may dangle)
    #[serde(default)]
    pub category_id: String,
    /// When this link was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When this link was last updated
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    /// Any other fields (icon, description, sort order, ...)
    #[serde(flatten)]
    pub extra: Extra,
}

/// Input for creating a link; id and timestamps are assigned on insert
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewLink {
    pub title: String,
    pub url: String,
    pub category_id: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NewLink {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        category_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            category_id: category_id.into(),
            extra: Extra::new(),
        }
    }
}

impl Link {
    /// Materialize a new link with a fresh id and timestamps
    pub fn create(input: NewLink) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            url: input.url,
            category_id: input.category_id,
            created_at: now,
            updated_at: now,
            extra: input.extra,
        }
    }

    /// Shallow-merge a patch into this link and bump `updated_at`
    pub fn apply_patch(&mut self, patch: &Extra) -> Result<()> {
        let mut merged: Link = merge_patch(self, patch)?;
        merged.updated_at = Utc::now();
        *self = merged;
        Ok(())
    }

    /// Whether this link belongs to the given category
    pub fn belongs_to(&self, category_id: &Uuid) -> bool {
        self.category_id == category_id.to_string()
    }
}

/// A category grouping links
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// When this category was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    /// When this category was last updated
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Input for creating a category
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    #[serde(flatten)]
    pub extra: Extra,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: Extra::new(),
        }
    }
}

impl Category {
    /// Materialize a new category with a fresh id and timestamps
    pub fn create(input: NewCategory) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            created_at: now,
            updated_at: now,
            extra: input.extra,
        }
    }

    /// Shallow-merge a patch into this category and bump `updated_at`
    pub fn apply_patch(&mut self, patch: &Extra) -> Result<()> {
        let mut merged: Category = merge_patch(self, patch)?;
        merged.updated_at = Utc::now();
        *self = merged;
        Ok(())
    }
}

/// A search engine offered by the search box
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchEngine {
    #[serde(default)]
    pub name: String,
    /// Query URL template
    #[serde(default)]
    pub url: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Per-user site settings (singleton)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub site_name: String,
    pub site_description: String,
    pub language: String,
    pub show_search: bool,
    pub show_categories: bool,
    pub show_icons: bool,
    pub search_engines: Vec<SearchEngine>,
    pub default_search_engine: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            site_name: "我的导航".to_string(),
            site_description: "个人收藏的实用网站导航".to_string(),
            language: "zh-CN".to_string(),
            show_search: true,
            show_categories: true,
            show_icons: true,
            search_engines: Vec::new(),
            default_search_engine: None,
            extra: Extra::new(),
        }
    }
}

impl Settings {
    /// Shallow merge: top-level keys in the patch replace existing ones
    pub fn merged(&self, patch: &Extra) -> Result<Settings> {
        merge_patch(self, patch)
    }
}

/// Serialize `entity`, overlay the patch's top-level keys and read it back
///
/// `id` and `createdAt` are never overwritten.
pub fn merge_patch<T>(entity: &T, patch: &Extra) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut object = match serde_json::to_value(entity)? {
        Value::Object(map) => map,
        other => {
            return Err(Error::InvalidRequest(format!(
                "cannot merge a patch into non-object value {}",
                other
            )))
        }
    };

    for (key, value) in patch {
        if PROTECTED_FIELDS.contains(&key.as_str()) {
            continue;
        }
        object.insert(key.clone(), value.clone());
    }

    Ok(serde_json::from_value(Value::Object(object))?)
}

/// Convert `key=value` style pairs into a patch, parsing values as JSON
/// where possible and falling back to plain strings
pub fn patch_from_pairs<I, K, V>(pairs: I) -> Extra
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(key, raw)| {
            let raw = raw.as_ref();
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            (key.into(), value)
        })
        .collect()
}

/// Like [`patch_from_pairs`], but typed against the entity being patched
///
/// A value that parses as JSON keeps its type only when the entity accepts
/// it for that key; otherwise the raw text is used as a string. So
/// `title=2024` stays the string `"2024"` while `showIcons=false` becomes a
/// bool and `sortOrder=3` a number.
pub fn patch_for<T, I, K, V>(entity: &T, pairs: I) -> Extra
where
    T: Serialize + DeserializeOwned,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: AsRef<str>,
{
    let mut patch = Extra::new();
    for (key, raw) in pairs {
        let key = key.into();
        let raw = raw.as_ref();
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(Value::String(_)) | Err(_) => Value::String(raw.to_string()),
            Ok(typed) => {
                let trial = Extra::from_iter([(key.clone(), typed.clone())]);
                if merge_patch(entity, &trial).is_ok() {
                    typed
                } else {
                    Value::String(raw.to_string())
                }
            }
        };
        patch.insert(key, value);
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> Extra {
        match value {
            Value::Object(map) => map,
            _ => panic!("patch must be an object"),
        }
    }

    #[test]
    fn test_link_create_assigns_id_and_timestamps() {
        let link = Link::create(NewLink::new("Example", "https://example.com", "cat1"));
        assert_eq!(link.title, "Example");
        assert_eq!(link.category_id, "cat1");
        assert_eq!(link.created_at, link.updated_at);
        assert_eq!(link.id.get_version_num(), 4);
    }

    #[test]
    fn test_link_wire_format_is_camel_case() {
        let link = Link::create(NewLink::new("Example", "https://example.com", "cat1"));
        let value = serde_json::to_value(&link).unwrap();
        assert!(value.get("categoryId").is_some());
        assert!(value.get("createdAt").is_some());
        assert!(value.get("category_id").is_none());
    }

    #[test]
    fn test_link_preserves_unknown_fields() {
        let raw = json!({
            "id": "5f0c6a4e-2a7f-4c1b-9d59-1a2b3c4d5e6f",
            "title": "Rust",
            "url": "https://rust-lang.org",
            "categoryId": "cat1",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z",
            "icon": "https://rust-lang.org/favicon.ico",
            "sort": 3
        });
        let link: Link = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(link.extra.get("sort"), Some(&json!(3)));
        assert_eq!(serde_json::to_value(&link).unwrap(), raw);
    }

    #[test]
    fn test_link_patch_is_shallow_and_protects_identity() {
        let mut link = Link::create(NewLink::new("Old", "https://old.example", "cat1"));
        let id = link.id;
        let created = link.created_at;
        std::thread::sleep(std::time::Duration::from_millis(5));

        link.apply_patch(&patch(json!({
            "title": "New",
            "id": "00000000-0000-4000-8000-000000000000",
            "createdAt": "2000-01-01T00:00:00Z",
            "icon": "star"
        })))
        .unwrap();

        assert_eq!(link.title, "New");
        assert_eq!(link.url, "https://old.example");
        assert_eq!(link.id, id);
        assert_eq!(link.created_at, created);
        assert!(link.updated_at > created);
        assert_eq!(link.extra.get("icon"), Some(&json!("star")));
    }

    #[test]
    fn test_link_belongs_to() {
        let category = Category::create(NewCategory::new("Dev"));
        let link = Link::create(NewLink::new(
            "Docs",
            "https://docs.rs",
            category.id.to_string(),
        ));
        assert!(link.belongs_to(&category.id));
        assert!(!link.belongs_to(&Uuid::new_v4()));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.site_name, "我的导航");
        assert_eq!(settings.language, "zh-CN");
        assert!(settings.show_search && settings.show_categories && settings.show_icons);
        assert!(settings.search_engines.is_empty());
    }

    #[test]
    fn test_settings_partial_document_fills_defaults() {
        let settings: Settings = serde_json::from_value(json!({
            "siteName": "Work",
            "theme": "compact"
        }))
        .unwrap();
        assert_eq!(settings.site_name, "Work");
        assert_eq!(settings.language, "zh-CN");
        assert_eq!(settings.extra.get("theme"), Some(&json!("compact")));
    }

    #[test]
    fn test_settings_merge_is_shallow() {
        let mut settings = Settings::default();
        settings.search_engines = vec![SearchEngine {
            name: "Google".into(),
            url: "https://google.com/search?q=".into(),
            extra: Extra::new(),
        }];

        let merged = settings
            .merged(&patch(json!({ "showIcons": false, "searchEngines": [] })))
            .unwrap();

        assert!(!merged.show_icons);
        assert!(merged.search_engines.is_empty());
        assert_eq!(merged.site_name, settings.site_name);
    }

    #[test]
    fn test_patch_from_pairs() {
        let patch = patch_from_pairs(vec![
            ("showSearch", "false"),
            ("siteName", "My Links"),
            ("order", "2"),
        ]);
        assert_eq!(patch.get("showSearch"), Some(&json!(false)));
        assert_eq!(patch.get("siteName"), Some(&json!("My Links")));
        assert_eq!(patch.get("order"), Some(&json!(2)));
    }

    #[test]
    fn test_patch_for_keeps_string_fields_as_text() {
        let link = Link::create(NewLink::new("Example", "https://example.com", "cat1"));
        let patch = patch_for(
            &link,
            [("title", "2024"), ("categoryId", "true"), ("sortOrder", "3"), ("note", "null")],
        );
        assert_eq!(patch["title"], json!("2024"));
        assert_eq!(patch["categoryId"], json!("true"));
        assert_eq!(patch["sortOrder"], json!(3));

        let mut updated = link.clone();
        updated.apply_patch(&patch).unwrap();
        assert_eq!(updated.title, "2024");
        assert_eq!(updated.category_id, "true");
    }

    #[test]
    fn test_patch_for_settings() {
        let settings = Settings::default();
        let patch = patch_for(
            &settings,
            [("siteName", "123"), ("showIcons", "false"), ("defaultSearchEngine", "42")],
        );
        assert_eq!(patch["siteName"], json!("123"));
        assert_eq!(patch["showIcons"], json!(false));
        assert_eq!(patch["defaultSearchEngine"], json!("42"));

        let merged = settings.merged(&patch).unwrap();
        assert_eq!(merged.site_name, "123");
        assert!(!merged.show_icons);
        assert_eq!(merged.default_search_engine.as_deref(), Some("42"));

        // A bool field still rejects text that is not a bool
        let patch = patch_for(&settings, [("showIcons", "sometimes")]);
        assert!(settings.merged(&patch).is_err());
    }
}
