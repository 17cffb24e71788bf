//! Skins (visual themes)
//!
//! A skin is a named set of CSS custom properties. Two sources exist: the
//! built-in set compiled into the binary, and user-authored custom skins
//! stored remotely in `config/skins.json`.
//!
//! ## Persisted format
//!
//! Skins are always written as an envelope, `{"skins": [...]}`. Older
//! documents stored a bare array; [`SkinsDocument`] accepts both and
//! [`SkinsDocument::migrate`] turns either into the envelope.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Extra;

/// A visual theme
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub preview: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_system: bool,
    /// CSS variable name → value
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Envelope written to `config/skins.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkinsEnvelope {
    pub skins: Vec<Skin>,
}

/// Any accepted on-disk shape of `config/skins.json`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SkinsDocument {
    Envelope(SkinsEnvelope),
    Legacy(Vec<Skin>),
}

impl SkinsDocument {
    /// Normalize to the envelope format
    pub fn migrate(self) -> SkinsEnvelope {
        match self {
            SkinsDocument::Envelope(envelope) => envelope,
            SkinsDocument::Legacy(skins) => SkinsEnvelope { skins },
        }
    }
}

/// Receiver for applied CSS variables (the document root's live style set)
pub trait StyleSink {
    fn set_property(&mut self, name: &str, value: &str);
}

/// Ordered CSS variable map, renderable as a `:root` rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleSheet {
    properties: BTreeMap<String, String>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render as a CSS `:root { ... }` block
    pub fn to_css(&self) -> String {
        let mut css = String::from(":root {\n");
        for (name, value) in &self.properties {
            css.push_str(&format!("  {}: {};\n", name, value));
        }
        css.push_str("}\n");
        css
    }
}

impl StyleSink for StyleSheet {
    fn set_property(&mut self, name: &str, value: &str) {
        self.properties.insert(name.to_string(), value.to_string());
    }
}

/// Apply every variable of a skin to a sink
pub fn apply_variables(skin: &Skin, sink: &mut dyn StyleSink) {
    for (name, value) in &skin.variables {
        sink.set_property(name, value);
    }
}

/// Id of the skin used when nothing else is selected
pub const DEFAULT_SKIN_ID: &str = "default";

type Palette = [(&'static str, &'static str); 13];

const BUILTIN_SKINS: &[(&str, &str, &str, bool, Palette)] = &[
    (
        "default",
        "默认皮肤",
        "Default Skin",
        true,
        [
            ("--primary-color", "#409eff"),
            ("--secondary-color", "#67c23a"),
            ("--accent-color", "#e6a23c"),
            ("--bg-color", "#ffffff"),
            ("--bg-color-secondary", "#f5f7fa"),
            ("--text-color", "#303133"),
            ("--text-color-secondary", "#606266"),
            ("--text-color-placeholder", "#909399"),
            ("--border-color", "#dcdfe6"),
            ("--border-color-light", "#e4e7ed"),
            ("--shadow", "0 2px 12px 0 rgba(0, 0, 0, 0.1)"),
            ("--shadow-hover", "0 4px 16px 0 rgba(0, 0, 0, 0.15)"),
            ("--radius", "8px"),
        ],
    ),
    (
        "dark",
        "深色皮肤",
        "Dark Skin",
        false,
        [
            ("--primary-color", "#409eff"),
            ("--secondary-color", "#67c23a"),
            ("--accent-color", "#e6a23c"),
            ("--bg-color", "#1d1e1f"),
            ("--bg-color-secondary", "#141414"),
            ("--text-color", "#e5eaf3"),
            ("--text-color-secondary", "#cfd3dc"),
            ("--text-color-placeholder", "#909399"),
            ("--border-color", "#4c4d4f"),
            ("--border-color-light", "#606266"),
            ("--shadow", "0 2px 12px 0 rgba(0, 0, 0, 0.3)"),
            ("--shadow-hover", "0 4px 16px 0 rgba(0, 0, 0, 0.4)"),
            ("--radius", "8px"),
        ],
    ),
    (
        "ocean",
        "海洋皮肤",
        "Ocean Skin",
        false,
        [
            ("--primary-color", "#0077b6"),
            ("--secondary-color", "#023e8a"),
            ("--accent-color", "#00b4d8"),
            ("--bg-color", "#caf0f8"),
            ("--bg-color-secondary", "#90e0ef"),
            ("--text-color", "#03045e"),
            ("--text-color-secondary", "#0077b6"),
            ("--text-color-placeholder", "#48cae4"),
            ("--border-color", "#90e0ef"),
            ("--border-color-light", "#ade8f4"),
            ("--shadow", "0 2px 12px 0 rgba(0, 119, 182, 0.15)"),
            ("--shadow-hover", "0 4px 16px 0 rgba(0, 119, 182, 0.25)"),
            ("--radius", "8px"),
        ],
    ),
    (
        "forest",
        "森林皮肤",
        "Forest Skin",
        false,
        [
            ("--primary-color", "#386641"),
            ("--secondary-color", "#6a994e"),
            ("--accent-color", "#a7c957"),
            ("--bg-color", "#f2e8cf"),
            ("--bg-color-secondary", "#e9edc9"),
            ("--text-color", "#386641"),
            ("--text-color-secondary", "#6a994e"),
            ("--text-color-placeholder", "#a7c957"),
            ("--border-color", "#f2e8cf"),
            ("--border-color-light", "#e9edc9"),
            ("--shadow", "0 2px 12px 0 rgba(56, 102, 65, 0.15)"),
            ("--shadow-hover", "0 4px 16px 0 rgba(56, 102, 65, 0.25)"),
            ("--radius", "8px"),
        ],
    ),
    (
        "purple",
        "紫色皮肤",
        "Purple Skin",
        false,
        [
            ("--primary-color", "#7b2cbf"),
            ("--secondary-color", "#9d4edd"),
            ("--accent-color", "#c77dff"),
            ("--bg-color", "#f3e5f5"),
            ("--bg-color-secondary", "#e1bee7"),
            ("--text-color", "#3c096c"),
            ("--text-color-secondary", "#5a189a"),
            ("--text-color-placeholder", "#9d4edd"),
            ("--border-color", "#e0aa00ff"),
            ("--border-color-light", "#f3d9fa"),
            ("--shadow", "0 2px 12px 0 rgba(123, 44, 191, 0.15)"),
            ("--shadow-hover", "0 4px 16px 0 rgba(123, 44, 191, 0.25)"),
            ("--radius", "8px"),
        ],
    ),
];

/// The immutable built-in skins, in display order
pub fn builtin_skins() -> Vec<Skin> {
    BUILTIN_SKINS
        .iter()
        .map(|(id, name, name_en, is_default, palette)| Skin {
            id: id.to_string(),
            name: name.to_string(),
            name_en: name_en.to_string(),
            preview: String::new(),
            is_default: *is_default,
            is_system: true,
            variables: palette
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            extra: Extra::new(),
        })
        .collect()
}

/// Whether `id` names a built-in skin
pub fn is_builtin(id: &str) -> bool {
    BUILTIN_SKINS.iter().any(|(builtin, ..)| *builtin == id)
}
