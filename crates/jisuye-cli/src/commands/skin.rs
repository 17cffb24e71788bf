//! Skin command handlers

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::json;

use jisuye_core::{DataStores, Skin, StyleSheet};

use crate::commands::parse_fields;
use crate::editor::{confirm, edit_json};
use crate::output::{Output, OutputFormat};

pub fn list(stores: &DataStores, output: &Output) -> Result<()> {
    output.print_skins(&stores.skins.all_skins(), &stores.skins.current_skin());
    Ok(())
}

/// Activate a skin and render it to the theme file
pub fn apply(stores: &DataStores, id: String, theme_path: &Path, output: &Output) -> Result<()> {
    let mut sheet = StyleSheet::new();
    let skin = stores.skins.apply_skin(&id, &mut sheet)?;
    write_theme(theme_path, &sheet)?;

    output.success(&format!("Applied skin {} ({})", skin.id, skin.name));
    output.message(&format!("Theme written to {}", theme_path.display()));
    Ok(())
}

/// Add a custom skin from a JSON file, or author one in $EDITOR
pub fn add(stores: &DataStores, file: Option<PathBuf>, output: &Output) -> Result<()> {
    let skin: Skin = match file {
        Some(ref path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read skin file: {:?}", path))?;
            serde_json::from_str(&text).context("Skin is not valid JSON")?
        }
        None => {
            let template = Skin {
                id: String::new(),
                name: "My skin".into(),
                is_default: false,
                is_system: false,
                ..stores.skins.current_skin_data()
            };
            edit_json(&serde_json::to_string_pretty(&template)?)?
        }
    };

    let skin = stores.skins.add_custom_skin(skin)?;

    output.success(&format!("Added custom skin: {}", skin.id));
    Ok(())
}

/// Change fields of a custom skin (e.g. name=Night)
pub fn update(stores: &DataStores, id: String, fields: Vec<String>, output: &Output) -> Result<()> {
    if stores.skins.is_builtin(&id) {
        bail!("'{}' is a built-in skin and cannot be changed", id);
    }
    let Some(current) = stores.skins.custom_skins().into_iter().find(|s| s.id == id) else {
        bail!("No custom skin with id '{}'", id);
    };
    let patch = parse_fields(&current, &fields)?;
    match stores.skins.update_custom_skin(&id, &patch)? {
        Some(skin) => {
            output.success(&format!("Updated skin: {} ({})", skin.name, skin.id));
            Ok(())
        }
        None => bail!("No custom skin with id '{}'", id),
    }
}

/// Delete a custom skin
///
/// Returns whether anything changed.
pub fn delete(stores: &DataStores, id: String, yes: bool, output: &Output) -> Result<bool> {
    if stores.skins.is_builtin(&id) {
        bail!("'{}' is a built-in skin and cannot be deleted", id);
    }
    if !stores.skins.custom_skins().iter().any(|s| s.id == id) {
        bail!("No custom skin with id '{}'", id);
    }

    if !yes && output.should_prompt() && !confirm(&format!("Delete skin {}?", id))? {
        println!("Cancelled.");
        return Ok(false);
    }

    stores.skins.delete_custom_skin(&id)?;
    output.success(&format!("Deleted skin: {}", id));
    Ok(true)
}

/// Print the active skin as CSS
pub async fn css(stores: &DataStores, output: &Output) -> Result<()> {
    let mut sheet = StyleSheet::new();
    let skin = stores.skins.load_saved_skin(&mut sheet).await?;

    match output.format {
        OutputFormat::Json => output.json(&json!({
            "skin": skin.id,
            "variables": skin.variables,
        })),
        _ => print!("{}", sheet.to_css()),
    }
    Ok(())
}

fn write_theme(path: &Path, sheet: &StyleSheet) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    std::fs::write(path, sheet.to_css())
        .with_context(|| format!("Failed to write theme file: {:?}", path))
}
