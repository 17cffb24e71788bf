//! Settings command handlers

use anyhow::{bail, Context, Result};

use jisuye_core::DataStores;

use super::parse_fields;
use crate::output::Output;

pub fn show(stores: &DataStores, output: &Output) -> Result<()> {
    output.print_settings(&stores.settings.settings());
    Ok(())
}

/// Shallow-merge `key=value` fields (camelCase keys) into the settings
pub fn set(stores: &DataStores, fields: Vec<String>, output: &Output) -> Result<()> {
    let patch = parse_fields(&stores.settings.settings(), &fields)?;
    if patch.is_empty() {
        bail!("Nothing to set. Pass fields as key=value, e.g. siteName=Home");
    }

    let settings = stores
        .settings
        .update_settings(&patch)
        .context("Failed to update settings")?;

    output.success("Settings updated");
    output.print_settings(&settings);
    Ok(())
}
