//! Category command handlers

use anyhow::{bail, Context, Result};

use jisuye_core::{Category, DataStores, NewCategory};

use super::link::resolve_category;
use super::parse_fields;
use crate::editor::confirm;
use crate::output::Output;

pub fn add(stores: &DataStores, name: String, fields: Vec<String>, output: &Output) -> Result<()> {
    let mut input = NewCategory::new(name);
    input.extra = parse_fields(&Category::create(input.clone()), &fields)?;

    let category = stores
        .links
        .add_category(input)
        .context("Failed to create category")?;

    output.success(&format!("Created category: {}", category.id));
    output.print_category(&category);
    Ok(())
}

/// List categories with their link counts
pub fn list(stores: &DataStores, output: &Output) -> Result<()> {
    let rows: Vec<_> = stores
        .links
        .categories()
        .into_iter()
        .map(|category| {
            let count = stores.links.links_in_category(&category.id).len();
            (category, count)
        })
        .collect();

    output.print_categories(&rows);
    Ok(())
}

pub fn update(stores: &DataStores, id: String, fields: Vec<String>, output: &Output) -> Result<()> {
    let uuid = resolve_category(&stores.links, &id)?;
    let Some(current) = stores.links.category(&uuid) else {
        bail!("Category not found: {}", id);
    };
    let patch = parse_fields(&current, &fields)?;
    if patch.is_empty() {
        bail!("Nothing to update. Pass fields as key=value.");
    }

    let Some(category) = stores
        .links
        .update_category(&uuid, &patch)
        .context("Failed to update category")?
    else {
        bail!("Category not found: {}", id);
    };

    output.success("Category updated");
    output.print_category(&category);
    Ok(())
}

/// Delete a category and every link in it
///
/// Returns whether anything changed.
pub fn delete(stores: &DataStores, id: String, yes: bool, output: &Output) -> Result<bool> {
    let uuid = resolve_category(&stores.links, &id)?;
    let category = stores
        .links
        .category(&uuid)
        .ok_or_else(|| anyhow::anyhow!("Category not found: {}", id))?;
    let doomed = stores.links.links_in_category(&uuid).len();

    if !yes && output.should_prompt() {
        println!(
            "Delete category: {} - {} ({} link(s) will be deleted too)",
            category.id, category.name, doomed
        );
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(false);
        }
    }

    let deletion = stores
        .links
        .delete_category(&uuid)
        .context("Failed to delete category")?;

    output.success(&format!(
        "Deleted category {} and {} link(s)",
        category.name, deletion.links_removed
    ));
    Ok(true)
}
