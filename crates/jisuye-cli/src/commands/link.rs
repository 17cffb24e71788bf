//! Link command handlers

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use jisuye_core::{DataStores, Link, LinksStore, NewLink};

use super::{parse_fields, resolve_id};
use crate::editor::confirm;
use crate::output::Output;

/// Create a new link in a category
pub fn add(
    stores: &DataStores,
    title: String,
    url: String,
    category: String,
    fields: Vec<String>,
    output: &Output,
) -> Result<()> {
    let category_id = resolve_category(&stores.links, &category)?;
    let mut input = NewLink::new(title, url, category_id.to_string());
    input.extra = parse_fields(&Link::create(input.clone()), &fields)?;

    let link = stores.links.add_link(input).context("Failed to create link")?;

    output.success(&format!("Created link: {}", link.id));
    output.print_link(&link, stores.links.category(&category_id).as_ref());
    Ok(())
}

/// List links, optionally only those of one category
pub fn list(stores: &DataStores, category: Option<String>, output: &Output) -> Result<()> {
    let links = match category {
        Some(ref c) => {
            let id = resolve_category(&stores.links, c)?;
            stores.links.links_in_category(&id)
        }
        None => stores.links.links(),
    };

    output.print_links(&links);
    Ok(())
}

/// Shallow-merge `key=value` fields into a link
pub fn update(stores: &DataStores, id: String, fields: Vec<String>, output: &Output) -> Result<()> {
    let uuid = resolve_link(&stores.links, &id)?;
    let Some(current) = stores.links.link(&uuid) else {
        bail!("Link not found: {}", id);
    };
    let mut patch = parse_fields(&current, &fields)?;
    if patch.is_empty() {
        bail!("Nothing to update. Pass fields as key=value.");
    }
    if let Some(value) = patch.get("categoryId").and_then(|v| v.as_str()).map(str::to_string) {
        let category_id = resolve_category(&stores.links, &value)?;
        patch.insert("categoryId".into(), category_id.to_string().into());
    }

    let Some(link) = stores
        .links
        .update_link(&uuid, &patch)
        .context("Failed to update link")?
    else {
        bail!("Link not found: {}", id);
    };

    output.success("Link updated");
    let category = link
        .category_id
        .parse::<Uuid>()
        .ok()
        .and_then(|c| stores.links.category(&c));
    output.print_link(&link, category.as_ref());
    Ok(())
}

/// Delete a link
///
/// Returns whether anything changed.
pub fn delete(stores: &DataStores, id: String, yes: bool, output: &Output) -> Result<bool> {
    let uuid = resolve_link(&stores.links, &id)?;
    let link = stores
        .links
        .link(&uuid)
        .ok_or_else(|| anyhow::anyhow!("Link not found: {}", id))?;

    if !yes && output.should_prompt() {
        println!("Delete link: {} - {}", link.id, link.title);
        if !confirm("Are you sure?")? {
            println!("Cancelled.");
            return Ok(false);
        }
    }

    stores.links.delete_link(&uuid).context("Failed to delete link")?;
    output.success(&format!("Deleted link: {}", uuid));
    Ok(true)
}

pub(crate) fn resolve_link(links: &LinksStore, input: &str) -> Result<Uuid> {
    resolve_id(
        input,
        links.links().into_iter().map(|l| (l.id, l.title)),
        "link",
    )
}

/// A category by exact name, full id or unique id prefix
pub(crate) fn resolve_category(links: &LinksStore, input: &str) -> Result<Uuid> {
    let categories = links.categories();
    if let Some(category) = categories.iter().find(|c| c.name == input) {
        return Ok(category.id);
    }
    resolve_id(
        input,
        categories.into_iter().map(|c| (c.id, c.name)),
        "category",
    )
}
