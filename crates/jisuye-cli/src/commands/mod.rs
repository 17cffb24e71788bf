//! Command handlers

pub mod auth;
pub mod category;
pub mod config;
pub mod link;
pub mod settings;
pub mod skin;
pub mod status;
pub mod sync;

use anyhow::{bail, Result};
use uuid::Uuid;

use serde::de::DeserializeOwned;
use serde::Serialize;

use jisuye_core::models::{patch_for, Extra};

/// Resolve a full UUID or a unique prefix against `(id, label)` candidates
pub(crate) fn resolve_id<I>(input: &str, candidates: I, kind: &str) -> Result<Uuid>
where
    I: IntoIterator<Item = (Uuid, String)>,
{
    if let Ok(uuid) = Uuid::parse_str(input) {
        return Ok(uuid);
    }

    let matches: Vec<(Uuid, String)> = candidates
        .into_iter()
        .filter(|(id, _)| id.to_string().starts_with(input))
        .collect();

    match matches.len() {
        0 => bail!("No {} found matching: {}", kind, input),
        1 => Ok(matches[0].0),
        _ => {
            eprintln!("Multiple {}s match '{}':", kind, input);
            for (id, label) in &matches {
                eprintln!("  {} - {}", id, label);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Turn `key=value` arguments into a shallow patch for `entity`
///
/// Values that parse as JSON keep their type (`true`, `3`, `[..]`) where
/// the entity accepts it; anything else is a string.
pub(crate) fn parse_fields<T>(entity: &T, fields: &[String]) -> Result<Extra>
where
    T: Serialize + DeserializeOwned,
{
    let mut pairs = Vec::with_capacity(fields.len());
    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("Expected key=value, got '{}'", field);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Empty key in '{}'", field);
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(patch_for(entity, pairs))
}
