//! Status command handler

use anyhow::Result;
use serde_json::json;

use jisuye_core::cache::keys;
use jisuye_core::{Backend, KeyValueStore};

use crate::context::AppContext;
use crate::output::{Output, OutputFormat};

/// Show session, backend and data status
pub async fn show(ctx: &AppContext, output: &Output) -> Result<()> {
    let config = &ctx.config;
    let backend = match config.backend() {
        Backend::GitHub => "github".to_string(),
        Backend::Local { fixtures } => format!("local ({})", fixtures),
    };
    let user = ctx.auth.user().map(|u| u.login);
    let pending = ctx.cache.contains(keys::PENDING_SYNC);

    // Only load data when there is something to load it from
    let can_load = user.is_some() || matches!(config.backend(), Backend::Local { .. });
    let stores = if can_load {
        Some(ctx.open_stores(output).await?)
    } else {
        None
    };

    match output.format {
        OutputFormat::Json => {
            let data = stores.as_ref().map(|s| {
                json!({
                    "links": s.links.links().len(),
                    "categories": s.links.categories().len(),
                    "customSkins": s.skins.custom_skins().len(),
                    "currentSkin": s.skins.current_skin(),
                    "sync": s.coordinator.state(),
                })
            });
            output.json(&json!({
                "backend": backend,
                "user": user,
                "repository": config.repo_name,
                "pendingSync": pending,
                "dataDir": config.data_dir,
                "data": data,
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", user.as_deref().unwrap_or("anonymous"));
        }
        OutputFormat::Human => {
            println!("jisuye Status");
            println!("=============");
            println!();
            println!("Session:");
            println!("  Backend:    {}", backend);
            match user {
                Some(ref login) => {
                    println!("  User:       {}", login);
                    println!("  Repository: {}/{}", login, config.repo_name);
                }
                None => println!("  User:       (not logged in)"),
            }
            println!();
            println!("Storage:");
            println!("  Location:   {}", config.data_dir.display());
            println!("  Pending:    {}", if pending { "yes" } else { "no" });

            if let Some(ref stores) = stores {
                println!();
                println!("Contents:");
                println!("  Links:       {}", stores.links.links().len());
                println!("  Categories:  {}", stores.links.categories().len());
                println!("  Custom skins: {}", stores.skins.custom_skins().len());
                println!("  Skin:        {}", stores.skins.current_skin());
                println!();
                println!("Sync:");
                output.print_sync_state(&stores.coordinator.state());
            }
        }
    }

    Ok(())
}
