//! Login, logout, identity and first-run setup

use anyhow::{bail, Context, Result};
use serde_json::json;

use jisuye_core::{parse_callback_url, Backend};

use crate::context::AppContext;
use crate::editor::prompt_line;
use crate::output::{Output, OutputFormat};

/// Run the OAuth login in this process
///
/// The authorize URL is opened in the browser; the user pastes back the URL
/// the provider redirected to, which carries `code` and `state`.
pub async fn login(ctx: &AppContext, no_browser: bool, output: &Output) -> Result<()> {
    if matches!(ctx.config.backend(), Backend::Local { .. }) {
        output.message("Development backend in use; no login needed.");
        return Ok(());
    }

    let url = ctx.auth.begin_login().context("Failed to start login")?;

    println!("Open this URL to authorize jisuye:");
    println!();
    println!("  {}", url);
    println!();
    if !no_browser {
        if let Err(e) = open::that(url.as_str()) {
            output.warn(&format!("Could not open a browser: {}", e));
        }
    }

    let callback = prompt_line("Paste the URL you were redirected to: ")?;
    let (code, state) = parse_callback_url(&callback)?;
    let user = ctx
        .auth
        .handle_callback(&code, state.as_deref())
        .await
        .context("Login failed")?;

    output.success(&format!("Logged in as {}", user.login));

    if let Some(store) = ctx.github_store()? {
        match store.repo_exists().await {
            Ok(true) => {}
            Ok(false) => output.message(&format!(
                "Data repository {}/{} does not exist yet. Run `jisuye setup`.",
                store.owner(),
                store.repo()
            )),
            Err(e) => output.warn(&format!("Could not check data repository: {}", e)),
        }
    }
    Ok(())
}

pub fn logout(ctx: &AppContext, output: &Output) -> Result<()> {
    ctx.auth.logout().context("Failed to clear session")?;
    output.success("Logged out");
    Ok(())
}

pub fn whoami(ctx: &AppContext, output: &Output) -> Result<()> {
    let Some(user) = ctx.auth.user() else {
        bail!("Not logged in. Run `jisuye login` first.");
    };

    match output.format {
        OutputFormat::Json => output.json(&user),
        OutputFormat::Quiet => println!("{}", user.login),
        OutputFormat::Human => {
            println!("Login: {}", user.login);
            if let Some(ref name) = user.name {
                println!("Name:  {}", name);
            }
            println!("Data:  {}/{}", user.login, ctx.config.repo_name);
        }
    }
    Ok(())
}

/// Create the private data repository if it does not exist
pub async fn setup(ctx: &AppContext, output: &Output) -> Result<()> {
    if matches!(ctx.config.backend(), Backend::Local { .. }) {
        output.message("Development backend in use; nothing to set up.");
        return Ok(());
    }

    let Some(store) = ctx.github_store()? else {
        bail!("Not logged in. Run `jisuye login` first.");
    };

    let created = store
        .ensure_repository()
        .await
        .context("Failed to set up data repository")?;

    let name = format!("{}/{}", store.owner(), store.repo());
    if output.is_json() {
        output.json(&json!({ "repository": name, "created": created }));
    } else if created {
        output.success(&format!("Created private repository {}", name));
    } else {
        output.success(&format!("Repository {} already exists", name));
    }
    Ok(())
}
