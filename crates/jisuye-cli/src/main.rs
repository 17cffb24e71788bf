//! jisuye CLI
//!
//! Command-line interface for jisuye - a bookmark navigation page whose data
//! lives in a private GitHub repository.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use jisuye_core::Config;

mod commands;
mod context;
mod editor;
mod output;

use context::{init_logging, push_changes, AppContext};
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "jisuye")]
#[command(about = "jisuye - personal bookmark navigation backed by GitHub")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with GitHub
    Login {
        /// Print the authorize URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Create the private data repository (first run)
    Setup,
    /// Show session, storage and sync status
    Status,
    /// Push all local data to the remote now
    Sync,
    /// Manage links
    Link {
        #[command(subcommand)]
        command: LinkCommands,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Show or change site settings
    Settings {
        #[command(subcommand)]
        command: Option<SettingsCommands>,
    },
    /// Manage skins
    Skin {
        #[command(subcommand)]
        command: SkinCommands,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum LinkCommands {
    /// Create a new link
    #[command(alias = "create")]
    Add {
        /// Display title
        title: String,
        /// URL to save
        url: String,
        /// Category name, ID or ID prefix
        #[arg(short, long)]
        category: String,
        /// Extra fields as key=value (e.g. icon=..., description=...)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// List links
    #[command(alias = "ls")]
    List {
        /// Only links in this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Update fields of a link
    #[command(alias = "edit")]
    Update {
        /// Link ID (full UUID or prefix)
        id: String,
        /// Fields as key=value (e.g. title=Docs categoryId=Work)
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Delete a link
    #[command(alias = "rm")]
    Delete {
        /// Link ID (full UUID or prefix)
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Create a new category
    #[command(alias = "create")]
    Add {
        name: String,
        /// Extra fields as key=value (e.g. icon=..., sortOrder=2)
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// List categories with link counts
    #[command(alias = "ls")]
    List,
    /// Update fields of a category
    #[command(alias = "edit")]
    Update {
        /// Category name, ID or ID prefix
        id: String,
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Delete a category and all of its links
    #[command(alias = "rm")]
    Delete {
        /// Category name, ID or ID prefix
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show site settings
    Show,
    /// Change settings (camelCase keys, e.g. siteName=Home showIcons=false)
    Set {
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SkinCommands {
    /// List built-in and custom skins
    #[command(alias = "ls")]
    List,
    /// Activate a skin and write the theme CSS
    Apply { id: String },
    /// Add a custom skin from JSON (opens $EDITOR without --file)
    Add {
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Update fields of a custom skin
    #[command(alias = "edit")]
    Update {
        id: String,
        /// Fields as key=value (e.g. name=Night)
        #[arg(required = true, value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Delete a custom skin
    #[command(alias = "rm")]
    Delete {
        id: String,
        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the active skin as CSS
    Css,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (client_id, oauth_proxy_url, repo_name, dev_mode, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    // Config commands work even with a broken data directory
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), cli.config.as_ref(), &output);
    }

    let config = Config::load_with_cli_override(cli.config.as_ref())
        .context("Failed to load configuration")?;
    init_logging(&config);

    let ctx = AppContext::new(config)?;

    let result = run(cli.command, &ctx, &output).await;
    if let Err(ref e) = result {
        if let Some(hint) = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<jisuye_core::Error>())
            .and_then(|core| core.recovery_suggestion())
        {
            output.warn(hint);
        }
    }
    result
}

async fn run(command: Commands, ctx: &AppContext, output: &Output) -> Result<()> {
    match command {
        Commands::Login { no_browser } => commands::auth::login(ctx, no_browser, output).await,
        Commands::Logout => commands::auth::logout(ctx, output),
        Commands::Whoami => commands::auth::whoami(ctx, output),
        Commands::Setup => commands::auth::setup(ctx, output).await,
        Commands::Status => commands::status::show(ctx, output).await,
        Commands::Config { .. } => unreachable!(), // Handled in main
        command => run_data_command(command, ctx, output).await,
    }
}

/// Commands that need the loaded stores
///
/// Mutations are pushed right away; a one-shot process cannot wait for the
/// auto-sync timer.
async fn run_data_command(command: Commands, ctx: &AppContext, output: &Output) -> Result<()> {
    let stores = ctx.open_stores(output).await?;

    let changed = match command {
        Commands::Sync => {
            commands::sync::sync(&stores, output).await?;
            false
        }
        Commands::Link { command } => match command {
            LinkCommands::Add {
                title,
                url,
                category,
                fields,
            } => {
                commands::link::add(&stores, title, url, category, fields, output)?;
                true
            }
            LinkCommands::List { category } => {
                commands::link::list(&stores, category, output)?;
                false
            }
            LinkCommands::Update { id, fields } => {
                commands::link::update(&stores, id, fields, output)?;
                true
            }
            LinkCommands::Delete { id, yes } => commands::link::delete(&stores, id, yes, output)?,
        },
        Commands::Category { command } => match command {
            CategoryCommands::Add { name, fields } => {
                commands::category::add(&stores, name, fields, output)?;
                true
            }
            CategoryCommands::List => {
                commands::category::list(&stores, output)?;
                false
            }
            CategoryCommands::Update { id, fields } => {
                commands::category::update(&stores, id, fields, output)?;
                true
            }
            CategoryCommands::Delete { id, yes } => {
                commands::category::delete(&stores, id, yes, output)?
            }
        },
        Commands::Settings { command } => match command {
            Some(SettingsCommands::Show) | None => {
                commands::settings::show(&stores, output)?;
                false
            }
            Some(SettingsCommands::Set { fields }) => {
                commands::settings::set(&stores, fields, output)?;
                true
            }
        },
        Commands::Skin { command } => match command {
            SkinCommands::List => {
                commands::skin::list(&stores, output)?;
                false
            }
            SkinCommands::Apply { id } => {
                commands::skin::apply(&stores, id, &ctx.config.theme_css_path(), output)?;
                false
            }
            SkinCommands::Add { file } => {
                commands::skin::add(&stores, file, output)?;
                true
            }
            SkinCommands::Update { id, fields } => {
                commands::skin::update(&stores, id, fields, output)?;
                true
            }
            SkinCommands::Delete { id, yes } => commands::skin::delete(&stores, id, yes, output)?,
            SkinCommands::Css => {
                commands::skin::css(&stores, output).await?;
                false
            }
        },
        _ => unreachable!(), // Session commands are handled in run()
    };

    if changed || stores.coordinator.has_unsynced_changes() {
        push_changes(&stores, output).await;
    }
    stores.coordinator.stop_auto_sync();
    Ok(())
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}
