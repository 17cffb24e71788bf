//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use jisuye_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => output.json(&config),
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            let unset = || "(not set)".to_string();
            println!("Configuration:");
            println!("  data_dir:                {}", config.data_dir.display());
            println!(
                "  client_id:               {}",
                config.client_id.clone().unwrap_or_else(unset)
            );
            println!("  redirect_uri:            {}", config.redirect_uri);
            println!(
                "  oauth_proxy_url:         {}",
                config.oauth_proxy_url.clone().unwrap_or_else(unset)
            );
            println!("  repo_name:               {}", config.repo_name);
            println!("  api_base_url:            {}", config.api_base_url);
            println!("  oauth_base_url:          {}", config.oauth_base_url);
            println!("  dev_mode:                {}", config.dev_mode);
            println!("  dev_data:                {}", config.dev_data);
            println!("  auto_sync_interval_secs: {}", config.auto_sync_interval_secs);
            println!(
                "  log_file:                {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(unset)
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "client_id" => config.client_id = optional(value),
        "redirect_uri" => config.redirect_uri = value.to_string(),
        "oauth_proxy_url" => config.oauth_proxy_url = optional(value),
        "repo_name" => {
            if value.is_empty() {
                bail!("repo_name cannot be empty");
            }
            config.repo_name = value.to_string();
        }
        "api_base_url" => config.api_base_url = value.to_string(),
        "oauth_base_url" => config.oauth_base_url = value.to_string(),
        "dev_mode" => {
            config.dev_mode = value
                .parse()
                .context("Invalid value for dev_mode. Use 'true' or 'false'.")?;
        }
        "dev_data" => config.dev_data = value.to_string(),
        "auto_sync_interval_secs" => {
            config.auto_sync_interval_secs = value
                .parse()
                .context("Invalid value for auto_sync_interval_secs. Use a number of seconds.")?;
        }
        "log_file" => config.log_file = optional(value).map(PathBuf::from),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, client_id, redirect_uri, oauth_proxy_url, repo_name, \
                 api_base_url, oauth_base_url, dev_mode, dev_data, auto_sync_interval_secs, log_file",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "client_id", "Iv1.abc").unwrap();
        apply(&mut config, "oauth_proxy_url", "https://proxy.example.workers.dev").unwrap();
        apply(&mut config, "dev_mode", "true").unwrap();
        apply(&mut config, "auto_sync_interval_secs", "60").unwrap();

        assert_eq!(config.client_id.as_deref(), Some("Iv1.abc"));
        assert_eq!(config.token_url(), "https://proxy.example.workers.dev");
        assert!(config.dev_mode);
        assert_eq!(config.auto_sync_interval_secs, 60);

        apply(&mut config, "oauth_proxy_url", "none").unwrap();
        assert_eq!(config.oauth_proxy_url, None);
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "sync_url", "ws://x").is_err());
        assert!(apply(&mut config, "dev_mode", "sometimes").is_err());
        assert!(apply(&mut config, "auto_sync_interval_secs", "soon").is_err());
        assert!(apply(&mut config, "repo_name", "").is_err());
    }

    #[test]
    fn test_set_writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", dir.path().join("data").display().to_string()),
        )
        .unwrap();

        let output = Output::new(OutputFormat::Quiet);
        set("repo_name".into(), "my-nav".into(), Some(&path), &output).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("repo_name = \"my-nav\""));
    }
}
