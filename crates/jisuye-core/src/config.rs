//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/jisuye/config.toml)
//! 3. Environment variables (JISUYE_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "JISUYE";

/// Default name of the private data repository
pub const DEFAULT_REPO_NAME: &str = "jisuye-ext-data";

/// Default auto-sync period (5 minutes)
pub const DEFAULT_AUTO_SYNC_SECS: u64 = 5 * 60;

/// Which remote document store the composition root should build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Private GitHub repository owned by the logged-in user
    GitHub,
    /// In-process development store seeded from fixtures
    Local { fixtures: String },
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the local cache and generated files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// GitHub OAuth App client id
    #[serde(default)]
    pub client_id: Option<String>,

    /// Redirect URI registered with the OAuth App
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// CORS relay used for the token exchange (optional)
    #[serde(default)]
    pub oauth_proxy_url: Option<String>,

    /// Name of the private data repository
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// GitHub REST API base
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// GitHub web base (authorize and token endpoints)
    #[serde(default = "default_oauth_base_url")]
    pub oauth_base_url: String,

    /// Use the local development backend instead of GitHub
    #[serde(default)]
    pub dev_mode: bool,

    /// Fixture directory or http(s) base URL for the development backend
    #[serde(default = "default_dev_data")]
    pub dev_data: String,

    /// Auto-sync period in seconds
    #[serde(default = "default_auto_sync_secs")]
    pub auto_sync_interval_secs: u64,

    /// Log file path (logs go to stderr when unset)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            client_id: None,
            redirect_uri: default_redirect_uri(),
            oauth_proxy_url: None,
            repo_name: default_repo_name(),
            api_base_url: default_api_base_url(),
            oauth_base_url: default_oauth_base_url(),
            dev_mode: false,
            dev_data: default_dev_data(),
            auto_sync_interval_secs: default_auto_sync_secs(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (JISUYE_DATA_DIR, JISUYE_CLIENT_ID, ...)
    /// 2. Config file (~/.config/jisuye/config.toml or JISUYE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring an explicit path from the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_CLIENT_ID", ENV_PREFIX)) {
            self.client_id = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_REDIRECT_URI", ENV_PREFIX)) {
            if !val.is_empty() {
                self.redirect_uri = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_OAUTH_PROXY_URL", ENV_PREFIX)) {
            self.oauth_proxy_url = non_empty(val);
        }

        if let Ok(val) = std::env::var(format!("{}_REPO_NAME", ENV_PREFIX)) {
            if !val.is_empty() {
                self.repo_name = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_DEV_MODE", ENV_PREFIX)) {
            self.dev_mode = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_DEV_DATA", ENV_PREFIX)) {
            if !val.is_empty() {
                self.dev_data = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with JISUYE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jisuye")
            .join("config.toml")
    }

    /// Directory holding the durable local cache
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    /// Where the applied skin is rendered as CSS
    pub fn theme_css_path(&self) -> PathBuf {
        self.data_dir.join("theme.css")
    }

    /// Backend strategy selected by this configuration
    pub fn backend(&self) -> Backend {
        if self.dev_mode {
            Backend::Local {
                fixtures: self.dev_data.clone(),
            }
        } else {
            Backend::GitHub
        }
    }

    /// Token endpoint: the CORS relay when configured, GitHub otherwise
    pub fn token_url(&self) -> String {
        match self.oauth_proxy_url {
            Some(ref proxy) => proxy.clone(),
            None => format!(
                "{}/login/oauth/access_token",
                self.oauth_base_url.trim_end_matches('/')
            ),
        }
    }

    /// Authorization endpoint
    pub fn authorize_url(&self) -> String {
        format!(
            "{}/login/oauth/authorize",
            self.oauth_base_url.trim_end_matches('/')
        )
    }

    /// Auto-sync period
    pub fn auto_sync_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.auto_sync_interval_secs.max(1))
    }
}

fn non_empty(val: String) -> Option<String> {
    if val.is_empty() {
        None
    } else {
        Some(val)
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jisuye")
}

fn default_redirect_uri() -> String {
    "http://localhost:5173/auth/callback".to_string()
}

fn default_repo_name() -> String {
    DEFAULT_REPO_NAME.to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_oauth_base_url() -> String {
    "https://github.com".to_string()
}

fn default_dev_data() -> String {
    "./dev-data".to_string()
}

fn default_auto_sync_secs() -> u64 {
    DEFAULT_AUTO_SYNC_SECS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "JISUYE_DATA_DIR",
        "JISUYE_CLIENT_ID",
        "JISUYE_REDIRECT_URI",
        "JISUYE_OAUTH_PROXY_URL",
        "JISUYE_REPO_NAME",
        "JISUYE_DEV_MODE",
        "JISUYE_DEV_DATA",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.dev_mode);
        assert!(config.client_id.is_none());
        assert_eq!(config.repo_name, "jisuye-ext-data");
        assert_eq!(config.auto_sync_interval_secs, 300);
        assert!(config.data_dir.ends_with("jisuye"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.cache_dir().ends_with("cache"));
        assert!(config.theme_css_path().ends_with("theme.css"));
    }

    #[test]
    fn test_backend_selection() {
        let mut config = Config::default();
        assert_eq!(config.backend(), Backend::GitHub);

        config.dev_mode = true;
        config.dev_data = "/tmp/fixtures".to_string();
        assert_eq!(
            config.backend(),
            Backend::Local {
                fixtures: "/tmp/fixtures".to_string()
            }
        );
    }

    #[test]
    fn test_token_url_prefers_proxy() {
        let mut config = Config::default();
        assert_eq!(
            config.token_url(),
            "https://github.com/login/oauth/access_token"
        );

        config.oauth_proxy_url = Some("https://proxy.example.workers.dev".to_string());
        assert_eq!(config.token_url(), "https://proxy.example.workers.dev");
        assert_eq!(
            config.authorize_url(),
            "https://github.com/login/oauth/authorize"
        );
    }

    #[test]
    fn test_env_override_dev_mode() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("JISUYE_DEV_MODE", "true");
        config.apply_env_overrides();
        assert!(config.dev_mode);

        env::set_var("JISUYE_DEV_MODE", "1");
        config.dev_mode = false;
        config.apply_env_overrides();
        assert!(config.dev_mode);

        env::set_var("JISUYE_DEV_MODE", "false");
        config.apply_env_overrides();
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_env_override_client_id() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("JISUYE_CLIENT_ID", "Iv1.abc");
        config.apply_env_overrides();
        assert_eq!(config.client_id, Some("Iv1.abc".to_string()));

        // Empty string clears it
        env::set_var("JISUYE_CLIENT_ID", "");
        config.apply_env_overrides();
        assert!(config.client_id.is_none());
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/jisuye"),
            client_id: Some("Iv1.123".to_string()),
            oauth_proxy_url: Some("https://proxy.example.com".to_string()),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("client_id"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.client_id, config.client_id);
        assert_eq!(parsed.oauth_proxy_url, config.oauth_proxy_url);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            repo_name = "my-nav-data"
            dev_mode = true
            auto_sync_interval_secs = 60
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.repo_name, "my-nav-data");
        assert!(config.dev_mode);
        assert_eq!(
            config.auto_sync_interval(),
            std::time::Duration::from_secs(60)
        );
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("JISUYE_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert!(!config.dev_mode);
        assert!(config.data_dir.exists());
    }
}
