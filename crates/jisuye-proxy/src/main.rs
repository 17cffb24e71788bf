//! jisuye OAuth proxy
//!
//! Relays the GitHub token exchange for browser clients.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use jisuye_proxy::ProxyConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let level = std::env::var("JISUYE_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("jisuye_proxy={}", level)))
        .with_target(false)
        .init();

    let config = ProxyConfig::from_env().context("Failed to read proxy configuration")?;
    jisuye_proxy::serve(config).await
}
