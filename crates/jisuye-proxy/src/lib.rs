//! OAuth token relay
//!
//! Browsers cannot call GitHub's `login/oauth/access_token` endpoint
//! directly because it sends no CORS headers. This service accepts the
//! token request on `/`, forwards it upstream and hands the provider's
//! answer back verbatim with permissive CORS headers.
//!
//! - `OPTIONS /` answers the preflight
//! - `POST /` relays `{client_id, code, code_verifier, redirect_uri}`
//! - anything else is `405`
//!
//! A confidential client secret can be held here and injected into the
//! upstream request so it never reaches the browser.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

/// GitHub's token endpoint
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://github.com/login/oauth/access_token";

/// Address the proxy listens on unless configured otherwise
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";

const USER_AGENT: &str = "jisuye-oauth-proxy";
const NO_STORE: &str = "no-store, no-cache, must-revalidate";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Invalid listen address '{value}': {source}")]
    ListenAddr {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("Invalid boolean for {key}: '{value}'")]
    InvalidFlag { key: String, value: String },
}

/// Proxy settings, read from `JISUYE_PROXY_*` environment variables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// `JISUYE_PROXY_LISTEN`
    pub listen_addr: SocketAddr,
    /// `JISUYE_PROXY_TOKEN_ENDPOINT`
    pub token_endpoint: String,
    /// `JISUYE_PROXY_CLIENT_SECRET`
    pub client_secret: Option<String>,
    /// `JISUYE_PROXY_INJECT_SECRET`
    pub inject_client_secret: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            client_secret: None,
            inject_client_secret: false,
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ProxyError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProxyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("JISUYE_PROXY_LISTEN") {
            config.listen_addr = value
                .parse()
                .map_err(|source| ProxyError::ListenAddr { value, source })?;
        }
        if let Some(value) = lookup("JISUYE_PROXY_TOKEN_ENDPOINT") {
            config.token_endpoint = value;
        }
        config.client_secret = lookup("JISUYE_PROXY_CLIENT_SECRET").filter(|s| !s.is_empty());
        if let Some(value) = lookup("JISUYE_PROXY_INJECT_SECRET") {
            config.inject_client_secret = match value.to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ProxyError::InvalidFlag {
                        key: "JISUYE_PROXY_INJECT_SECRET".into(),
                        value,
                    })
                }
            };
        }

        Ok(config)
    }
}

#[derive(Clone)]
struct AppState {
    config: Arc<ProxyConfig>,
    client: reqwest::Client,
}

/// Body the browser sends
#[derive(Debug, Deserialize)]
struct TokenRequest {
    client_id: Option<String>,
    code: Option<String>,
    code_verifier: Option<String>,
    redirect_uri: Option<String>,
}

/// Body forwarded to the provider
#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    client_id: &'a str,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_verifier: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<&'a str>,
}

fn allow_any_origin(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

fn error_response(status: StatusCode, body: serde_json::Value) -> Response {
    allow_any_origin((status, Json(body)).into_response())
}

async fn preflight() -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Accept, User-Agent"),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    response
}

async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        json!({
            "error": "Method not allowed",
            "message": "Only POST requests are supported",
        }),
    )
}

async fn relay(State(state): State<AppState>, body: Bytes) -> Response {
    let request: TokenRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("[proxy] unparseable request body: {}", e);
            return error_response(
                StatusCode::BAD_REQUEST,
                json!({
                    "error": "invalid_request",
                    "error_description": format!("Request body is not valid JSON: {}", e),
                }),
            );
        }
    };

    let (Some(client_id), Some(code)) = (
        request.client_id.as_deref().filter(|s| !s.is_empty()),
        request.code.as_deref().filter(|s| !s.is_empty()),
    ) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            json!({
                "error": "invalid_request",
                "error_description": "Missing required parameters: client_id, code",
            }),
        );
    };

    let client_secret = if state.config.inject_client_secret {
        match state.config.client_secret.as_deref() {
            Some(secret) => Some(secret),
            None => {
                error!("[proxy] client secret injection enabled but no secret configured");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "server_error",
                        "error_description": "Server configuration error: client secret not set",
                    }),
                );
            }
        }
    } else {
        None
    };

    let prefix: String = client_id.chars().take(10).collect();
    info!("[proxy] token request for client_id {}...", prefix);

    let upstream = UpstreamRequest {
        client_id,
        code,
        code_verifier: request.code_verifier.as_deref(),
        redirect_uri: request.redirect_uri.as_deref(),
        client_secret,
    };

    match forward(&state, &upstream).await {
        Ok((status, text)) => {
            info!("[proxy] upstream answered {} ({} bytes)", status, text.len());
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut response = (status, text).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
            response
        }
        Err(e) => {
            error!("[proxy] upstream request failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({
                    "error": "internal_server_error",
                    "error_description": e.to_string(),
                }),
            )
        }
    }
}

async fn forward(
    state: &AppState,
    upstream: &UpstreamRequest<'_>,
) -> Result<(u16, String), reqwest::Error> {
    let response = state
        .client
        .post(&state.config.token_endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .json(upstream)
        .send()
        .await?;
    let status = response.status().as_u16();
    let text = response.text().await?;
    Ok((status, text))
}

/// Build the relay router
pub fn router(config: ProxyConfig) -> anyhow::Result<Router> {
    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()?;

    let state = AppState {
        config: Arc::new(config),
        client,
    };

    Ok(Router::new()
        .route(
            "/",
            post(relay).options(preflight).fallback(method_not_allowed),
        )
        .with_state(state))
}

/// Bind and serve until the process is stopped
pub async fn serve(config: ProxyConfig) -> anyhow::Result<()> {
    let addr = config.listen_addr;
    if config.inject_client_secret && config.client_secret.is_none() {
        warn!("Client secret injection is enabled but JISUYE_PROXY_CLIENT_SECRET is not set");
    }
    let router = router(config)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting OAuth token proxy on {}", addr);
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ProxyConfig::default());
        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.token_endpoint, DEFAULT_TOKEN_ENDPOINT);
    }

    #[test]
    fn test_env_overrides() {
        let config = ProxyConfig::from_lookup(lookup(&[
            ("JISUYE_PROXY_LISTEN", "0.0.0.0:9000"),
            ("JISUYE_PROXY_TOKEN_ENDPOINT", "http://localhost:1/token"),
            ("JISUYE_PROXY_CLIENT_SECRET", "s3cret"),
            ("JISUYE_PROXY_INJECT_SECRET", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.token_endpoint, "http://localhost:1/token");
        assert_eq!(config.client_secret.as_deref(), Some("s3cret"));
        assert!(config.inject_client_secret);
    }

    #[test]
    fn test_empty_secret_is_unset() {
        let config =
            ProxyConfig::from_lookup(lookup(&[("JISUYE_PROXY_CLIENT_SECRET", "")])).unwrap();
        assert_eq!(config.client_secret, None);
    }

    #[test]
    fn test_invalid_values() {
        let err = ProxyConfig::from_lookup(lookup(&[("JISUYE_PROXY_LISTEN", "nowhere")]))
            .unwrap_err();
        assert!(matches!(err, ProxyError::ListenAddr { .. }));

        let err = ProxyConfig::from_lookup(lookup(&[("JISUYE_PROXY_INJECT_SECRET", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidFlag { .. }));
    }

    #[test]
    fn test_upstream_body_omits_absent_fields() {
        let body = serde_json::to_value(UpstreamRequest {
            client_id: "id",
            code: "code",
            code_verifier: None,
            redirect_uri: Some("http://localhost/cb"),
            client_secret: None,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({ "client_id": "id", "code": "code", "redirect_uri": "http://localhost/cb" })
        );
    }
}
