//! GitHub OAuth login with PKCE
//!
//! `begin_login` produces the authorize URL and stores the verifier and
//! state in the session store. `handle_callback` checks the returned state,
//! exchanges the code for a token (directly or through the CORS relay) and
//! persists token and profile in the durable store.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::cache::{keys, read_json, write_json, KeyValueStore};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pkce::{clear_oauth_data, get_oauth_data, save_oauth_data, PkceSession};
use crate::remote::{fetch_user, GitHubUser};

/// Scopes requested at login
pub const OAUTH_SCOPE: &str = "read:user user:email repo";

/// Placeholder client id shipped in sample configs
const PLACEHOLDER_CLIENT_ID: &str = "your_github_client_id";

/// Endpoints and client registration for the login flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: Option<String>,
    pub redirect_uri: String,
    pub scope: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

impl OAuthConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: OAUTH_SCOPE.to_string(),
            authorize_url: config.authorize_url(),
            token_url: config.token_url(),
            api_base_url: config.api_base_url.clone(),
        }
    }

    fn usable_client_id(&self) -> Option<&str> {
        self.client_id
            .as_deref()
            .filter(|id| !id.is_empty() && *id != PLACEHOLDER_CLIENT_ID)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    user: Option<GitHubUser>,
}

/// Owns the OAuth handshake and the session token
pub struct AuthStore {
    config: OAuthConfig,
    durable: Arc<dyn KeyValueStore>,
    session_store: Arc<dyn KeyValueStore>,
    client: Client,
    session: Mutex<Session>,
}

impl AuthStore {
    pub fn new(
        config: OAuthConfig,
        durable: Arc<dyn KeyValueStore>,
        session_store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            config,
            durable,
            session_store,
            client,
            session: Mutex::new(Session::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Generate PKCE data and return the provider's authorize URL
    pub fn begin_login(&self) -> Result<Url> {
        let client_id = self
            .config
            .usable_client_id()
            .ok_or_else(|| Error::ServerError("GitHub client_id is not configured".into()))?;

        info!("[auth] starting OAuth login flow");
        let pkce = PkceSession::generate();
        save_oauth_data(self.session_store.as_ref(), &pkce.verifier, &pkce.state)?;
        debug!(
            "[auth] verifier ({} chars) and state ({} chars) saved",
            pkce.verifier.len(),
            pkce.state.len()
        );

        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", client_id),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", self.config.scope.as_str()),
                ("state", pkce.state.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| Error::ServerError(format!("invalid authorize URL: {}", e)))
    }

    /// Complete the login with the provider's callback parameters
    pub async fn handle_callback(&self, code: &str, state: Option<&str>) -> Result<GitHubUser> {
        info!("[auth] handling OAuth callback");
        let saved = get_oauth_data(self.session_store.as_ref());

        let Some(code_verifier) = saved.code_verifier else {
            return Err(Error::InvalidRequest(
                "code_verifier not found, please log in again".into(),
            ));
        };
        let (Some(state), Some(saved_state)) = (state, saved.state) else {
            return Err(Error::InvalidRequest(
                "state parameter not found, please log in again".into(),
            ));
        };
        if state != saved_state {
            error!("[auth] state mismatch");
            return Err(Error::StateMismatch);
        }

        let client_id = self
            .config
            .usable_client_id()
            .ok_or_else(|| Error::ServerError("GitHub client_id is not configured".into()))?;

        let access_token = self.exchange_code(client_id, code, &code_verifier).await?;

        let user = fetch_user(&self.client, &self.config.api_base_url, &access_token)
            .await
            .map_err(|e| Error::remote(format!("failed to fetch user info: {}", e)))?;
        info!("[auth] user authenticated: {}", user.login);

        self.durable.set(keys::GITHUB_ACCESS_TOKEN, &access_token)?;
        write_json(self.durable.as_ref(), keys::GITHUB_USER, &user)?;
        {
            let mut session = self.lock();
            session.access_token = Some(access_token);
            session.user = Some(user.clone());
        }
        clear_oauth_data(self.session_store.as_ref())?;

        Ok(user)
    }

    async fn exchange_code(&self, client_id: &str, code: &str, code_verifier: &str) -> Result<String> {
        debug!("[auth] requesting access token from {}", self.config.token_url);
        let body = json!({
            "client_id": client_id,
            "code": code,
            "code_verifier": code_verifier,
            "redirect_uri": self.config.redirect_uri,
        });

        let response = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("[auth] token request failed ({}): {}", status, text);
            return Err(Error::remote_status(
                status.as_u16(),
                format!("token request failed: {}", text),
            ));
        }

        let token: TokenResponse = response.json().await?;
        if let Some(err) = token.error {
            error!("[auth] token error: {}", err);
            return Err(Error::InvalidRequest(
                token
                    .error_description
                    .unwrap_or_else(|| "Failed to get access token".into()),
            ));
        }

        token
            .access_token
            .ok_or_else(|| Error::InvalidRequest("token response carried no access_token".into()))
    }

    /// Restore a previous session from the durable store
    pub fn check_auth(&self) -> bool {
        let token = match self.durable.get(keys::GITHUB_ACCESS_TOKEN) {
            Ok(token) => token,
            Err(e) => {
                warn!("[auth] failed to read token: {}", e);
                None
            }
        };
        let Some(token) = token else {
            return false;
        };
        if !self.durable.contains(keys::GITHUB_USER) {
            return false;
        }

        let user = match read_json::<GitHubUser>(self.durable.as_ref(), keys::GITHUB_USER) {
            Ok(user) => user,
            Err(e) => {
                warn!("[auth] failed to parse user data: {}", e);
                None
            }
        };

        let mut session = self.lock();
        session.access_token = Some(token);
        session.user = user;
        true
    }

    /// Forget the session, in memory and on disk
    pub fn logout(&self) -> Result<()> {
        {
            let mut session = self.lock();
            session.access_token = None;
            session.user = None;
        }
        self.durable.remove(keys::GITHUB_ACCESS_TOKEN)?;
        self.durable.remove(keys::GITHUB_USER)?;
        info!("[auth] logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().access_token.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    pub fn user(&self) -> Option<GitHubUser> {
        self.lock().user.clone()
    }
}

/// Pull `code` and `state` out of a pasted callback URL
pub fn parse_callback_url(url: &str) -> Result<(String, Option<String>)> {
    let url = Url::parse(url)
        .map_err(|e| Error::InvalidRequest(format!("invalid callback URL: {}", e)))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(Error::InvalidRequest(format!(
                    "authorization was denied: {}",
                    value
                )))
            }
            _ => {}
        }
    }

    let code = code.ok_or_else(|| Error::InvalidRequest("callback URL has no code".into()))?;
    Ok((code, state))
}
