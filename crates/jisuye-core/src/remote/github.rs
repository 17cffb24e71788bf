//! GitHub-backed document store
//!
//! Documents live as pretty-printed JSON files in a private repository owned
//! by the authenticated user. The blob SHA returned by the contents API is
//! the version token.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{DocumentPath, DocumentStore, VersionToken, Versioned};
use crate::error::{Error, Result};
use crate::models::{Extra, Settings};
use crate::skin::SkinsEnvelope;

const USER_AGENT: &str = "jisuye/0.3";
const REPO_DESCRIPTION: &str = "个人导航网站数据存储";

/// Wait after repository creation before seeding files
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// The authenticated GitHub account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubUser {
    pub login: String,
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    content: WrittenContent,
}

#[derive(Debug, Deserialize)]
struct WrittenContent {
    sha: String,
}

/// Document store backed by a private GitHub repository
pub struct GitHubDocumentStore {
    client: Client,
    api_base: String,
    token: String,
    owner: String,
    repo: String,
    settle_delay: Duration,
}

impl GitHubDocumentStore {
    /// Create a store for `owner/repo` using the given access token
    pub fn new(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            api_base: "https://api.github.com".to_string(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        })
    }

    /// Point at a different API base (GitHub Enterprise, tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the post-creation settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo)
    }

    fn contents_url(&self, path: DocumentPath) -> String {
        format!("{}/contents/{}", self.repo_url(), path.as_str())
    }

    /// Check whether the data repository exists
    pub async fn repo_exists(&self) -> Result<bool> {
        let response = self.authed(self.client.get(self.repo_url())).send().await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(error_from_response(response, "repository lookup").await),
        }
    }

    /// Create the private repository and seed the default documents
    pub async fn create_repository(&self) -> Result<()> {
        let body = json!({
            "name": self.repo,
            "private": true,
            "description": REPO_DESCRIPTION,
            "auto_init": true,
        });

        let response = self
            .authed(self.client.post(format!("{}/user/repos", self.api_base)))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "repository creation").await);
        }

        info!("Private repository created: {}/{}", self.owner, self.repo);

        // GitHub needs a moment before the new repository accepts writes
        tokio::time::sleep(self.settle_delay).await;

        for (path, content) in initial_documents()? {
            self.write(path, &content, &format!("Initialize {}", path), None)
                .await?;
        }

        info!("Initial data files created");
        Ok(())
    }

    /// Create the repository when it is missing
    ///
    /// Returns `true` when a repository was created.
    pub async fn ensure_repository(&self) -> Result<bool> {
        if self.repo_exists().await? {
            return Ok(false);
        }
        self.create_repository().await?;
        Ok(true)
    }

    /// Fetch the authenticated user's profile
    pub async fn fetch_user(&self) -> Result<GitHubUser> {
        fetch_user(&self.client, &self.api_base, &self.token).await
    }
}

#[async_trait]
impl DocumentStore for GitHubDocumentStore {
    fn describe(&self) -> String {
        format!("github:{}/{}", self.owner, self.repo)
    }

    async fn fetch(&self, path: DocumentPath) -> Result<Option<Versioned<Value>>> {
        let response = self
            .authed(self.client.get(self.contents_url(path)))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("{} not found in {}", path, self.describe());
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, path.as_str()).await);
        }

        let contents: ContentsResponse = response.json().await?;
        let content = decode_content(&contents.content)?;
        Ok(Some(Versioned {
            content,
            version: VersionToken(contents.sha),
        }))
    }

    async fn current_version(&self, path: DocumentPath) -> Result<Option<VersionToken>> {
        Ok(self.fetch(path).await?.map(|doc| doc.version))
    }

    async fn write(
        &self,
        path: DocumentPath,
        content: &Value,
        message: &str,
        expected: Option<VersionToken>,
    ) -> Result<VersionToken> {
        let mut body = json!({
            "message": message,
            "content": encode_content(content)?,
        });
        if let Some(ref sha) = expected {
            body["sha"] = Value::String(sha.0.clone());
        }

        let response = self
            .authed(self.client.put(self.contents_url(path)))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let written: WriteResponse = response.json().await?;
                debug!("wrote {} ({})", path, written.content.sha);
                Ok(VersionToken(written.content.sha))
            }
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                warn!("write conflict on {} (expected {:?})", path, expected);
                Err(Error::Conflict {
                    path: path.as_str().to_string(),
                })
            }
            _ => Err(error_from_response(response, path.as_str()).await),
        }
    }
}

/// Fetch `/user` with a bearer token
pub(crate) async fn fetch_user(client: &Client, api_base: &str, token: &str) -> Result<GitHubUser> {
    let response = client
        .get(format!("{}/user", api_base.trim_end_matches('/')))
        .bearer_auth(token)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(error_from_response(response, "user lookup").await);
    }
    Ok(response.json().await?)
}

/// Documents written into a freshly created repository
fn initial_documents() -> Result<Vec<(DocumentPath, Value)>> {
    Ok(vec![
        (DocumentPath::Links, json!([])),
        (DocumentPath::Categories, json!([])),
        (DocumentPath::Settings, serde_json::to_value(Settings::default())?),
        (
            DocumentPath::Skins,
            serde_json::to_value(SkinsEnvelope::default())?,
        ),
    ])
}

fn encode_content(content: &Value) -> Result<String> {
    let pretty = serde_json::to_string_pretty(content)?;
    Ok(STANDARD.encode(pretty.as_bytes()))
}

fn decode_content(encoded: &str) -> Result<Value> {
    // The contents API wraps base64 at 60 columns
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::remote(format!("invalid base64 content: {}", e)))?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn error_from_response(response: Response, context: &str) -> Error {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Error::NotAuthenticated;
    }
    let body = response.text().await.unwrap_or_default();
    Error::remote_status(status.as_u16(), format!("{} failed: {}", context, body))
}
