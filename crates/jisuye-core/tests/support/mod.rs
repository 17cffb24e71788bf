//! In-process fake of the GitHub endpoints jisuye talks to

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

pub const TOKEN: &str = "gho_test_token";
pub const OWNER: &str = "octocat";

#[derive(Debug, Default)]
pub struct FakeGitHub {
    /// path -> (raw file text, sha)
    pub files: HashMap<String, (String, String)>,
    pub repo_exists: bool,
    pub repo_created: bool,
    pub token_requests: usize,
    pub last_token_request: Option<Value>,
    next_sha: u64,
}

impl FakeGitHub {
    pub fn document(&self, path: &str) -> Option<Value> {
        self.files
            .get(path)
            .and_then(|(raw, _)| serde_json::from_str(raw).ok())
    }

    pub fn raw(&self, path: &str) -> Option<String> {
        self.files.get(path).map(|(raw, _)| raw.clone())
    }

    fn bump_sha(&mut self) -> String {
        self.next_sha += 1;
        format!("sha-{}", self.next_sha)
    }
}

#[derive(Clone)]
pub struct Fake {
    pub base_url: String,
    state: Arc<Mutex<FakeGitHub>>,
}

impl Fake {
    pub fn state(&self) -> MutexGuard<'_, FakeGitHub> {
        self.state.lock().unwrap()
    }

    pub fn token_url(&self) -> String {
        format!("{}/login/oauth/access_token", self.base_url)
    }
}

type Shared = Arc<Mutex<FakeGitHub>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

async fn get_repo(State(state): State<Shared>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }
    if state.lock().unwrap().repo_exists {
        (StatusCode::OK, Json(json!({ "name": "jisuye-ext-data", "private": true })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" })))
    }
}

async fn create_repo(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    assert_eq!(body["private"], true);
    state.repo_exists = true;
    state.repo_created = true;
    (StatusCode::CREATED, Json(json!({ "name": body["name"] })))
}

async fn get_contents(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }
    let state = state.lock().unwrap();
    match state.files.get(&path) {
        Some((raw, sha)) => {
            // GitHub wraps base64 at 60 columns
            let encoded = STANDARD.encode(raw.as_bytes());
            let wrapped: Vec<String> = encoded
                .as_bytes()
                .chunks(60)
                .map(|c| String::from_utf8_lossy(c).into_owned())
                .collect();
            (
                StatusCode::OK,
                Json(json!({
                    "path": path,
                    "sha": sha,
                    "encoding": "base64",
                    "content": wrapped.join("\n"),
                })),
            )
        }
        None => (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))),
    }
}

#[derive(Deserialize)]
struct PutBody {
    message: String,
    content: String,
    sha: Option<String>,
}

async fn put_contents(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Json(body): Json<PutBody>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }
    assert!(!body.message.is_empty());

    let mut state = state.lock().unwrap();
    let current = state.files.get(&path).map(|(_, sha)| sha.clone());
    match (current, body.sha) {
        (Some(_), None) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "\"sha\" wasn't supplied." })),
            )
        }
        (Some(current), Some(given)) if current != given => {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "message": "does not match" })),
            )
        }
        _ => {}
    }

    let raw = String::from_utf8(STANDARD.decode(body.content).unwrap()).unwrap();
    let sha = state.bump_sha();
    state.files.insert(path.clone(), (raw, sha.clone()));
    (
        StatusCode::OK,
        Json(json!({ "content": { "path": path, "sha": sha } })),
    )
}

async fn get_user(headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Bad credentials" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "login": OWNER, "id": 583231, "name": "The Octocat", "type": "User" })),
    )
}

async fn access_token(State(state): State<Shared>, Json(body): Json<Value>) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    state.token_requests += 1;
    state.last_token_request = Some(body.clone());

    if body["code"] == "expired" {
        return Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }));
    }
    Json(json!({ "access_token": TOKEN, "token_type": "bearer", "scope": "repo" }))
}

/// Start the fake on an ephemeral port
pub async fn spawn() -> Fake {
    spawn_with(FakeGitHub::default()).await
}

pub async fn spawn_with(initial: FakeGitHub) -> Fake {
    let state: Shared = Arc::new(Mutex::new(initial));

    let router = Router::new()
        .route("/repos/:owner/:repo", get(get_repo))
        .route("/user/repos", post(create_repo))
        .route(
            "/repos/:owner/:repo/contents/*path",
            get(get_contents).put(put_contents),
        )
        .route("/user", get(get_user))
        .route("/login/oauth/access_token", post(access_token))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Fake {
        base_url: format!("http://{}", addr),
        state,
    }
}

/// A fake whose repository already exists
pub async fn spawn_with_repo() -> Fake {
    spawn_with(FakeGitHub {
        repo_exists: true,
        ..Default::default()
    })
    .await
}
