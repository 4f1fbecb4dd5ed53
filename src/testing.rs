// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Router-level test harness: in-memory KV, redb on a temp dir, captured mail.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use crate::api;
use crate::auth::password::cheap_hasher;
use crate::kv::{KvStore, MemoryKv};
use crate::mail::{MailMessage, MailQueue};
use crate::rate_limit::RateLimitConfig;
use crate::repos::{ProvisionError, RepoProvisioner};
use crate::state::{AppState, AuthSettings, Collaborators};
use crate::storage::Database;

/// Creates plain directories instead of running `git`.
pub(crate) struct DirProvisioner {
    root: PathBuf,
}

#[async_trait]
impl RepoProvisioner for DirProvisioner {
    fn repo_path(&self, owner_id: u64, name: &str) -> PathBuf {
        self.root.join(owner_id.to_string()).join(format!("{name}.git"))
    }

    async fn provision(&self, owner_id: u64, name: &str) -> Result<PathBuf, ProvisionError> {
        let path = self.repo_path(owner_id, name);
        if path.exists() {
            return Err(ProvisionError::AlreadyExists(path));
        }
        tokio::fs::create_dir_all(&path).await?;
        Ok(path)
    }
}

pub(crate) struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `Value::Null` when the body is not JSON.
    pub body: Value,
}

pub(crate) struct TestApp {
    pub state: AppState,
    pub kv: Arc<MemoryKv>,
    router: Router,
    mail: Mutex<mpsc::Receiver<MailMessage>>,
    _dir: tempfile::TempDir,
}

/// Budget for tests that are not about rate limiting; flows make many calls.
const GENEROUS_RATE_LIMIT: RateLimitConfig = RateLimitConfig {
    limit: 10_000,
    window: Duration::from_secs(60),
    trust_proxy_headers: false,
};

impl TestApp {
    pub fn new() -> Self {
        Self::build(None, GENEROUS_RATE_LIMIT)
    }

    pub fn with_rate_limit(rate_limit: RateLimitConfig) -> Self {
        Self::build(None, rate_limit)
    }

    /// Use `kv` for the application instead of the inspectable [`MemoryKv`].
    pub fn with_kv(kv: Arc<dyn KvStore>) -> Self {
        Self::build(Some(kv), GENEROUS_RATE_LIMIT)
    }

    fn build(kv_override: Option<Arc<dyn KvStore>>, rate_limit: RateLimitConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open(&dir.path().join("test.redb")).unwrap());
        let kv = Arc::new(MemoryKv::new());
        let (queue, rx) = MailQueue::channel(64);

        let deps = Collaborators {
            credentials: db.clone(),
            repositories: db,
            kv: kv_override.unwrap_or_else(|| kv.clone() as Arc<dyn KvStore>),
            mail: queue,
            provisioner: Arc::new(DirProvisioner {
                root: dir.path().join("repos"),
            }),
        };
        let settings = AuthSettings {
            access_secret: "test_access_secret".to_string(),
            token_secret: "test_refresh_secret".to_string(),
            public_base_url: "http://localhost:8080".to_string(),
            passwords: cheap_hasher(),
            rate_limit,
        };
        let state = AppState::new(deps, settings).unwrap();

        Self {
            router: api::router(state.clone()),
            state,
            kv,
            mail: Mutex::new(rx),
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        TestResponse {
            status,
            headers,
            body: serde_json::from_slice(&bytes).unwrap_or(Value::Null),
        }
    }

    pub fn next_mail(&self) -> Option<MailMessage> {
        self.mail.lock().unwrap().try_recv().ok()
    }

    /// Token from the link in the next queued mail.
    pub fn mailed_token(&self) -> Option<String> {
        self.next_mail().and_then(|mail| token_from_link(&mail.html))
    }

    /// Sign an access token directly, without touching the rate limiter.
    pub fn issue_access(&self, user_id: u64) -> String {
        self.state.issuer.issue_access(user_id).unwrap().token
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            json!({ "email": email, "password": password }),
        ))
        .await
    }

    pub async fn access_token(&self, email: &str, password: &str) -> String {
        let res = self.login(email, password).await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.body["data"]["access_token"].as_str().unwrap().to_string()
    }

    /// Register through the API and follow the mailed verification link.
    /// Returns the new user id.
    pub async fn register_verified(&self, username: &str, email: &str, password: &str) -> u64 {
        let res = self
            .send(json_request(
                Method::POST,
                "/api/v1/auth/register",
                json!({ "username": username, "email": email, "password": password }),
            ))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "register failed: {}", res.body);
        let id = res.body["data"]["id"].as_u64().unwrap();

        let token = self.mailed_token().unwrap();
        let res = self
            .send(get(&format!("/api/v1/auth/verify?token={token}")))
            .await;
        assert_eq!(res.status, StatusCode::OK, "verify failed: {}", res.body);
        id
    }
}

pub(crate) fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(crate) fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub(crate) fn bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

/// Extract the `token=` query value from a mailed link.
pub(crate) fn token_from_link(html: &str) -> Option<String> {
    let start = html.find("token=")? + "token=".len();
    let token: String = html[start..]
        .chars()
        .take_while(char::is_ascii_hexdigit)
        .collect();
    (!token.is_empty()).then_some(token)
}
