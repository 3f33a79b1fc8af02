//! Shared utilities for end-to-end tests.
//!
//! Each gateway binds an ephemeral port and talks to two wiremock servers:
//! one playing the OAuth provider, one playing the model provider.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE};
use reqwest::{redirect, Client, Response, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scan_gateway::config::ServiceConfig;
use scan_gateway::store::{
    CounterStore, CredentialStore, KeyTtl, MemoryStore, StoreError, StoreResult, Stores,
};
use scan_gateway::{HttpServer, Shutdown};

pub const FRONTEND_URL: &str = "http://frontend.test";
pub const EXTERNAL_ID: &str = "google-sub-123";
pub const EMAIL: &str = "alice@example.com";

pub const VALID_FINDINGS: &str = r#"[{"line":1,"issueType":"SQL Injection","severity":"HIGH","description":"Query concatenates user input."}]"#;

/// Counter store whose every call fails.
pub struct UnreachableCounters;

#[async_trait]
impl CounterStore for UnreachableCounters {
    async fn incr(&self, _key: &str) -> StoreResult<u64> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn ttl(&self, _key: &str) -> StoreResult<KeyTtl> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn expire(&self, _key: &str, _secs: u64) -> StoreResult<()> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub oauth: MockServer,
    pub model: MockServer,
    pub client: Client,
}

impl TestGateway {
    /// Gateway on an in-process store.
    pub async fn start() -> Self {
        Self::start_with_stores(Stores::memory()).await
    }

    pub async fn start_with_stores(stores: Stores) -> Self {
        let oauth = MockServer::start().await;
        let model = MockServer::start().await;
        mount_oauth_provider(&oauth).await;

        let config = test_config(&oauth, &model);
        let server = HttpServer::new(config, stores).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, rx).await;
        });

        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .no_proxy()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        Self {
            addr,
            shutdown,
            oauth,
            model,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Run the redirect login flow and return the issued access token.
    pub async fn login(&self) -> String {
        let start = self.client.get(self.url("/api/auth/google")).send().await.unwrap();
        assert_eq!(start.status(), StatusCode::FOUND);

        let authorize = url::Url::parse(location(&start)).unwrap();
        let state = query_value(&authorize, "state").unwrap();
        let cookie = start
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .unwrap()
            .to_string();

        let callback = self
            .client
            .get(self.url("/api/auth/google/callback"))
            .query(&[("code", "auth-code"), ("state", state.as_str())])
            .header(COOKIE, cookie)
            .send()
            .await
            .unwrap();
        assert_eq!(callback.status(), StatusCode::FOUND);

        let redirect = url::Url::parse(location(&callback)).unwrap();
        query_value(&redirect, "accessToken").expect("login did not issue a token")
    }

    pub async fn whoami(&self, token: &str) -> Response {
        self.client
            .get(self.url("/api/auth/user"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .unwrap()
    }

    pub async fn scan(&self, token: &str, content: &str) -> Response {
        self.scan_body(token, json!({ "source": "raw", "content": content }))
            .await
    }

    pub async fn scan_body(&self, token: &str, body: Value) -> Response {
        self.client
            .post(self.url("/api/scan"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// Every model call answers with `content`.
    pub async fn model_replies(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            })))
            .mount(&self.model)
            .await;
    }

    pub async fn model_calls(&self) -> usize {
        self.model.received_requests().await.map_or(0, |r| r.len())
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config(oauth: &MockServer, model: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();

    config.auth.jwt_secret = "integration-test-signing-key-0123456789".to_string();
    config.auth.hash_memory_kib = 1024;
    config.auth.hash_iterations = 1;
    config.auth.hash_parallelism = 1;

    config.oauth.client_id = "test-client".to_string();
    config.oauth.client_secret = "test-client-secret".to_string();
    config.oauth.redirect_url = "http://gateway.test/api/auth/google/callback".to_string();
    config.oauth.frontend_url = FRONTEND_URL.to_string();
    config.oauth.authorization_endpoint = format!("{}/authorize", oauth.uri());
    config.oauth.token_endpoint = format!("{}/token", oauth.uri());
    config.oauth.userinfo_endpoint = format!("{}/userinfo", oauth.uri());

    config.analysis.api_url = format!("{}/chat/completions", model.uri());
    config.analysis.api_key = "test-model-key".to_string();
    config.analysis.request_timeout_secs = 5;

    config
}

async fn mount_oauth_provider(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "provider-access-token",
            "token_type": "Bearer",
            "expires_in": 3599
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": EXTERNAL_ID,
            "email": EMAIL
        })))
        .mount(server)
        .await;
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("redirect without Location")
}

pub fn query_value(url: &url::Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Stores where only the counter side is broken.
pub fn stores_with_unreachable_counters() -> Stores {
    let credentials: Arc<dyn CredentialStore> = Arc::new(MemoryStore::new());
    Stores {
        counters: Arc::new(UnreachableCounters),
        credentials,
    }
}
