//! Test helpers for mbop-service integration tests.
//!
//! Spawns the router on a random local port backed by the in-memory store.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine};
use mbop_service::{
    build_router,
    config::{
        CatchallConfig, DatabaseConfig, DirectoryConfig, MbopConfig, StoreBackend, StoreConfig,
        TokenConfig,
    },
    store::MemoryStore,
    AppState,
};
use service_core::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/token_private.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/token_public.pem");

pub const CERT_HEADER: &str = "x-rh-certauth-cn";
pub const IDENTITY_HEADER: &str = "x-rh-identity";

pub fn test_config() -> MbopConfig {
    MbopConfig {
        common: Config::default(),
        service_name: "mbop-service-test".to_string(),
        service_version: "0.0.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        store: StoreConfig {
            backend: StoreBackend::Memory,
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                name: "mbop_test".to_string(),
                max_connections: 5,
                min_connections: 1,
            },
        },
        users_module: "mock".to_string(),
        directory: DirectoryConfig::default(),
        token: TokenConfig {
            ttl: Duration::from_secs(300),
            kid: "test-kid".to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            public_key: TEST_PUBLIC_KEY.to_string(),
        },
        catchall: CatchallConfig {
            disabled: true,
            upstream_url: None,
        },
    }
}

/// Running application bound to a random port.
pub struct TestApp {
    pub address: String,
    pub state: AppState,
    client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: MbopConfig) -> Self {
        let state = AppState::new(config, Arc::new(MemoryStore::new()))
            .expect("Failed to build app state");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        let app = build_router(state.clone());
        tokio::spawn(async move {
            service_core::axum::serve(listener, app)
                .await
                .expect("Server failed");
        });

        Self {
            address: format!("http://127.0.0.1:{}", port),
            state,
            client: reqwest::Client::new(),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers `uid` for `org_id` the way a satellite does on first contact.
    pub async fn register(&self, org_id: &str, uid: &str) -> reqwest::Response {
        self.client
            .post(self.url("/v1/registrations"))
            .header(IDENTITY_HEADER, identity_header(org_id, "admin", true))
            .header(CERT_HEADER, cert_subject(uid))
            .json(&serde_json::json!({"uid": uid, "display_name": format!("{}-display", uid)}))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Base64 `x-rh-identity` value for a user identity.
pub fn identity_header(org_id: &str, username: &str, is_org_admin: bool) -> String {
    let identity = serde_json::json!({
        "identity": {
            "org_id": org_id,
            "account_number": "5555",
            "type": "User",
            "user": {
                "username": username,
                "is_org_admin": is_org_admin,
            }
        }
    });
    encode_identity(identity)
}

/// Base64 `x-rh-identity` value for an arbitrary identity document.
pub fn encode_identity(identity: serde_json::Value) -> String {
    STANDARD.encode(identity.to_string())
}

pub fn cert_subject(cn: &str) -> String {
    format!("/O=Satellite/CN={}", cn)
}

pub async fn message(response: reqwest::Response) -> String {
    let body: serde_json::Value = response.json().await.expect("Failed to parse response");
    body["message"].as_str().unwrap_or_default().to_string()
}
