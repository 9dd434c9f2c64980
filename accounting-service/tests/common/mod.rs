//! Shared setup for the router-level tests: in-memory credential and
//! session stores, a file-less local identity provider and request helpers.

#![allow(dead_code)]

use accounting_service::{
    build_router,
    config::{
        AccountingConfig, AdminConfig, DatabaseConfig, Environment, IdOffsets, IdentityBackend,
        IdentityConfig, SecurityConfig, SessionBackend, SessionConfig, StoreBackend,
        SuperAdminProof, TokenConfig,
    },
    identity::local::{LocalAccount, LocalProvider},
    secrets::digest_secret,
    services::MemorySessionStore,
    store::MemoryCredentialStore,
    utils::hash_password,
    AppState,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN_ACCESS: &str = "root";
pub const ADMIN_SECRET: &str = "root-secret";
pub const USER_PASSWORD: &str = "correct horse battery staple";

/// Directory users known to the local provider. Provisioned on first login.
pub const JANE: &str = "jane.doe@example.org";
pub const BOB: &str = "bob.ross@example.org";
pub const CARL: &str = "carl.sagan@example.org";
/// Member of the configured administrator group.
pub const OPS: &str = "ops.lead@example.org";

pub const GID_INIT: i64 = 10000;
pub const UID_INIT: i64 = 20000;

pub fn test_config(lifetime_seconds: i64) -> AccountingConfig {
    AccountingConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "accounting-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        request_timeout_ms: 2000,
        database: DatabaseConfig {
            backend: StoreBackend::Memory,
            url: None,
            max_connections: 1,
        },
        session: SessionConfig {
            backend: SessionBackend::Memory,
            redis_url: None,
        },
        token: TokenConfig {
            secret: "integration-test-secret-0123456789abcdef".to_string(),
            issuer: "accounting-center".to_string(),
            lifetime_seconds,
            algorithm: "HS256".to_string(),
        },
        admin: AdminConfig {
            access: ADMIN_ACCESS.to_string(),
            secret: ADMIN_SECRET.to_string(),
            proof: SuperAdminProof::AdminsGroup,
        },
        identity: IdentityConfig {
            backend: IdentityBackend::Local,
            directory: None,
            local_credentials_file: None,
            administrator_groups: vec!["hpc-operators".to_string()],
            auto_provision: true,
        },
        ids: IdOffsets {
            gid_init: GID_INIT,
            uid_init: UID_INIT,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            login_attempts: 1000,
            login_window_seconds: 60,
            enable_swagger: false,
        },
    }
}

fn local_provider() -> LocalProvider {
    let hash = hash_password(USER_PASSWORD).expect("hash");
    let account = |username: &str, groups: &[&str]| LocalAccount {
        username: username.to_string(),
        password_hash: hash.clone(),
        full_name: None,
        groups: groups.iter().map(|g| g.to_string()).collect(),
    };

    LocalProvider::new(vec![
        account(JANE, &[]),
        account(BOB, &[]),
        account(CARL, &[]),
        account(OPS, &["CN=hpc-operators,OU=Groups,DC=example,DC=org"]),
    ])
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_lifetime(3600).await
    }

    pub async fn with_lifetime(lifetime_seconds: i64) -> Self {
        let state = AppState::new(
            test_config(lifetime_seconds),
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(local_provider()),
        )
        .expect("state");
        state.accounting.bootstrap().await.expect("bootstrap");

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(token), None).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, Some(token), None).await
    }

    /// Raw login; returns the status and body.
    pub async fn login_as(&self, username: &str, password: &str, presented: Option<&str>) -> (StatusCode, Value) {
        self.request(
            "POST",
            "/api/v1/login",
            presented,
            Some(serde_json::json!({ "username": username, "password": password })),
        )
        .await
    }

    /// Logs in and returns the bearer, panicking on failure.
    pub async fn token(&self, username: &str, password: &str) -> String {
        let (status, body) = self.login_as(username, password, None).await;
        assert_eq!(status, StatusCode::OK, "login failed for {}: {}", username, body);
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.token(ADMIN_ACCESS, &digest_secret(ADMIN_SECRET)).await
    }

    pub async fn user_token(&self, dom_name: &str) -> String {
        self.token(dom_name, USER_PASSWORD).await
    }

    /// Creates a group as the super-admin.
    pub async fn group(&self, admin: &str, name: &str) -> Value {
        let (status, body) = self
            .post("/api/v1/groups", admin, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    pub async fn add_member(&self, admin: &str, group: &str, dom_name: &str, group_admin: bool) {
        let (status, body) = self
            .put(
                &format!("/api/v1/groups/{}/members/{}?admin={}", group, dom_name, group_admin),
                admin,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }
}
