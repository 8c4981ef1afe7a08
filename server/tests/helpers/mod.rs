//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for sending requests through the full axum router
//! backed by the in-memory assignment store.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;
use warden_server::api::{create_router, AppState};
use warden_server::config::Config;
use warden_server::permissions::{
    Authorizer, MemoryAssignmentStore, Schema, SchemaDefinition, StaticMembership,
};

/// Member of [`GROUP_ID`] in every `TestApp`.
pub const MEMBER_ID: Uuid = Uuid::from_u128(0x1111);
pub const GROUP_ID: Uuid = Uuid::from_u128(0x2222);

/// Schema with `app.widget` (defaults plus `share_widget`) and `app.gadget`.
pub fn test_schema() -> Schema {
    let definition: SchemaDefinition = serde_json::from_value(serde_json::json!({
        "types": [
            {
                "namespace": "app",
                "type_name": "Widget",
                "permissions": [{ "codename": "share_widget", "display_name": "Can share widget" }]
            },
            { "namespace": "app", "type_name": "Gadget" }
        ]
    }))
    .expect("Invalid test schema");
    Schema::build(&definition).expect("Failed to build test schema")
}

pub struct TestApp {
    pub router: Router,
    pub authz: Authorizer,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a test app with a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_config(Config::default_for_test())
    }

    /// Create a test app with a custom config (for pagination limits).
    pub fn with_config(config: Config) -> Self {
        let authz = Authorizer::new(
            Arc::new(test_schema()),
            Arc::new(MemoryAssignmentStore::new()),
            Arc::new(StaticMembership::new().with_member(GROUP_ID, MEMBER_ID)),
        );
        let state = AppState::new(authz.clone(), config.clone());

        Self {
            router: create_router(state),
            authz,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// GET `uri`.
    pub async fn get(&self, uri: &str) -> Response<Body> {
        let req = Self::request(Method::GET, uri)
            .body(Body::empty())
            .unwrap();
        self.oneshot(req).await
    }

    /// POST `body` as JSON to `uri`.
    pub async fn post_json(&self, uri: &str, body: &serde_json::Value) -> Response<Body> {
        let req = Self::request(Method::POST, uri)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap();
        self.oneshot(req).await
    }

    /// Grant through the API and assert success.
    pub async fn grant(&self, body: &serde_json::Value) -> serde_json::Value {
        let resp = self.post_json("/api/rbac/assignments", body).await;
        assert_eq!(resp.status(), 200, "grant should succeed");
        body_to_json(resp).await
    }
}

/// Request body for a grant or revoke.
pub fn assignment_body(kind: &str, actor_id: Uuid, permission: &str, object_type: &str, pk: &str) -> serde_json::Value {
    serde_json::json!({
        "actor": { "kind": kind, "id": actor_id },
        "permission": permission,
        "object": { "type": object_type, "object_pk": pk }
    })
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
