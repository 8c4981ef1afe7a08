//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::Config, permissions::Authorizer, rbac};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Object permission query engine
    pub authz: Authorizer,
    /// Server configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(authz: Authorizer, config: Config) -> Self {
        Self {
            authz,
            config: Arc::new(config),
        }
    }
}

/// `OpenAPI` document for the object permission endpoints.
#[derive(OpenApi)]
#[openapi(
    info(title = "Warden", description = "Object-level permission assignments and checks"),
    paths(
        rbac::handlers::list_types,
        rbac::handlers::list_permissions,
        rbac::handlers::list_assignments,
        rbac::handlers::grant_assignment,
        rbac::handlers::revoke_assignment,
        rbac::handlers::check_permission,
        rbac::handlers::cascade_object,
        rbac::handlers::cascade_actor,
    ),
    tags((name = "rbac", description = "Object permissions")),
)]
pub struct ApiDoc;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/rbac", rbac::router())
        // API documentation
        .merge(api_docs())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        // State
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    /// Service status
    status: &'static str,
    /// Registered object types
    types: usize,
}

/// Health check endpoint.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        types: state.authz.schema().types.len(),
    })
}

/// API documentation routes.
fn api_docs() -> Router<AppState> {
    Router::new().merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))
}
