//! Object Permission API
//!
//! HTTP surface over the [`Authorizer`](crate::permissions::Authorizer).

pub mod error;
pub mod handlers;
pub mod types;

use axum::routing::{get, post};
use axum::Router;

use crate::api::AppState;

/// Create object permission routes.
///
/// Mounted at `/api/rbac` in the main router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/types", get(handlers::list_types))
        .route("/permissions", get(handlers::list_permissions))
        .route(
            "/assignments",
            get(handlers::list_assignments).post(handlers::grant_assignment),
        )
        .route("/assignments/revoke", post(handlers::revoke_assignment))
        .route("/check", get(handlers::check_permission))
        .route("/cascade/object", post(handlers::cascade_object))
        .route("/cascade/actor", post(handlers::cascade_actor))
}
