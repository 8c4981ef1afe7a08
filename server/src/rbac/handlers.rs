//! Object Permission HTTP Handlers
//!
//! Read endpoints for types, permissions and assignments, plus grant,
//! revoke, check and the cascade hooks called when the platform deletes
//! an object or an actor.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::AppState;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::permissions::{Actor, AssignmentQuery, PageRequest, RbacError};

use super::error::invalid_body;
use super::types::{
    actor_from_query, AssignmentPage, AssignmentRequest, AssignmentResponse, CascadeActorRequest,
    CascadeResponse, CheckPermissionParams, CheckPermissionResponse, ListAssignmentsParams,
    ListPermissionsParams, ObjectBody, PermissionResponse, TypeResponse,
};

// ============================================================================
// Schema
// ============================================================================

/// List registered object types.
///
/// GET /api/rbac/types
#[utoipa::path(
    get,
    path = "/api/rbac/types",
    tag = "rbac",
    responses(
        (status = 200, body = Vec<TypeResponse>),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn list_types(State(state): State<AppState>) -> Json<Vec<TypeResponse>> {
    Json(
        state
            .authz
            .schema()
            .types
            .iter()
            .map(TypeResponse::from)
            .collect(),
    )
}

/// List grantable permissions, optionally for one type.
///
/// GET /api/rbac/permissions
#[utoipa::path(
    get,
    path = "/api/rbac/permissions",
    tag = "rbac",
    params(ListPermissionsParams),
    responses(
        (status = 200, body = Vec<PermissionResponse>),
        (status = 400, description = "Malformed type identifier"),
        (status = 404, description = "Type not registered"),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(params): Query<ListPermissionsParams>,
) -> Result<Json<Vec<PermissionResponse>>, RbacError> {
    let catalog = &state.authz.schema().permissions;

    let permissions = match params.object_type.as_deref() {
        Some(identifier) => {
            let filter = state.authz.filter_by_type(identifier)?;
            catalog
                .list(filter.descriptor())
                .map(PermissionResponse::from)
                .collect()
        }
        None => catalog.iter().map(PermissionResponse::from).collect(),
    };

    Ok(Json(permissions))
}

// ============================================================================
// Assignments
// ============================================================================

/// List assignments matching every supplied filter, oldest grant first.
///
/// GET /api/rbac/assignments
#[utoipa::path(
    get,
    path = "/api/rbac/assignments",
    tag = "rbac",
    params(ListAssignmentsParams),
    responses(
        (status = 200, body = AssignmentPage),
        (status = 400, description = "Invalid filter or pagination"),
        (status = 404, description = "Type not registered"),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn list_assignments(
    State(state): State<AppState>,
    Query(params): Query<ListAssignmentsParams>,
) -> Result<Json<AssignmentPage>, RbacError> {
    let page = params.page.unwrap_or(1);
    if page == 0 {
        return Err(RbacError::validation("page", "must be at least 1"));
    }
    let page_size = params
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .min(state.config.max_page_size);
    if page_size == 0 {
        return Err(RbacError::validation("page_size", "must be at least 1"));
    }

    let query = AssignmentQuery {
        actor: actor_from_query(params.user, params.group)?,
        object_type: params.object_type,
        object_pk: params.object_pk,
    };
    let assignments = state
        .authz
        .query_assignments_page(&query, PageRequest::new(page, page_size))
        .await?;

    let count = assignments.total;
    let results = assignments
        .items
        .into_iter()
        .map(AssignmentResponse::from)
        .collect();

    Ok(Json(AssignmentPage {
        count,
        page,
        page_size,
        results,
    }))
}

/// Grant a permission on an object. Granting twice returns the existing assignment.
///
/// POST /api/rbac/assignments
#[utoipa::path(
    post,
    path = "/api/rbac/assignments",
    tag = "rbac",
    request_body = AssignmentRequest,
    responses(
        (status = 200, body = AssignmentResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Type or permission not found"),
        (status = 409, description = "Object or actor has been deleted"),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn grant_assignment(
    State(state): State<AppState>,
    Json(request): Json<AssignmentRequest>,
) -> Result<Json<AssignmentResponse>, RbacError> {
    request.validate().map_err(|e| invalid_body(&e))?;

    let object = state
        .authz
        .object(&request.object.object_type, &request.object.object_pk)?;
    let assignment = state
        .authz
        .grant(request.actor.into(), &request.permission, &object)
        .await?;

    Ok(Json(AssignmentResponse::from(assignment)))
}

/// Revoke a permission on an object.
///
/// POST /api/rbac/assignments/revoke
#[utoipa::path(
    post,
    path = "/api/rbac/assignments/revoke",
    tag = "rbac",
    request_body = AssignmentRequest,
    responses(
        (status = 204, description = "Assignment removed"),
        (status = 404, description = "No such assignment"),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn revoke_assignment(
    State(state): State<AppState>,
    Json(request): Json<AssignmentRequest>,
) -> Result<StatusCode, RbacError> {
    request.validate().map_err(|e| invalid_body(&e))?;

    let object = state
        .authz
        .object(&request.object.object_type, &request.object.object_pk)?;
    state
        .authz
        .revoke(request.actor.into(), &request.permission, &object)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Whether an actor holds a permission on an object, counting group grants for users.
///
/// GET /api/rbac/check
#[utoipa::path(
    get,
    path = "/api/rbac/check",
    tag = "rbac",
    params(CheckPermissionParams),
    responses(
        (status = 200, body = CheckPermissionResponse),
        (status = 400, description = "Missing actor or invalid object"),
        (status = 404, description = "Type or permission not found"),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn check_permission(
    State(state): State<AppState>,
    Query(params): Query<CheckPermissionParams>,
) -> Result<Json<CheckPermissionResponse>, RbacError> {
    let actor = actor_from_query(params.user, params.group)?
        .ok_or_else(|| RbacError::validation("user", "one of 'user' or 'group' is required"))?;
    let object = state.authz.object(&params.object_type, &params.object_pk)?;

    let allowed = state
        .authz
        .has_permission(actor, &params.permission, &object)
        .await?;

    Ok(Json(CheckPermissionResponse { allowed }))
}

// ============================================================================
// Cascades
// ============================================================================

/// Remove every assignment on a deleted object.
///
/// POST /api/rbac/cascade/object
#[utoipa::path(
    post,
    path = "/api/rbac/cascade/object",
    tag = "rbac",
    request_body = ObjectBody,
    responses(
        (status = 200, body = CascadeResponse),
        (status = 400, description = "Invalid object"),
        (status = 404, description = "Type not registered"),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn cascade_object(
    State(state): State<AppState>,
    Json(request): Json<ObjectBody>,
) -> Result<Json<CascadeResponse>, RbacError> {
    request.validate().map_err(|e| invalid_body(&e))?;

    let object = state.authz.object(&request.object_type, &request.object_pk)?;
    let removed = state.authz.cascade_delete_object(&object).await?;

    Ok(Json(CascadeResponse { removed }))
}

/// Remove every assignment held by a deleted user or group.
///
/// POST /api/rbac/cascade/actor
#[utoipa::path(
    post,
    path = "/api/rbac/cascade/actor",
    tag = "rbac",
    request_body = CascadeActorRequest,
    responses(
        (status = 200, body = CascadeResponse),
    ),
)]
#[tracing::instrument(skip(state))]
pub async fn cascade_actor(
    State(state): State<AppState>,
    Json(request): Json<CascadeActorRequest>,
) -> Result<Json<CascadeResponse>, RbacError> {
    let actor = Actor::from(request.actor);
    let removed = state.authz.cascade_delete_actor(actor).await?;

    Ok(Json(CascadeResponse { removed }))
}
