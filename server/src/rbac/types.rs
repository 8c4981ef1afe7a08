//! Object Permission Request/Response Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::permissions::{Actor, Assignment, ObjectReference, Permission, RbacError, TypeDescriptor};

// ============================================================================
// Shared Shapes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActorKindBody {
    User,
    Group,
}

/// Actor discriminated as user or group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct ActorBody {
    pub kind: ActorKindBody,
    pub id: Uuid,
}

impl From<ActorBody> for Actor {
    fn from(body: ActorBody) -> Self {
        match body.kind {
            ActorKindBody::User => Self::User(body.id),
            ActorKindBody::Group => Self::Group(body.id),
        }
    }
}

impl From<Actor> for ActorBody {
    fn from(actor: Actor) -> Self {
        match actor {
            Actor::User(id) => Self {
                kind: ActorKindBody::User,
                id,
            },
            Actor::Group(id) => Self {
                kind: ActorKindBody::Group,
                id,
            },
        }
    }
}

/// Object addressed by type identifier and primary key.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ObjectBody {
    /// `namespace.type_name`
    #[serde(rename = "type")]
    #[validate(length(min = 3, max = 255))]
    pub object_type: String,
    #[validate(length(min = 1, max = 255))]
    pub object_pk: String,
}

/// Resolve an optional `user`/`group` query pair into an actor.
pub fn actor_from_query(user: Option<Uuid>, group: Option<Uuid>) -> Result<Option<Actor>, RbacError> {
    match (user, group) {
        (Some(_), Some(_)) => Err(RbacError::validation(
            "user",
            "'user' and 'group' filters are mutually exclusive",
        )),
        (Some(id), None) => Ok(Some(Actor::User(id))),
        (None, Some(id)) => Ok(Some(Actor::Group(id))),
        (None, None) => Ok(None),
    }
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPermissionsParams {
    /// Only permissions of this `namespace.type_name`
    #[serde(rename = "type")]
    pub object_type: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAssignmentsParams {
    /// Assignments held by this user
    pub user: Option<Uuid>,
    /// Assignments held by this group
    pub group: Option<Uuid>,
    /// Objects of this `namespace.type_name`
    #[serde(rename = "type")]
    pub object_type: Option<String>,
    /// Exact object primary key
    pub object_pk: Option<String>,
    /// 1-based page number
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckPermissionParams {
    pub user: Option<Uuid>,
    pub group: Option<Uuid>,
    /// Permission codename
    pub permission: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub object_pk: String,
}

/// Grant or revoke one permission on one object.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AssignmentRequest {
    pub actor: ActorBody,
    /// Permission codename, scoped to the object's type
    #[validate(length(min = 1, max = 100))]
    pub permission: String,
    #[validate(nested)]
    pub object: ObjectBody,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CascadeActorRequest {
    pub actor: ActorBody,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct TypeResponse {
    pub id: Uuid,
    pub namespace: String,
    pub type_name: String,
    /// `namespace.type_name`
    pub identifier: String,
}

impl From<&TypeDescriptor> for TypeResponse {
    fn from(descriptor: &TypeDescriptor) -> Self {
        Self {
            id: descriptor.id,
            namespace: descriptor.namespace.clone(),
            type_name: descriptor.type_name.clone(),
            identifier: descriptor.identifier(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionResponse {
    pub id: Uuid,
    pub codename: String,
    /// Display name
    pub name: String,
    /// Owning type, `namespace.type_name`
    #[serde(rename = "type")]
    pub object_type: String,
}

impl From<&Permission> for PermissionResponse {
    fn from(permission: &Permission) -> Self {
        Self {
            id: permission.id,
            codename: permission.codename.clone(),
            name: permission.display_name.clone(),
            object_type: permission.type_descriptor.identifier(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PermissionSummary {
    pub id: Uuid,
    pub codename: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ObjectReferenceResponse {
    pub namespace: String,
    pub type_name: String,
    pub object_pk: String,
}

impl From<ObjectReference> for ObjectReferenceResponse {
    fn from(object: ObjectReference) -> Self {
        Self {
            namespace: object.type_descriptor.namespace,
            type_name: object.type_descriptor.type_name,
            object_pk: object.object_pk,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub actor: ActorBody,
    pub permission: PermissionSummary,
    pub object_reference: ObjectReferenceResponse,
    pub granted_at: DateTime<Utc>,
}

impl From<Assignment> for AssignmentResponse {
    fn from(assignment: Assignment) -> Self {
        Self {
            id: assignment.id,
            actor: assignment.actor.into(),
            permission: PermissionSummary {
                id: assignment.permission.id,
                codename: assignment.permission.codename,
                name: assignment.permission.display_name,
            },
            object_reference: assignment.object_reference.into(),
            granted_at: assignment.granted_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentPage {
    /// Total matching assignments across all pages
    pub count: u64,
    pub page: u64,
    pub page_size: u64,
    pub results: Vec<AssignmentResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPermissionResponse {
    pub allowed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CascadeResponse {
    /// Number of assignments removed
    pub removed: u64,
}
