//! Core types for object-level permissions.
//!
//! An assignment binds one [`Actor`] to one [`Permission`] on one
//! [`ObjectReference`]. Object references are polymorphic: a registered
//! [`TypeDescriptor`] plus the target's primary key as an opaque string.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for deriving stable type and permission ids.
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b3e_2f0a_4c1d_4e8b_9a57_1f2d_3c4b_5a69);

/// Separator between namespace and type name in a type identifier.
pub const TYPE_SEPARATOR: char = '.';

/// Registered identity of a polymorphic entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Stable id, derived from the lowercase identifier.
    pub id: Uuid,
    /// Owning application module, e.g. `authentik_core`.
    pub namespace: String,
    /// Entity kind within the namespace, e.g. `application`.
    pub type_name: String,
}

impl TypeDescriptor {
    /// Build a descriptor. The id depends only on the case-folded pair.
    pub fn new(namespace: impl Into<String>, type_name: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let type_name = type_name.into();
        let id = Uuid::new_v5(
            &ID_NAMESPACE,
            type_key(&namespace, &type_name).as_bytes(),
        );
        Self {
            id,
            namespace,
            type_name,
        }
    }

    /// The `namespace.type_name` identifier as registered.
    pub fn identifier(&self) -> String {
        format!("{}{TYPE_SEPARATOR}{}", self.namespace, self.type_name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{TYPE_SEPARATOR}{}", self.namespace, self.type_name)
    }
}

/// Case-folded lookup key for a type.
pub(crate) fn type_key(namespace: &str, type_name: &str) -> String {
    format!(
        "{}{TYPE_SEPARATOR}{}",
        namespace.to_lowercase(),
        type_name.to_lowercase()
    )
}

/// A grantable capability, scoped to exactly one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    /// Unique within its type, e.g. `view_application`.
    pub codename: String,
    pub display_name: String,
    pub type_descriptor: TypeDescriptor,
}

impl Permission {
    pub(crate) fn derive_id(type_descriptor: &TypeDescriptor, codename: &str) -> Uuid {
        Uuid::new_v5(&type_descriptor.id, codename.as_bytes())
    }
}

/// Database representation of the actor discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "actor_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    User,
    Group,
}

/// A user or group capable of holding permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Actor {
    User(Uuid),
    Group(Uuid),
}

impl Actor {
    /// Rebuild an actor from its persisted columns.
    pub const fn from_parts(kind: ActorKind, id: Uuid) -> Self {
        match kind {
            ActorKind::User => Self::User(id),
            ActorKind::Group => Self::Group(id),
        }
    }

    pub const fn kind(&self) -> ActorKind {
        match self {
            Self::User(_) => ActorKind::User,
            Self::Group(_) => ActorKind::Group,
        }
    }

    pub const fn id(&self) -> Uuid {
        match self {
            Self::User(id) | Self::Group(id) => *id,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Group(id) => write!(f, "group:{id}"),
        }
    }
}

/// Polymorphic pointer to any entity in the platform.
///
/// Existence of the target is not enforced; see
/// [`Authorizer::check_reference`](super::Authorizer::check_reference).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    pub type_descriptor: TypeDescriptor,
    pub object_pk: String,
}

impl ObjectReference {
    pub fn new(type_descriptor: TypeDescriptor, object_pk: impl Into<String>) -> Self {
        Self {
            type_descriptor,
            object_pk: object_pk.into(),
        }
    }
}

impl fmt::Display for ObjectReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_descriptor, self.object_pk)
    }
}

/// A persisted grant of one permission to one actor on one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub actor: Actor,
    pub permission: Permission,
    pub object_reference: ObjectReference,
    pub granted_at: DateTime<Utc>,
}
