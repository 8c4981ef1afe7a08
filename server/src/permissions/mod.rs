//! Object-level permission system.
//!
//! Grants a specific permission on a specific object to a user or group:
//! - Type Registry: polymorphic object types (`namespace.type_name`)
//! - Permission Catalog: grantable, type-scoped permissions
//! - Assignment Store: persisted (actor, permission, object) triples
//! - Authorizer: permission checks and filtered assignment queries

pub mod authorizer;
pub mod catalog;
pub mod error;
pub mod membership;
pub mod registry;
pub mod schema;
pub mod store;
pub mod types;

pub use authorizer::{AssignmentQuery, Authorizer, ObjectDirectory, TypeFilter};
pub use catalog::PermissionCatalog;
pub use error::{RbacError, RbacResult};
pub use membership::{GroupMembership, PgGroupMembership, StaticMembership};
pub use registry::{parse_identifier, TypeRegistry};
pub use schema::{Schema, SchemaDefinition};
pub use store::{
    AssignmentFilter, AssignmentStore, MemoryAssignmentStore, Page, PageRequest, PgAssignmentStore,
};
pub use types::{Actor, ActorKind, Assignment, ObjectReference, Permission, TypeDescriptor};
