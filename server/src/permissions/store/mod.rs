//! Assignment Store
//!
//! Authoritative source of (actor, permission, object) triples. Two
//! access patterns must stay cheap: by actor ("what can this user do")
//! and by object ("who can access this object").
//!
//! Cascade deletes leave a tombstone for the deleted object or actor, and
//! grants on a tombstoned key are rejected. Tombstones are retained until
//! [`AssignmentStore::purge_tombstones`] drops them.
//!
//! - [`PgAssignmentStore`]: `PostgreSQL`, used in production
//! - [`MemoryAssignmentStore`]: in-process, used for tests and development

mod memory;
mod postgres;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

pub use memory::MemoryAssignmentStore;
pub use postgres::PgAssignmentStore;

use super::error::{RbacError, RbacResult};
use super::types::{Actor, Assignment, ObjectReference, Permission, TypeDescriptor};

/// Conjunctive listing filter. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub actor: Option<Actor>,
    pub object_type: Option<TypeDescriptor>,
    pub object_pk: Option<String>,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.actor.is_none_or(|actor| assignment.actor == actor)
            && self.object_type.as_ref().is_none_or(|t| {
                assignment.object_reference.type_descriptor.id == t.id
            })
            && self
                .object_pk
                .as_deref()
                .is_none_or(|pk| assignment.object_reference.object_pk == pk)
    }
}

/// Window into an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

impl PageRequest {
    /// Page `page` (1-based) of `page_size` rows.
    pub const fn new(page: u64, page_size: u64) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// One page of a listing and the number of rows across all pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub total: u64,
    pub items: Vec<T>,
}

/// A permission can only be granted on objects of the type it belongs to.
pub(crate) fn ensure_permission_applies(
    permission: &Permission,
    object: &ObjectReference,
) -> RbacResult<()> {
    if permission.type_descriptor.id == object.type_descriptor.id {
        Ok(())
    } else {
        Err(RbacError::validation(
            "permission",
            format!(
                "'{}' applies to {}, not {}",
                permission.codename, permission.type_descriptor, object.type_descriptor
            ),
        ))
    }
}

/// Storage seam for assignments.
///
/// Implementations must make `grant` idempotent and atomic, and must
/// serialize cascades against grants on the same object or actor so that
/// no grant survives a cascade delete. Results are ordered by grant time.
pub trait AssignmentStore: Send + Sync {
    /// Grant a permission. Returns the existing assignment if already granted.
    fn grant<'a>(
        &'a self,
        actor: Actor,
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<Assignment>>;

    /// Remove an assignment, or fail with `AssignmentNotFound`.
    fn revoke<'a>(
        &'a self,
        actor: Actor,
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<()>>;

    /// List assignments matching every set field of `filter`.
    fn list(&self, filter: AssignmentFilter) -> BoxFuture<'_, RbacResult<Vec<Assignment>>>;

    /// One page of assignments matching `filter`, in grant order.
    fn list_page(
        &self,
        filter: AssignmentFilter,
        page: PageRequest,
    ) -> BoxFuture<'_, RbacResult<Page<Assignment>>>;

    /// Whether any of `actors` holds `permission` on `object`.
    fn contains_any<'a>(
        &'a self,
        actors: &'a [Actor],
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<bool>>;

    /// Remove all assignments on a deleted object. Returns the count removed.
    fn cascade_delete_object<'a>(
        &'a self,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<u64>>;

    /// Remove all assignments held by a deleted actor. Returns the count removed.
    fn cascade_delete_actor(&self, actor: Actor) -> BoxFuture<'_, RbacResult<u64>>;

    /// Drop cascade tombstones recorded before `cutoff`. Returns the count dropped.
    ///
    /// Tombstones are otherwise kept forever, so a reused object key or
    /// actor id stays blocked until purged.
    fn purge_tombstones(&self, cutoff: DateTime<Utc>) -> BoxFuture<'_, RbacResult<u64>>;

    /// Assignments held by `actor`, optionally narrowed by type and key.
    fn list_by_actor(
        &self,
        actor: Actor,
        object_type: Option<TypeDescriptor>,
        object_pk: Option<String>,
    ) -> BoxFuture<'_, RbacResult<Vec<Assignment>>> {
        self.list(AssignmentFilter {
            actor: Some(actor),
            object_type,
            object_pk,
        })
    }

    /// Assignments on one object.
    fn list_by_object(
        &self,
        object: &ObjectReference,
    ) -> BoxFuture<'_, RbacResult<Vec<Assignment>>> {
        self.list(AssignmentFilter {
            actor: None,
            object_type: Some(object.type_descriptor.clone()),
            object_pk: Some(object.object_pk.clone()),
        })
    }
}
