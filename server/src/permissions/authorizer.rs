//! Authorization query engine.
//!
//! Answers actor-centric and object-centric questions on top of the
//! [`AssignmentStore`], resolving type identifiers through the registry and
//! codenames through the catalog. Holds no state of its own.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tracing::{info, warn};

use super::error::{RbacError, RbacResult};
use super::membership::GroupMembership;
use super::schema::Schema;
use super::store::{AssignmentFilter, AssignmentStore, Page, PageRequest};
use super::types::{Actor, Assignment, ObjectReference, Permission, TypeDescriptor};

/// Owner of concrete entities, used to detect dangling object references.
pub trait ObjectDirectory: Send + Sync {
    /// Whether the entity behind `object` still exists.
    fn exists<'a>(&'a self, object: &'a ObjectReference) -> BoxFuture<'a, RbacResult<bool>>;
}

/// Predicate matching object references of one registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeFilter {
    descriptor: TypeDescriptor,
}

impl TypeFilter {
    pub const fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn matches(&self, object: &ObjectReference) -> bool {
        object.type_descriptor.id == self.descriptor.id
    }
}

/// Conjunctive filters for [`Authorizer::query_assignments`].
#[derive(Debug, Clone, Default)]
pub struct AssignmentQuery {
    pub actor: Option<Actor>,
    /// `namespace.type_name`
    pub object_type: Option<String>,
    pub object_pk: Option<String>,
}

/// Object permission query engine.
#[derive(Clone)]
pub struct Authorizer {
    schema: Arc<Schema>,
    store: Arc<dyn AssignmentStore>,
    membership: Arc<dyn GroupMembership>,
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("types", &self.schema.types.len())
            .field("permissions", &self.schema.permissions.len())
            .finish_non_exhaustive()
    }
}

impl Authorizer {
    pub fn new(
        schema: Arc<Schema>,
        store: Arc<dyn AssignmentStore>,
        membership: Arc<dyn GroupMembership>,
    ) -> Self {
        Self {
            schema,
            store,
            membership,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &dyn AssignmentStore {
        self.store.as_ref()
    }

    /// Build an object reference from a type identifier and primary key.
    pub fn object(&self, type_identifier: &str, object_pk: &str) -> RbacResult<ObjectReference> {
        if object_pk.is_empty() {
            return Err(RbacError::validation("object_pk", "must not be empty"));
        }
        let descriptor = self.schema.types.parse(type_identifier)?;
        Ok(ObjectReference::new(descriptor.clone(), object_pk))
    }

    /// Resolve a codename within the type of `object`.
    pub fn permission(&self, codename: &str, object: &ObjectReference) -> RbacResult<&Permission> {
        self.schema
            .permissions
            .lookup(&object.type_descriptor, codename)
    }

    /// Parse a type identifier into a predicate over object references.
    pub fn filter_by_type(&self, identifier: &str) -> RbacResult<TypeFilter> {
        let descriptor = self.schema.types.parse(identifier)?;
        Ok(TypeFilter {
            descriptor: descriptor.clone(),
        })
    }

    /// Whether `actor` holds `codename` on `object`.
    ///
    /// For users, grants to any group the user belongs to also count.
    #[tracing::instrument(skip(self, object), fields(object = %object))]
    pub async fn has_permission(
        &self,
        actor: Actor,
        codename: &str,
        object: &ObjectReference,
    ) -> RbacResult<bool> {
        let permission = self.permission(codename, object)?;

        let mut actors = vec![actor];
        if let Actor::User(user_id) = actor {
            let groups = self.membership.groups_of(user_id).await?;
            actors.extend(groups.into_iter().map(Actor::Group));
        }

        self.store.contains_any(&actors, permission, object).await
    }

    fn assignment_filter(&self, query: &AssignmentQuery) -> RbacResult<AssignmentFilter> {
        let type_filter = query
            .object_type
            .as_deref()
            .map(|identifier| self.filter_by_type(identifier))
            .transpose()?;

        Ok(AssignmentFilter {
            actor: query.actor,
            object_type: type_filter.map(|filter| filter.descriptor),
            object_pk: query.object_pk.clone(),
        })
    }

    /// List assignments matching every supplied filter.
    #[tracing::instrument(skip(self))]
    pub async fn query_assignments(&self, query: &AssignmentQuery) -> RbacResult<Vec<Assignment>> {
        let filter = self.assignment_filter(query)?;
        self.store.list(filter).await
    }

    /// One page of [`Self::query_assignments`], with the total match count.
    #[tracing::instrument(skip(self))]
    pub async fn query_assignments_page(
        &self,
        query: &AssignmentQuery,
        page: PageRequest,
    ) -> RbacResult<Page<Assignment>> {
        let filter = self.assignment_filter(query)?;
        self.store.list_page(filter, page).await
    }

    /// Grant `codename` on `object` to `actor`. Idempotent.
    #[tracing::instrument(skip(self, object), fields(object = %object))]
    pub async fn grant(
        &self,
        actor: Actor,
        codename: &str,
        object: &ObjectReference,
    ) -> RbacResult<Assignment> {
        let permission = self.permission(codename, object)?;
        let assignment = self.store.grant(actor, permission, object).await?;

        info!(
            assignment_id = %assignment.id,
            actor = %actor,
            permission = %codename,
            object = %object,
            "Object permission granted"
        );
        Ok(assignment)
    }

    /// Revoke `codename` on `object` from `actor`.
    #[tracing::instrument(skip(self, object), fields(object = %object))]
    pub async fn revoke(
        &self,
        actor: Actor,
        codename: &str,
        object: &ObjectReference,
    ) -> RbacResult<()> {
        let permission = self.permission(codename, object)?;
        self.store.revoke(actor, permission, object).await?;

        info!(
            actor = %actor,
            permission = %codename,
            object = %object,
            "Object permission revoked"
        );
        Ok(())
    }

    /// Drop every assignment on an object the platform has deleted.
    #[tracing::instrument(skip(self, object), fields(object = %object))]
    pub async fn cascade_delete_object(&self, object: &ObjectReference) -> RbacResult<u64> {
        let removed = self.store.cascade_delete_object(object).await?;
        info!(object = %object, removed, "Cascaded object deletion");
        Ok(removed)
    }

    /// Drop every assignment held by an actor the platform has deleted.
    #[tracing::instrument(skip(self))]
    pub async fn cascade_delete_actor(&self, actor: Actor) -> RbacResult<u64> {
        let removed = self.store.cascade_delete_actor(actor).await?;
        info!(actor = %actor, removed, "Cascaded actor deletion");
        Ok(removed)
    }

    /// Forget cascade tombstones older than `cutoff`, letting their keys be granted again.
    #[tracing::instrument(skip(self))]
    pub async fn purge_tombstones(&self, cutoff: DateTime<Utc>) -> RbacResult<u64> {
        let purged = self.store.purge_tombstones(cutoff).await?;
        info!(%cutoff, purged, "Purged cascade tombstones");
        Ok(purged)
    }

    /// Fail with `DanglingReference` if the target of `object` is gone.
    pub async fn check_reference(
        &self,
        object: &ObjectReference,
        directory: &dyn ObjectDirectory,
    ) -> RbacResult<()> {
        if directory.exists(object).await? {
            Ok(())
        } else {
            Err(RbacError::DanglingReference(object.to_string()))
        }
    }

    /// Assignments whose target object no longer exists.
    ///
    /// Dangling assignments are reported, never removed here.
    pub async fn find_dangling(
        &self,
        assignments: &[Assignment],
        directory: &dyn ObjectDirectory,
    ) -> RbacResult<Vec<Assignment>> {
        let mut dangling = Vec::new();
        for assignment in assignments {
            match self
                .check_reference(&assignment.object_reference, directory)
                .await
            {
                Ok(()) => {}
                Err(RbacError::DanglingReference(object)) => {
                    warn!(assignment_id = %assignment.id, object = %object, "Dangling object reference");
                    dangling.push(assignment.clone());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(dangling)
    }
}
