//! In-memory assignment store.
//!
//! Indexes assignments by triple, by actor and by object. A single
//! `RwLock` covers all indexes and tombstones, so grants and cascades on
//! the same key are serialized.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{ensure_permission_applies, AssignmentFilter, AssignmentStore, Page, PageRequest};
use crate::permissions::error::{RbacError, RbacResult};
use crate::permissions::types::{Actor, Assignment, ObjectReference, Permission};

/// (`type_id`, `object_pk`)
type ObjectKey = (Uuid, String);
/// (actor, `permission_id`, `type_id`, `object_pk`)
type TripleKey = (Actor, Uuid, Uuid, String);

fn object_key(object: &ObjectReference) -> ObjectKey {
    (object.type_descriptor.id, object.object_pk.clone())
}

fn triple_key(actor: Actor, permission: &Permission, object: &ObjectReference) -> TripleKey {
    (
        actor,
        permission.id,
        object.type_descriptor.id,
        object.object_pk.clone(),
    )
}

#[derive(Debug, Default)]
struct Inner {
    /// Rows keyed by insertion sequence, which gives grant order.
    rows: BTreeMap<u64, Assignment>,
    next_seq: u64,
    by_triple: HashMap<TripleKey, u64>,
    by_actor: HashMap<Actor, BTreeSet<u64>>,
    by_object: HashMap<ObjectKey, BTreeSet<u64>>,
    /// Tombstones with their deletion time.
    deleted_objects: HashMap<ObjectKey, DateTime<Utc>>,
    deleted_actors: HashMap<Actor, DateTime<Utc>>,
}

impl Inner {
    fn remove(&mut self, seq: u64) -> Option<Assignment> {
        let assignment = self.rows.remove(&seq)?;
        let object = object_key(&assignment.object_reference);

        self.by_triple.remove(&triple_key(
            assignment.actor,
            &assignment.permission,
            &assignment.object_reference,
        ));
        if let Some(set) = self.by_actor.get_mut(&assignment.actor) {
            set.remove(&seq);
            if set.is_empty() {
                self.by_actor.remove(&assignment.actor);
            }
        }
        if let Some(set) = self.by_object.get_mut(&object) {
            set.remove(&seq);
            if set.is_empty() {
                self.by_object.remove(&object);
            }
        }

        Some(assignment)
    }

    /// Sequence numbers worth checking against `filter`, in grant order.
    ///
    /// Uses the actor or object index when the filter pins one down.
    fn candidates(&self, filter: &AssignmentFilter) -> Vec<u64> {
        if let Some(actor) = filter.actor {
            self.by_actor
                .get(&actor)
                .map(|seqs| seqs.iter().copied().collect())
                .unwrap_or_default()
        } else if let (Some(object_type), Some(object_pk)) =
            (&filter.object_type, &filter.object_pk)
        {
            self.by_object
                .get(&(object_type.id, object_pk.clone()))
                .map(|seqs| seqs.iter().copied().collect())
                .unwrap_or_default()
        } else {
            self.rows.keys().copied().collect()
        }
    }

    fn matching<'a>(
        &'a self,
        filter: &'a AssignmentFilter,
    ) -> impl Iterator<Item = &'a Assignment> + 'a {
        self.candidates(filter)
            .into_iter()
            .filter_map(move |seq| self.rows.get(&seq))
            .filter(move |a| filter.matches(a))
    }
}

/// Assignment store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    inner: RwLock<Inner>,
}

impl MemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored assignments.
    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl AssignmentStore for MemoryAssignmentStore {
    fn grant<'a>(
        &'a self,
        actor: Actor,
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<Assignment>> {
        async move {
            ensure_permission_applies(permission, object)?;
            let mut inner = self.inner.write().await;

            if inner.deleted_actors.contains_key(&actor) {
                return Err(RbacError::ActorDeleted(actor.to_string()));
            }
            if inner.deleted_objects.contains_key(&object_key(object)) {
                return Err(RbacError::ObjectDeleted(object.to_string()));
            }

            let key = triple_key(actor, permission, object);
            if let Some(existing) = inner.by_triple.get(&key).and_then(|seq| inner.rows.get(seq)) {
                return Ok(existing.clone());
            }

            let assignment = Assignment {
                id: Uuid::now_v7(),
                actor,
                permission: permission.clone(),
                object_reference: object.clone(),
                granted_at: Utc::now(),
            };

            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.by_triple.insert(key, seq);
            inner.by_actor.entry(actor).or_default().insert(seq);
            inner
                .by_object
                .entry(object_key(object))
                .or_default()
                .insert(seq);
            inner.rows.insert(seq, assignment.clone());

            debug!(assignment_id = %assignment.id, "Stored assignment");
            Ok(assignment)
        }
        .boxed()
    }

    fn revoke<'a>(
        &'a self,
        actor: Actor,
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<()>> {
        async move {
            let mut inner = self.inner.write().await;
            let seq = inner
                .by_triple
                .get(&triple_key(actor, permission, object))
                .copied()
                .ok_or(RbacError::AssignmentNotFound)?;
            inner.remove(seq);
            Ok(())
        }
        .boxed()
    }

    fn list(&self, filter: AssignmentFilter) -> BoxFuture<'_, RbacResult<Vec<Assignment>>> {
        async move {
            let inner = self.inner.read().await;
            Ok(inner.matching(&filter).cloned().collect())
        }
        .boxed()
    }

    fn list_page(
        &self,
        filter: AssignmentFilter,
        page: PageRequest,
    ) -> BoxFuture<'_, RbacResult<Page<Assignment>>> {
        async move {
            let inner = self.inner.read().await;

            let mut total = 0_u64;
            let mut items = Vec::new();
            for assignment in inner.matching(&filter) {
                if total >= page.offset && (items.len() as u64) < page.limit {
                    items.push(assignment.clone());
                }
                total += 1;
            }

            Ok(Page { total, items })
        }
        .boxed()
    }

    fn contains_any<'a>(
        &'a self,
        actors: &'a [Actor],
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<bool>> {
        async move {
            let inner = self.inner.read().await;
            Ok(actors
                .iter()
                .any(|&actor| inner.by_triple.contains_key(&triple_key(actor, permission, object))))
        }
        .boxed()
    }

    fn cascade_delete_object<'a>(
        &'a self,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<u64>> {
        async move {
            let mut inner = self.inner.write().await;
            let key = object_key(object);
            inner.deleted_objects.insert(key.clone(), Utc::now());

            let seqs = inner.by_object.get(&key).cloned().unwrap_or_default();
            let removed = seqs.into_iter().filter_map(|seq| inner.remove(seq)).count();
            Ok(removed as u64)
        }
        .boxed()
    }

    fn cascade_delete_actor(&self, actor: Actor) -> BoxFuture<'_, RbacResult<u64>> {
        async move {
            let mut inner = self.inner.write().await;
            inner.deleted_actors.insert(actor, Utc::now());

            let seqs = inner.by_actor.get(&actor).cloned().unwrap_or_default();
            let removed = seqs.into_iter().filter_map(|seq| inner.remove(seq)).count();
            Ok(removed as u64)
        }
        .boxed()
    }

    fn purge_tombstones(&self, cutoff: DateTime<Utc>) -> BoxFuture<'_, RbacResult<u64>> {
        async move {
            let mut inner = self.inner.write().await;
            let before = inner.deleted_objects.len() + inner.deleted_actors.len();
            inner.deleted_objects.retain(|_, deleted_at| *deleted_at >= cutoff);
            inner.deleted_actors.retain(|_, deleted_at| *deleted_at >= cutoff);
            let after = inner.deleted_objects.len() + inner.deleted_actors.len();
            Ok((before - after) as u64)
        }
        .boxed()
    }
}
