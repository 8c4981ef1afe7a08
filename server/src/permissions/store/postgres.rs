//! `PostgreSQL` assignment store.
//!
//! Uniqueness of the triple is enforced by the `assignments` unique
//! constraint. Grants take a shared transaction-scoped advisory lock on the
//! actor and the object; cascades take the exclusive lock on the key they
//! delete and leave a tombstone, so a grant racing a cascade either commits
//! first (and is removed) or sees the tombstone and is rejected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{ensure_permission_applies, AssignmentFilter, AssignmentStore, Page, PageRequest};
use crate::permissions::error::{RbacError, RbacResult};
use crate::permissions::schema::Schema;
use crate::permissions::types::{Actor, ActorKind, Assignment, ObjectReference, Permission};

/// Advisory lock seed for object permission keys (see `db` seed registry).
const LOCK_SEED: i64 = 61;

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: Uuid,
    actor_kind: ActorKind,
    actor_id: Uuid,
    permission_id: Uuid,
    object_type_descriptor_id: Uuid,
    object_pk: String,
    granted_at: DateTime<Utc>,
}

const SELECT_ASSIGNMENTS: &str = r"
    SELECT id, actor_kind, actor_id, permission_id, object_type_descriptor_id,
           object_pk, granted_at
    FROM assignments
    WHERE TRUE
    ";

/// Append the conjunctive `filter` to a query ending in a `WHERE` clause.
fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &AssignmentFilter) {
    if let Some(actor) = filter.actor {
        query
            .push(" AND actor_kind = ")
            .push_bind(actor.kind())
            .push(" AND actor_id = ")
            .push_bind(actor.id());
    }
    if let Some(object_type) = &filter.object_type {
        query
            .push(" AND object_type_descriptor_id = ")
            .push_bind(object_type.id);
    }
    if let Some(object_pk) = &filter.object_pk {
        query.push(" AND object_pk = ").push_bind(object_pk.clone());
    }
}

fn actor_lock_key(actor: Actor) -> String {
    format!("actor:{actor}")
}

fn object_lock_key(object: &ObjectReference) -> String {
    format!("object:{}:{}", object.type_descriptor.id, object.object_pk)
}

async fn advisory_lock(
    tx: &mut Transaction<'_, Postgres>,
    key: &str,
    exclusive: bool,
) -> sqlx::Result<()> {
    let sql = if exclusive {
        "SELECT pg_advisory_xact_lock(hashtextextended($1::text, $2))"
    } else {
        "SELECT pg_advisory_xact_lock_shared(hashtextextended($1::text, $2))"
    };
    sqlx::query(sql)
        .bind(key)
        .bind(LOCK_SEED)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Assignment store backed by `PostgreSQL`.
///
/// Rows hold ids only; permissions and types are rehydrated from the
/// bootstrap [`Schema`], which must have been synced with
/// [`crate::db::sync_schema`].
#[derive(Debug, Clone)]
pub struct PgAssignmentStore {
    pool: PgPool,
    schema: Arc<Schema>,
}

impl PgAssignmentStore {
    pub const fn new(pool: PgPool, schema: Arc<Schema>) -> Self {
        Self { pool, schema }
    }

    fn hydrate(&self, row: AssignmentRow) -> RbacResult<Assignment> {
        let permission = self
            .schema
            .permissions
            .get(row.permission_id)
            .ok_or(RbacError::UnknownPermission(row.permission_id))?;
        let object_type = self
            .schema
            .types
            .get(row.object_type_descriptor_id)
            .ok_or_else(|| RbacError::TypeNotFound(row.object_type_descriptor_id.to_string()))?;

        Ok(Assignment {
            id: row.id,
            actor: Actor::from_parts(row.actor_kind, row.actor_id),
            permission: permission.clone(),
            object_reference: ObjectReference::new(object_type.clone(), row.object_pk),
            granted_at: row.granted_at,
        })
    }

    async fn grant_inner(
        &self,
        actor: Actor,
        permission: &Permission,
        object: &ObjectReference,
    ) -> RbacResult<Assignment> {
        ensure_permission_applies(permission, object)?;

        let mut tx = self.pool.begin().await?;

        advisory_lock(&mut tx, &actor_lock_key(actor), false).await?;
        advisory_lock(&mut tx, &object_lock_key(object), false).await?;

        let actor_deleted: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM deleted_actors WHERE actor_kind = $1 AND actor_id = $2)",
        )
        .bind(actor.kind())
        .bind(actor.id())
        .fetch_one(&mut *tx)
        .await?;
        if actor_deleted {
            return Err(RbacError::ActorDeleted(actor.to_string()));
        }

        let object_deleted: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM deleted_objects
                WHERE object_type_descriptor_id = $1 AND object_pk = $2
            )
            ",
        )
        .bind(object.type_descriptor.id)
        .bind(&object.object_pk)
        .fetch_one(&mut *tx)
        .await?;
        if object_deleted {
            return Err(RbacError::ObjectDeleted(object.to_string()));
        }

        // DO UPDATE (not DO NOTHING) so the existing row is returned
        let row = sqlx::query_as::<_, AssignmentRow>(
            r"
            INSERT INTO assignments
                (id, actor_kind, actor_id, permission_id, object_type_descriptor_id, object_pk)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (actor_kind, actor_id, permission_id, object_type_descriptor_id, object_pk)
            DO UPDATE SET object_pk = EXCLUDED.object_pk
            RETURNING id, actor_kind, actor_id, permission_id, object_type_descriptor_id,
                      object_pk, granted_at
            ",
        )
        .bind(Uuid::now_v7())
        .bind(actor.kind())
        .bind(actor.id())
        .bind(permission.id)
        .bind(object.type_descriptor.id)
        .bind(&object.object_pk)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(assignment_id = %row.id, "Stored assignment");
        self.hydrate(row)
    }

    async fn revoke_inner(
        &self,
        actor: Actor,
        permission: &Permission,
        object: &ObjectReference,
    ) -> RbacResult<()> {
        let result = sqlx::query(
            r"
            DELETE FROM assignments
            WHERE actor_kind = $1
              AND actor_id = $2
              AND permission_id = $3
              AND object_type_descriptor_id = $4
              AND object_pk = $5
            ",
        )
        .bind(actor.kind())
        .bind(actor.id())
        .bind(permission.id)
        .bind(object.type_descriptor.id)
        .bind(&object.object_pk)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RbacError::AssignmentNotFound);
        }
        Ok(())
    }

    async fn list_inner(&self, filter: AssignmentFilter) -> RbacResult<Vec<Assignment>> {
        let mut query = QueryBuilder::<Postgres>::new(SELECT_ASSIGNMENTS);
        push_filter(&mut query, &filter);
        query.push(" ORDER BY granted_at, id");

        let rows = query
            .build_query_as::<AssignmentRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|row| self.hydrate(row)).collect()
    }

    async fn list_page_inner(
        &self,
        filter: AssignmentFilter,
        page: PageRequest,
    ) -> RbacResult<Page<Assignment>> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM assignments WHERE TRUE");
        push_filter(&mut count, &filter);
        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;

        let mut query = QueryBuilder::<Postgres>::new(SELECT_ASSIGNMENTS);
        push_filter(&mut query, &filter);
        query
            .push(" ORDER BY granted_at, id LIMIT ")
            .push_bind(i64::try_from(page.limit).unwrap_or(i64::MAX))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset).unwrap_or(i64::MAX));

        let rows = query
            .build_query_as::<AssignmentRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            total: u64::try_from(total).unwrap_or_default(),
            items: rows
                .into_iter()
                .map(|row| self.hydrate(row))
                .collect::<RbacResult<_>>()?,
        })
    }

    async fn contains_any_inner(
        &self,
        actors: &[Actor],
        permission: &Permission,
        object: &ObjectReference,
    ) -> RbacResult<bool> {
        let (users, groups): (Vec<Actor>, Vec<Actor>) = actors
            .iter()
            .copied()
            .partition(|actor| actor.kind() == ActorKind::User);
        let user_ids: Vec<Uuid> = users.iter().map(Actor::id).collect();
        let group_ids: Vec<Uuid> = groups.iter().map(Actor::id).collect();

        let exists: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS(
                SELECT 1 FROM assignments
                WHERE permission_id = $1
                  AND object_type_descriptor_id = $2
                  AND object_pk = $3
                  AND (
                      (actor_kind = 'user' AND actor_id = ANY($4))
                      OR (actor_kind = 'group' AND actor_id = ANY($5))
                  )
            )
            ",
        )
        .bind(permission.id)
        .bind(object.type_descriptor.id)
        .bind(&object.object_pk)
        .bind(&user_ids)
        .bind(&group_ids)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn cascade_object_inner(&self, object: &ObjectReference) -> RbacResult<u64> {
        let mut tx = self.pool.begin().await?;
        advisory_lock(&mut tx, &object_lock_key(object), true).await?;

        sqlx::query(
            r"
            INSERT INTO deleted_objects (object_type_descriptor_id, object_pk)
            VALUES ($1, $2)
            ON CONFLICT (object_type_descriptor_id, object_pk)
            DO UPDATE SET deleted_at = NOW()
            ",
        )
        .bind(object.type_descriptor.id)
        .bind(&object.object_pk)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "DELETE FROM assignments WHERE object_type_descriptor_id = $1 AND object_pk = $2",
        )
        .bind(object.type_descriptor.id)
        .bind(&object.object_pk)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn cascade_actor_inner(&self, actor: Actor) -> RbacResult<u64> {
        let mut tx = self.pool.begin().await?;
        advisory_lock(&mut tx, &actor_lock_key(actor), true).await?;

        sqlx::query(
            r"
            INSERT INTO deleted_actors (actor_kind, actor_id)
            VALUES ($1, $2)
            ON CONFLICT (actor_kind, actor_id)
            DO UPDATE SET deleted_at = NOW()
            ",
        )
        .bind(actor.kind())
        .bind(actor.id())
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM assignments WHERE actor_kind = $1 AND actor_id = $2")
            .bind(actor.kind())
            .bind(actor.id())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn purge_tombstones_inner(&self, cutoff: DateTime<Utc>) -> RbacResult<u64> {
        let mut tx = self.pool.begin().await?;

        let objects = sqlx::query("DELETE FROM deleted_objects WHERE deleted_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        let actors = sqlx::query("DELETE FROM deleted_actors WHERE deleted_at < $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(objects.rows_affected() + actors.rows_affected())
    }
}

impl AssignmentStore for PgAssignmentStore {
    fn grant<'a>(
        &'a self,
        actor: Actor,
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<Assignment>> {
        self.grant_inner(actor, permission, object).boxed()
    }

    fn revoke<'a>(
        &'a self,
        actor: Actor,
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<()>> {
        self.revoke_inner(actor, permission, object).boxed()
    }

    fn list(&self, filter: AssignmentFilter) -> BoxFuture<'_, RbacResult<Vec<Assignment>>> {
        self.list_inner(filter).boxed()
    }

    fn list_page(
        &self,
        filter: AssignmentFilter,
        page: PageRequest,
    ) -> BoxFuture<'_, RbacResult<Page<Assignment>>> {
        self.list_page_inner(filter, page).boxed()
    }

    fn contains_any<'a>(
        &'a self,
        actors: &'a [Actor],
        permission: &'a Permission,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<bool>> {
        self.contains_any_inner(actors, permission, object).boxed()
    }

    fn cascade_delete_object<'a>(
        &'a self,
        object: &'a ObjectReference,
    ) -> BoxFuture<'a, RbacResult<u64>> {
        self.cascade_object_inner(object).boxed()
    }

    fn cascade_delete_actor(&self, actor: Actor) -> BoxFuture<'_, RbacResult<u64>> {
        self.cascade_actor_inner(actor).boxed()
    }

    fn purge_tombstones(&self, cutoff: DateTime<Utc>) -> BoxFuture<'_, RbacResult<u64>> {
        self.purge_tombstones_inner(cutoff).boxed()
    }
}
