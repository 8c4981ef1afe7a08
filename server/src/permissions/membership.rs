//! Group membership lookup.
//!
//! Membership is owned by the identity platform, not by this service. It is
//! resolved lazily, once per permission check.

use std::collections::HashMap;

use futures::future::BoxFuture;
use futures::FutureExt;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::RbacResult;

/// Source of user-to-group membership.
pub trait GroupMembership: Send + Sync {
    /// Ids of every group `user_id` belongs to.
    fn groups_of(&self, user_id: Uuid) -> BoxFuture<'_, RbacResult<Vec<Uuid>>>;
}

/// Reads the platform's `group_members` table.
#[derive(Debug, Clone)]
pub struct PgGroupMembership {
    pool: PgPool,
}

impl PgGroupMembership {
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl GroupMembership for PgGroupMembership {
    fn groups_of(&self, user_id: Uuid) -> BoxFuture<'_, RbacResult<Vec<Uuid>>> {
        async move {
            let groups: Vec<Uuid> =
                sqlx::query_scalar("SELECT group_id FROM group_members WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(groups)
        }
        .boxed()
    }
}

/// Fixed membership map, for tests and the in-memory backend.
#[derive(Debug, Clone, Default)]
pub struct StaticMembership {
    groups: HashMap<Uuid, Vec<Uuid>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to `group_id`.
    #[must_use]
    pub fn with_member(mut self, group_id: Uuid, user_id: Uuid) -> Self {
        let groups = self.groups.entry(user_id).or_default();
        if !groups.contains(&group_id) {
            groups.push(group_id);
        }
        self
    }
}

impl GroupMembership for StaticMembership {
    fn groups_of(&self, user_id: Uuid) -> BoxFuture<'_, RbacResult<Vec<Uuid>>> {
        let groups = self.groups.get(&user_id).cloned().unwrap_or_default();
        futures::future::ready(Ok(groups)).boxed()
    }
}
