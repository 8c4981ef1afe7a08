//! Database Layer
//!
//! `PostgreSQL` connection pool, migrations and bootstrap schema sync.
//!
//! Advisory Lock Seed Registry
//! - 61 = object permission keys (`actor:<kind>:<id>`, `object:<type_id>:<pk>`)
//!   - Shared by grants, exclusive by cascades
//!   - Called from: server/src/permissions/store/postgres.rs

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::permissions::Schema;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(2)
        .max_connections(20)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Upsert the bootstrap schema into `type_descriptors` and `permissions`.
///
/// Ids are derived from names, so re-running with the same schema is a
/// no-op apart from refreshed display names.
pub async fn sync_schema(pool: &PgPool, schema: &Schema) -> Result<()> {
    let mut tx = pool.begin().await?;

    for descriptor in schema.types.iter() {
        sqlx::query(
            r"
            INSERT INTO type_descriptors (id, namespace, type_name)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET namespace = EXCLUDED.namespace,
                type_name = EXCLUDED.type_name
            ",
        )
        .bind(descriptor.id)
        .bind(&descriptor.namespace)
        .bind(&descriptor.type_name)
        .execute(&mut *tx)
        .await?;
    }

    for permission in schema.permissions.iter() {
        sqlx::query(
            r"
            INSERT INTO permissions (id, codename, type_descriptor_id, display_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET display_name = EXCLUDED.display_name
            ",
        )
        .bind(permission.id)
        .bind(&permission.codename)
        .bind(permission.type_descriptor.id)
        .bind(&permission.display_name)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        types = schema.types.len(),
        permissions = schema.permissions.len(),
        "Object permission schema synced"
    );
    Ok(())
}
