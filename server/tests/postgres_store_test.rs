//! `PostgreSQL` Assignment Store Tests
//!
//! Run with: `DATABASE_URL=... cargo test --test postgres_store_test -- --ignored`

mod helpers;

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;
use warden_server::db;
use warden_server::permissions::{
    Actor, AssignmentFilter, AssignmentStore, Authorizer, ObjectReference, PageRequest,
    PgAssignmentStore, PgGroupMembership, RbacError, Schema,
};

async fn setup(pool: &PgPool) -> (Arc<Schema>, PgAssignmentStore) {
    let schema = Arc::new(helpers::test_schema());
    db::sync_schema(pool, &schema)
        .await
        .expect("Failed to sync schema");
    let store = PgAssignmentStore::new(pool.clone(), schema.clone());
    (schema, store)
}

fn widget(schema: &Schema, pk: &str) -> ObjectReference {
    let descriptor = schema.types.parse("app.widget").unwrap().clone();
    ObjectReference::new(descriptor, pk)
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_grant_is_idempotent(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let object = widget(&schema, "42");
    let view = schema
        .permissions
        .lookup(&object.type_descriptor, "view_widget")
        .unwrap();
    let user = Actor::User(Uuid::new_v4());

    let first = store.grant(user, view, &object).await.unwrap();
    let second = store.grant(user, view, &object).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.granted_at, second.granted_at);

    let by_object = store.list_by_object(&object).await.unwrap();
    assert_eq!(by_object.len(), 1);
    assert_eq!(by_object[0].permission.codename, "view_widget");
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_revoke_missing_assignment(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let object = widget(&schema, "1");
    let view = schema
        .permissions
        .lookup(&object.type_descriptor, "view_widget")
        .unwrap();
    let user = Actor::User(Uuid::new_v4());

    assert!(matches!(
        store.revoke(user, view, &object).await,
        Err(RbacError::AssignmentNotFound)
    ));

    store.grant(user, view, &object).await.unwrap();
    store.revoke(user, view, &object).await.unwrap();
    assert!(store.list_by_object(&object).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_group_membership_from_table(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let user_id = Uuid::new_v4();
    let group_id = Uuid::new_v4();
    sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES ($1, $2)")
        .bind(group_id)
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let authz = Authorizer::new(
        schema.clone(),
        Arc::new(store),
        Arc::new(PgGroupMembership::new(pool.clone())),
    );
    let object = authz.object("app.widget", "7").unwrap();

    authz
        .grant(Actor::Group(group_id), "change_widget", &object)
        .await
        .unwrap();

    assert!(authz
        .has_permission(Actor::User(user_id), "change_widget", &object)
        .await
        .unwrap());
    assert!(!authz
        .has_permission(Actor::User(user_id), "delete_widget", &object)
        .await
        .unwrap());
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_cascades_leave_tombstones(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let object = widget(&schema, "9");
    let other = widget(&schema, "10");
    let view = schema
        .permissions
        .lookup(&object.type_descriptor, "view_widget")
        .unwrap();
    let alice = Actor::User(Uuid::new_v4());
    let bob = Actor::User(Uuid::new_v4());

    store.grant(alice, view, &object).await.unwrap();
    store.grant(bob, view, &object).await.unwrap();
    store.grant(bob, view, &other).await.unwrap();

    assert_eq!(store.cascade_delete_object(&object).await.unwrap(), 2);
    assert!(matches!(
        store.grant(alice, view, &object).await,
        Err(RbacError::ObjectDeleted(_))
    ));

    assert_eq!(store.cascade_delete_actor(bob).await.unwrap(), 1);
    assert!(matches!(
        store.grant(bob, view, &other).await,
        Err(RbacError::ActorDeleted(_))
    ));
    assert!(store.list_by_actor(bob, None, None).await.unwrap().is_empty());
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_list_page_counts_and_windows(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let user = Actor::User(Uuid::new_v4());
    let other = Actor::User(Uuid::new_v4());

    for pk in ["a", "b", "c", "d", "e"] {
        let object = widget(&schema, pk);
        let view = schema
            .permissions
            .lookup(&object.type_descriptor, "view_widget")
            .unwrap();
        store.grant(user, view, &object).await.unwrap();
        store.grant(other, view, &object).await.unwrap();
    }

    let filter = AssignmentFilter {
        actor: Some(user),
        ..AssignmentFilter::default()
    };
    let page = store
        .list_page(filter.clone(), PageRequest::new(2, 2))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    let pks: Vec<_> = page
        .items
        .iter()
        .map(|a| a.object_reference.object_pk.as_str())
        .collect();
    assert_eq!(pks, ["c", "d"]);

    let past_end = store
        .list_page(filter, PageRequest::new(4, 2))
        .await
        .unwrap();
    assert_eq!(past_end.total, 5);
    assert!(past_end.items.is_empty());
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_purge_tombstones(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let object = widget(&schema, "7");
    let view = schema
        .permissions
        .lookup(&object.type_descriptor, "view_widget")
        .unwrap();
    let user = Actor::User(Uuid::new_v4());

    store.grant(user, view, &object).await.unwrap();
    store.cascade_delete_object(&object).await.unwrap();
    store.cascade_delete_actor(user).await.unwrap();

    let an_hour_ago = chrono::Utc::now() - chrono::Duration::hours(1);
    assert_eq!(store.purge_tombstones(an_hour_ago).await.unwrap(), 0);
    assert!(matches!(
        store.grant(user, view, &object).await,
        Err(RbacError::ActorDeleted(_))
    ));

    let cutoff = chrono::Utc::now() + chrono::Duration::minutes(1);
    assert_eq!(store.purge_tombstones(cutoff).await.unwrap(), 2);
    store.grant(user, view, &object).await.unwrap();
    assert_eq!(store.list_by_object(&object).await.unwrap().len(), 1);
}

#[sqlx::test]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_grants_and_cascade(pool: PgPool) {
    let (schema, store) = setup(&pool).await;
    let store = Arc::new(store);
    let object = widget(&schema, "race");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let schema = schema.clone();
        let object = object.clone();
        handles.push(tokio::spawn(async move {
            let view = schema
                .permissions
                .lookup(&object.type_descriptor, "view_widget")
                .unwrap();
            store.grant(Actor::User(Uuid::new_v4()), view, &object).await
        }));
    }
    store.cascade_delete_object(&object).await.unwrap();

    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(RbacError::ObjectDeleted(_)) => {}
            Err(e) => panic!("unexpected grant error: {e}"),
        }
    }

    // Every grant either landed before the cascade or was rejected after it
    assert!(store.list_by_object(&object).await.unwrap().is_empty());
}
