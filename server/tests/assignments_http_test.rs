//! Object Permission HTTP Integration Tests
//!
//! Run with: `cargo test --test assignments_http_test -- --nocapture`

mod helpers;

use helpers::{assignment_body, body_to_json, TestApp, GROUP_ID, MEMBER_ID};
use uuid::Uuid;
use warden_server::config::Config;

// ============================================================================
// Schema Endpoints
// ============================================================================

#[tokio::test]
async fn test_list_types() {
    let app = TestApp::new();

    let resp = app.get("/api/rbac/types").await;
    assert_eq!(resp.status(), 200);

    let json = body_to_json(resp).await;
    let identifiers: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["identifier"].as_str().unwrap())
        .collect();
    assert_eq!(identifiers, ["app.Widget", "app.Gadget"]);
}

#[tokio::test]
async fn test_list_permissions_for_type() {
    let app = TestApp::new();

    let resp = app.get("/api/rbac/permissions?type=APP.widget").await;
    assert_eq!(resp.status(), 200);

    let json = body_to_json(resp).await;
    let codenames: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["codename"].as_str().unwrap())
        .collect();
    assert_eq!(
        codenames,
        ["add_widget", "change_widget", "delete_widget", "view_widget", "share_widget"]
    );
    assert_eq!(json[4]["name"], "Can share widget");

    let all = body_to_json(app.get("/api/rbac/permissions").await).await;
    assert_eq!(all.as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn test_list_permissions_rejects_bad_type() {
    let app = TestApp::new();

    let resp = app.get("/api/rbac/permissions?type=widget").await;
    assert_eq!(resp.status(), 400);
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "invalid_type_identifier");
    assert_eq!(json["field"], "type");

    let resp = app.get("/api/rbac/permissions?type=app.unknown").await;
    assert_eq!(resp.status(), 404);
}

// ============================================================================
// Grant / Revoke
// ============================================================================

#[tokio::test]
async fn test_grant_returns_assignment() {
    let app = TestApp::new();
    let user_id = Uuid::new_v4();

    let json = app
        .grant(&assignment_body("user", user_id, "view_widget", "app.widget", "42"))
        .await;

    assert!(json["id"].is_string());
    assert_eq!(json["actor"]["kind"], "user");
    assert_eq!(json["actor"]["id"], user_id.to_string());
    assert_eq!(json["permission"]["codename"], "view_widget");
    assert_eq!(json["object_reference"]["namespace"], "app");
    assert_eq!(json["object_reference"]["type_name"], "Widget");
    assert_eq!(json["object_reference"]["object_pk"], "42");
    assert!(json["granted_at"].is_string());
}

#[tokio::test]
async fn test_grant_is_idempotent() {
    let app = TestApp::new();
    let body = assignment_body("user", Uuid::new_v4(), "view_widget", "app.widget", "42");

    let first = app.grant(&body).await;
    let second = app.grant(&body).await;
    assert_eq!(first["id"], second["id"]);

    let page = body_to_json(app.get("/api/rbac/assignments").await).await;
    assert_eq!(page["count"], 1);
}

#[tokio::test]
async fn test_grant_rejects_invalid_input() {
    let app = TestApp::new();
    let user_id = Uuid::new_v4();

    let resp = app
        .post_json(
            "/api/rbac/assignments",
            &assignment_body("user", user_id, "view_widget", "app.widget", ""),
        )
        .await;
    assert_eq!(resp.status(), 400, "empty object_pk");
    let json = body_to_json(resp).await;
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["field"], "object_pk");
    assert!(json["message"].as_str().unwrap().contains("object_pk"));

    let resp = app
        .post_json(
            "/api/rbac/assignments",
            &assignment_body("user", user_id, "", "app.widget", "1"),
        )
        .await;
    assert_eq!(resp.status(), 400, "empty permission");
    assert_eq!(body_to_json(resp).await["field"], "permission");

    let resp = app
        .post_json(
            "/api/rbac/assignments",
            &assignment_body("user", user_id, "view_widget", "app.unknown", "1"),
        )
        .await;
    assert_eq!(resp.status(), 404, "unregistered type");

    let resp = app
        .post_json(
            "/api/rbac/assignments",
            &assignment_body("user", user_id, "share_widget", "app.gadget", "1"),
        )
        .await;
    assert_eq!(resp.status(), 404, "codename of another type");
    assert_eq!(body_to_json(resp).await["error"], "permission_not_found");
}

#[tokio::test]
async fn test_revoke() {
    let app = TestApp::new();
    let body = assignment_body("group", GROUP_ID, "change_widget", "app.widget", "7");
    app.grant(&body).await;

    let resp = app.post_json("/api/rbac/assignments/revoke", &body).await;
    assert_eq!(resp.status(), 204);

    let resp = app.post_json("/api/rbac/assignments/revoke", &body).await;
    assert_eq!(resp.status(), 404, "second revoke finds nothing");
    assert_eq!(body_to_json(resp).await["error"], "assignment_not_found");
}

// ============================================================================
// Check
// ============================================================================

#[tokio::test]
async fn test_check_direct_and_group_grants() {
    let app = TestApp::new();
    let outsider = Uuid::new_v4();

    app.grant(&assignment_body("group", GROUP_ID, "view_widget", "app.widget", "1"))
        .await;

    let uri = |user: Uuid| {
        format!("/api/rbac/check?user={user}&permission=view_widget&type=app.widget&object_pk=1")
    };

    let json = body_to_json(app.get(&uri(MEMBER_ID)).await).await;
    assert_eq!(json["allowed"], true, "group member inherits group grant");

    let json = body_to_json(app.get(&uri(outsider)).await).await;
    assert_eq!(json["allowed"], false);

    let json = body_to_json(
        app.get("/api/rbac/check?user=00000000-0000-0000-0000-000000001111&permission=view_widget&type=app.widget&object_pk=2")
            .await,
    )
    .await;
    assert_eq!(json["allowed"], false, "grant is scoped to one object");
}

#[tokio::test]
async fn test_check_requires_one_actor() {
    let app = TestApp::new();

    let resp = app
        .get("/api/rbac/check?permission=view_widget&type=app.widget&object_pk=1")
        .await;
    assert_eq!(resp.status(), 400);

    let resp = app
        .get(&format!(
            "/api/rbac/check?user={MEMBER_ID}&group={GROUP_ID}&permission=view_widget&type=app.widget&object_pk=1"
        ))
        .await;
    assert_eq!(resp.status(), 400);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_assignments_filters() {
    let app = TestApp::new();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    app.grant(&assignment_body("user", alice, "view_widget", "app.widget", "1")).await;
    app.grant(&assignment_body("user", alice, "view_widget", "app.widget", "2")).await;
    app.grant(&assignment_body("user", alice, "view_gadget", "app.gadget", "1")).await;
    app.grant(&assignment_body("user", bob, "view_widget", "app.widget", "1")).await;

    let page = body_to_json(app.get(&format!("/api/rbac/assignments?user={alice}")).await).await;
    assert_eq!(page["count"], 3);

    let page = body_to_json(
        app.get(&format!("/api/rbac/assignments?user={alice}&type=app.widget"))
            .await,
    )
    .await;
    assert_eq!(page["count"], 2);

    let page = body_to_json(
        app.get("/api/rbac/assignments?type=app.widget&object_pk=1")
            .await,
    )
    .await;
    assert_eq!(page["count"], 2, "who can access widget 1");

    let resp = app
        .get(&format!("/api/rbac/assignments?user={alice}&group={GROUP_ID}"))
        .await;
    assert_eq!(resp.status(), 400, "user and group are exclusive");
}

#[tokio::test]
async fn test_list_assignments_pagination() {
    let mut config = Config::default_for_test();
    config.max_page_size = 2;
    let app = TestApp::with_config(config);
    let user_id = Uuid::new_v4();

    for pk in ["a", "b", "c"] {
        app.grant(&assignment_body("user", user_id, "view_widget", "app.widget", pk))
            .await;
    }

    let page = body_to_json(app.get("/api/rbac/assignments?page_size=50").await).await;
    assert_eq!(page["count"], 3);
    assert_eq!(page["page_size"], 2, "clamped to max_page_size");
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["results"][0]["object_reference"]["object_pk"], "a");

    let page = body_to_json(app.get("/api/rbac/assignments?page=2").await).await;
    assert_eq!(page["results"].as_array().unwrap().len(), 1);
    assert_eq!(page["results"][0]["object_reference"]["object_pk"], "c");

    let resp = app.get("/api/rbac/assignments?page=0").await;
    assert_eq!(resp.status(), 400);
}

// ============================================================================
// Cascades
// ============================================================================

#[tokio::test]
async fn test_cascade_object_blocks_later_grants() {
    let app = TestApp::new();
    let user_id = Uuid::new_v4();
    let body = assignment_body("user", user_id, "view_widget", "app.widget", "9");
    app.grant(&body).await;
    app.grant(&assignment_body("group", GROUP_ID, "view_widget", "app.widget", "9"))
        .await;

    let resp = app
        .post_json(
            "/api/rbac/cascade/object",
            &serde_json::json!({ "type": "app.widget", "object_pk": "9" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_to_json(resp).await["removed"], 2);

    let resp = app.post_json("/api/rbac/assignments", &body).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(body_to_json(resp).await["error"], "object_deleted");
}

#[tokio::test]
async fn test_cascade_actor() {
    let app = TestApp::new();
    let user_id = Uuid::new_v4();
    app.grant(&assignment_body("user", user_id, "view_widget", "app.widget", "1")).await;
    app.grant(&assignment_body("user", user_id, "view_gadget", "app.gadget", "1")).await;

    let resp = app
        .post_json(
            "/api/rbac/cascade/actor",
            &serde_json::json!({ "actor": { "kind": "user", "id": user_id } }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert_eq!(body_to_json(resp).await["removed"], 2);

    let page = body_to_json(app.get(&format!("/api/rbac/assignments?user={user_id}")).await).await;
    assert_eq!(page["count"], 0);
}

// ============================================================================
// Misc
// ============================================================================

#[tokio::test]
async fn test_health_and_openapi() {
    let app = TestApp::new();

    let json = body_to_json(app.get("/health").await).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["types"], 2);

    let json = body_to_json(app.get("/api/openapi.json").await).await;
    assert!(json["paths"]["/api/rbac/assignments"].is_object());
}
