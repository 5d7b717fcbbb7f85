mod common;

use common::*;
use engine_entities::{ModelRolePermissionColumn, ModelRolePermissionEntity, RecordColumn, RecordEntity, UserEntity};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

async fn user_mirror_count(db: &sea_orm::DatabaseConnection, user_id: &str) -> usize {
    RecordEntity::find()
        .filter(RecordColumn::ModelName.eq("User"))
        .all(db)
        .await
        .unwrap()
        .iter()
        .filter(|r| r.data.get("id").and_then(serde_json::Value::as_str) == Some(user_id))
        .count()
}

async fn create_and_publish(app: &axum::Router, token: &str, name: &str, rbac: Option<serde_json::Value>) -> String {
    let mut json = serde_json::json!({ "fields": [ { "name": "name", "type": "string", "required": true } ] });
    if let Some(rbac) = rbac {
        json["rbac"] = rbac;
    }
    let body = serde_json::json!({ "name": name, "json": json });
    let response = send_json(app, "POST", "/models", Some(token), body).await;
    assert!(response.status().is_success());
    let id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();
    let publish_uri = format!("/models/{id}/publish");
    let response = send_json(app, "POST", &publish_uri, Some(token), serde_json::json!({})).await;
    assert!(response.status().is_success());
    id
}

/// Invariant 3 — unpublishing a model clears every `ModelRolePermission` row
/// granted for it, not merely flipping `published` back to `false`.
#[tokio::test]
async fn unpublish_clears_model_role_permission_rows() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let rbac = serde_json::json!({ "Admin": ["ALL"] });
    let model_id = create_and_publish(&app, &token, "Widget", Some(rbac)).await;
    let uuid = uuid::Uuid::parse_str(&model_id).unwrap();

    let before = ModelRolePermissionEntity::find()
        .filter(ModelRolePermissionColumn::ModelId.eq(uuid))
        .count(&db)
        .await
        .unwrap();
    assert!(before > 0, "publishing with an rbac block should create grant rows");

    let unpublish_uri = format!("/models/{model_id}/unpublish");
    let response = send_json(&app, "POST", &unpublish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());

    let after = ModelRolePermissionEntity::find()
        .filter(ModelRolePermissionColumn::ModelId.eq(uuid))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(after, 0, "unpublish should delete every grant row for the model");
}

/// Invariant 5 — system-model dual-write stays 1:1: deleting a `User` removes
/// both the origin row and its generic-record mirror together.
#[tokio::test]
async fn deleting_a_system_user_removes_origin_and_mirror_together() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let user = serde_json::json!({ "name": "Carol", "email": "carol@x.example", "password": "p" });
    let response = send_json(&app, "POST", "/api/user", Some(&token), user).await;
    assert!(response.status().is_success());
    let user_id = response_json(response).await["record"]["data"]["id"].as_str().unwrap().to_string();
    let uuid = uuid::Uuid::parse_str(&user_id).unwrap();

    assert!(UserEntity::find_by_id(uuid).one(&db).await.unwrap().is_some());
    assert_eq!(user_mirror_count(&db, &user_id).await, 1, "exactly one mirror record should exist for the new user");

    let delete_uri = format!("/api/user/{user_id}");
    let response = send(&app, "DELETE", &delete_uri, Some(&token)).await;
    assert!(response.status().is_success());

    assert!(UserEntity::find_by_id(uuid).one(&db).await.unwrap().is_none(), "origin row should be gone");
    assert_eq!(user_mirror_count(&db, &user_id).await, 0, "mirror record should be gone too, never left orphaned");
}

/// Invariant 8 — Admin bypasses every check; a `UserPermission` override wins
/// over a conflicting `RolePermission` grant for the same feature.
#[tokio::test]
async fn user_permission_override_wins_over_role_permission_and_admin_always_bypasses() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let admin = admin_token(&app).await;

    let user = serde_json::json!({ "name": "Dana", "email": "dana@x.example", "password": "p" });
    let response = send_json(&app, "POST", "/api/user", Some(&admin), user).await;
    assert!(response.status().is_success());
    let user_id = response_json(response).await["record"]["data"]["id"].as_str().unwrap().to_string();

    let grant_role = serde_json::json!({ "roleName": "Viewer", "feature": "VIEW_SUPPORT", "granted": true });
    let response = send_json(&app, "POST", "/rbac/grant/role", Some(&admin), grant_role).await;
    assert!(response.status().is_success(), "granting a role-level feature should succeed");

    let dana_token = login(&app, "dana@x.example", "p").await;
    let response = send(&app, "GET", "/support/stats", Some(&dana_token)).await;
    assert!(response.status().is_success(), "role grant should allow access");

    let grant_user_override = serde_json::json!({
        "userId": user_id,
        "feature": "VIEW_SUPPORT",
        "granted": false,
    });
    let response = send_json(&app, "POST", "/rbac/grant/user", Some(&admin), grant_user_override).await;
    assert!(response.status().is_success());

    let response = send(&app, "GET", "/support/stats", Some(&dana_token)).await;
    assert_eq!(
        response.status(),
        axum::http::StatusCode::FORBIDDEN,
        "a user-level denial must override the role-level grant"
    );

    let response = send(&app, "GET", "/support/stats", Some(&admin)).await;
    assert!(response.status().is_success(), "Admin must bypass permission checks regardless of grants");
}

/// Invariant 9 — the audit feed redacts sensitive keys at read time; login
/// events carry the actor's email in `details`, which must come back redacted.
#[tokio::test]
async fn audit_feed_redacts_sensitive_fields() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let response = send(&app, "GET", "/support/audit", Some(&token)).await;
    assert!(response.status().is_success());
    let body = response_json(response).await;
    let events = body["events"].as_array().expect("events array");
    let login_event = events
        .iter()
        .find(|e| e["action"] == serde_json::json!("LOGIN"))
        .expect("the admin login that produced this token should be in the feed");
    assert_eq!(
        login_event["details"]["email"],
        serde_json::json!("[redacted]"),
        "email must be redacted in the audit feed: {login_event}"
    );
}
