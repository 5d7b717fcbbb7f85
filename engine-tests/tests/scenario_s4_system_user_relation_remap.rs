mod common;

use common::*;

/// S4 — creating a user through `/api/user` with a role-record id remaps it to
/// the role's origin id on write, and remaps back to the record id on read.
#[tokio::test]
async fn creating_a_user_remaps_role_record_id_to_origin_and_back() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let role = serde_json::json!({ "name": "Viewer" });
    let response = send_json(&app, "POST", "/api/role", Some(&token), role).await;
    assert!(response.status().is_success(), "creating the Viewer role should succeed");
    let role_body = response_json(response).await;
    let role_record_id = role_body["record"]["id"].as_str().expect("role record id").to_string();
    let role_origin_id = role_body["record"]["data"]["id"].as_str().expect("role origin id").to_string();

    let user = serde_json::json!({
        "name": "Bob",
        "email": "bob@x.example",
        "password": "p",
        "roleId": role_record_id,
    });
    let response = send_json(&app, "POST", "/api/user", Some(&token), user).await;
    assert!(response.status().is_success(), "creating the user should succeed");
    let created = response_json(response).await;
    let record = &created["record"];
    let user_id = record["data"]["id"].as_str().expect("user id").to_string();
    assert_eq!(record["id"].as_str(), Some(user_id.as_str()), "mirror record id should equal the user id");
    assert!(record["data"].get("password").is_none(), "mirror data must never carry the password");
    assert_eq!(
        record["data"]["roleId"].as_str(),
        Some(role_record_id.as_str()),
        "create response should already show the record id, not the origin id"
    );

    let get_uri = format!("/api/user/{user_id}");
    let response = send(&app, "GET", &get_uri, Some(&token)).await;
    assert!(response.status().is_success());
    let fetched = response_json(response).await;
    assert_eq!(
        fetched["record"]["data"]["roleId"].as_str(),
        Some(role_record_id.as_str()),
        "get should remap the origin roleId back to the role's record id"
    );
    assert_ne!(role_record_id, role_origin_id, "role record id and origin id should differ for this to be meaningful");
}
