mod common;

use common::*;

/// S3 — a model with two or more single-target relation fields enforces
/// composite uniqueness across that tuple, but only once every relation field
/// in the tuple actually collides.
#[tokio::test]
async fn linking_model_rejects_duplicate_relation_tuples() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    for name in ["Student", "Course"] {
        let body = serde_json::json!({
            "name": name,
            "json": { "fields": [ { "name": "name", "type": "string", "required": true } ] }
        });
        let response = send_json(&app, "POST", "/models", Some(&token), body).await;
        assert!(response.status().is_success(), "drafting {name} should succeed");
        let id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();
        let publish_uri = format!("/models/{id}/publish");
        let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
        assert!(response.status().is_success(), "publishing {name} should succeed");
    }

    let enrollment = serde_json::json!({
        "name": "Enrollment",
        "json": {
            "fields": [
                {
                    "name": "studentId",
                    "type": "relation",
                    "relation": { "model": "Student", "field": "id", "type": "many-to-one" }
                },
                {
                    "name": "courseId",
                    "type": "relation",
                    "relation": { "model": "Course", "field": "id", "type": "many-to-one" }
                }
            ]
        }
    });
    let response = send_json(&app, "POST", "/models", Some(&token), enrollment).await;
    assert!(response.status().is_success());
    let enrollment_id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();
    let publish_uri = format!("/models/{enrollment_id}/publish");
    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());

    let first = serde_json::json!({ "studentId": "S1", "courseId": "C1" });
    let response = send_json(&app, "POST", "/api/enrollment", Some(&token), first).await;
    assert!(response.status().is_success(), "first enrollment should succeed");

    let duplicate = serde_json::json!({ "studentId": "S1", "courseId": "C1" });
    let response = send_json(&app, "POST", "/api/enrollment", Some(&token), duplicate).await;
    assert_eq!(response.status(), axum::http::StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["success"], serde_json::json!(false));
    let details = body["details"].clone();
    assert!(details.get("studentId").is_some(), "conflict details should name studentId: {details}");
    assert!(details.get("courseId").is_some(), "conflict details should name courseId: {details}");

    let different_course = serde_json::json!({ "studentId": "S1", "courseId": "C2" });
    let response = send_json(&app, "POST", "/api/enrollment", Some(&token), different_course).await;
    assert!(response.status().is_success(), "a tuple differing in one field should succeed");
}
