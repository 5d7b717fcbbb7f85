mod common;

use common::*;

/// Round-trip law — validate, publish, then re-read the artifact written to disk:
/// the field descriptors in the artifact must equal the ones that were validated,
/// not some re-derived or reordered copy.
#[tokio::test]
async fn publish_then_reread_artifact_yields_equal_field_descriptors() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let json = serde_json::json!({
        "fields": [
            { "name": "title", "type": "string", "required": true },
            { "name": "rating", "type": "number" },
        ]
    });
    let create_body = serde_json::json!({ "name": "Book", "json": json.clone() });
    let response = send_json(&app, "POST", "/models", Some(&token), create_body).await;
    assert!(response.status().is_success());
    let model_id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();

    let publish_uri = format!("/models/{model_id}/publish");
    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());

    let artifact_path = models_dir.path().join("Book.json");
    let artifact_raw = std::fs::read_to_string(&artifact_path).expect("artifact should be on disk after publish");
    let artifact: serde_json::Value = serde_json::from_str(&artifact_raw).unwrap();

    assert_eq!(
        artifact["definition"]["fields"], json["fields"],
        "the artifact's field descriptors must equal the validated draft, not a re-derived copy"
    );

    let get_uri = format!("/models/{model_id}");
    let response = send(&app, "GET", &get_uri, Some(&token)).await;
    assert!(response.status().is_success());
    let reread = response_json(response).await;
    assert_eq!(
        reread["model"]["json"]["fields"], json["fields"],
        "re-reading the model after publish must yield the same field descriptors again"
    );
}

/// Round-trip law — publishing version v, reverting the draft to v-1, then
/// publishing again allocates version v+1. History is append-only: the old
/// version number is never reused, even though the draft content now matches
/// what was already published once before.
#[tokio::test]
async fn revert_then_republish_allocates_a_fresh_version_number_never_reused() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let v1_json = serde_json::json!({ "fields": [ { "name": "title", "type": "string", "required": true } ] });
    let create_body = serde_json::json!({ "name": "Article", "json": v1_json.clone() });
    let response = send_json(&app, "POST", "/models", Some(&token), create_body).await;
    assert!(response.status().is_success());
    let model_id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();

    let publish_uri = format!("/models/{model_id}/publish");
    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());
    let published_v1 = response_json(response).await;
    assert_eq!(published_v1["model"]["version"], 1);

    let v2_json = serde_json::json!({
        "fields": [
            { "name": "title", "type": "string", "required": true },
            { "name": "body", "type": "string" },
        ]
    });
    let update_uri = format!("/models/{model_id}");
    let response = send_json(&app, "PUT", &update_uri, Some(&token), serde_json::json!({ "json": v2_json })).await;
    assert!(response.status().is_success());

    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());
    let published_v2 = response_json(response).await;
    assert_eq!(published_v2["model"]["version"], 2);

    let revert_uri = format!("/models/{model_id}/versions/1/revert");
    let response = send_json(&app, "POST", &revert_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());
    let reverted = response_json(response).await;
    assert_eq!(
        reverted["model"]["json"]["fields"], v1_json["fields"],
        "reverting should restore the draft to the v1 snapshot's fields"
    );
    assert_eq!(reverted["model"]["version"], 2, "revert alone must not bump the version number");

    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());
    let republished = response_json(response).await;
    assert_eq!(
        republished["model"]["version"], 3,
        "republishing after a revert must allocate a fresh version number, never reuse 1 or 2"
    );

    let versions_uri = format!("/models/{model_id}/versions");
    let response = send(&app, "GET", &versions_uri, Some(&token)).await;
    assert!(response.status().is_success());
    let versions = response_json(response).await["versions"].as_array().unwrap().clone();
    let numbers: Vec<i64> = versions.iter().map(|v| v["versionNumber"].as_i64().unwrap()).collect();
    assert_eq!(numbers, vec![3, 2, 1], "history should hold distinct versions 1, 2, and 3, newest first");
}
