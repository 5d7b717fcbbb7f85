mod common;

use common::*;
use std::time::Duration;

/// S6 — concurrently, a stream of requests hits a published model's table while
/// an operator deletes its artifact file out from under the watcher. No request
/// may observe a 5xx from a half-rebuilt router, and the table must eventually
/// (within debounce + rebuild time) settle into a stable 404.
#[tokio::test]
async fn deleting_an_artifact_never_yields_a_server_error_and_settles_to_404() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state.clone(), &models_dir.path());
    let token = admin_token(&app).await;

    let create_body = serde_json::json!({
        "name": "Product",
        "json": { "fields": [ { "name": "name", "type": "string", "required": true } ] }
    });
    let response = send_json(&app, "POST", "/models", Some(&token), create_body).await;
    assert!(response.status().is_success());
    let model_id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();
    let publish_uri = format!("/models/{model_id}/publish");
    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());

    let response = send(&app, "GET", "/api/product", Some(&token)).await;
    assert!(response.status().is_success(), "table should be live before the artifact is deleted");

    engine_server::router_fabric::spawn_watcher(state.clone(), models_dir.path(), Duration::from_millis(50));

    let artifact_path = models_dir.path().join("Product.json");
    std::fs::remove_file(&artifact_path).expect("failed to delete artifact");

    let mut statuses = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    while tokio::time::Instant::now() < deadline {
        let response = send(&app, "GET", "/api/product", Some(&token)).await;
        assert!(
            !response.status().is_server_error(),
            "no request should ever observe a 5xx from a half-rebuilt router, got {}",
            response.status()
        );
        statuses.push(response.status());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(statuses.iter().any(|s| *s == axum::http::StatusCode::NOT_FOUND), "the table should eventually 404");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let response = send(&app, "GET", "/api/product", Some(&token)).await;
    assert_eq!(
        response.status(),
        axum::http::StatusCode::NOT_FOUND,
        "once settled, the deleted model's table should stay 404"
    );

    let first_404 = statuses.iter().position(|s| *s == axum::http::StatusCode::NOT_FOUND).unwrap();
    assert!(
        statuses[first_404..].iter().all(|s| *s == axum::http::StatusCode::NOT_FOUND),
        "once the table starts 404ing it should never flip back to success: {statuses:?}"
    );
}
