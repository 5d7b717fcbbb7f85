mod common;

use common::*;

/// S2 — a draft may reference a model that is not yet published; publishing it
/// fails until the target is published, then succeeds.
#[tokio::test]
async fn publishing_a_relation_to_an_unpublished_model_is_rejected_until_target_publishes() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());
    let token = admin_token(&app).await;

    let customer = serde_json::json!({
        "name": "Customer",
        "json": { "fields": [ { "name": "name", "type": "string", "required": true } ] }
    });
    let response = send_json(&app, "POST", "/models", Some(&token), customer).await;
    assert!(response.status().is_success());
    let customer_id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();

    let order = serde_json::json!({
        "name": "Order",
        "json": {
            "fields": [
                {
                    "name": "customerId",
                    "type": "relation",
                    "relation": { "model": "Customer", "field": "id", "type": "many-to-one" }
                }
            ]
        }
    });
    let response = send_json(&app, "POST", "/models", Some(&token), order).await;
    assert!(response.status().is_success(), "drafting Order against an unpublished Customer should succeed");
    let order_id = response_json(response).await["model"]["id"].as_str().unwrap().to_string();

    let publish_order_uri = format!("/models/{order_id}/publish");
    let response = send_json(&app, "POST", &publish_order_uri, Some(&token), serde_json::json!({})).await;
    assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("customerId"), "error should name the offending field: {message}");
    assert!(message.contains("Customer"), "error should name the unpublished target: {message}");

    let publish_customer_uri = format!("/models/{customer_id}/publish");
    let response = send_json(&app, "POST", &publish_customer_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success());

    let response = send_json(&app, "POST", &publish_order_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success(), "publishing Order should succeed once Customer is published");
}
