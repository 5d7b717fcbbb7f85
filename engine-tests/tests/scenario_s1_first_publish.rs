mod common;

use common::*;
use engine_entities::ModelVersionEntity;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// S1 — first publish of a model ends with version 1, a lone `ModelVersion` row,
/// an artifact file carrying that version, and the model's table reachable and
/// empty under `/api`.
#[tokio::test]
async fn first_publish_yields_version_one_and_live_empty_table() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state.clone(), &models_dir.path());
    let token = admin_token(&app).await;

    let create_body = serde_json::json!({
        "name": "Product",
        "json": {
            "fields": [
                { "name": "name", "type": "string", "required": true },
                { "name": "price", "type": "number" },
            ]
        }
    });
    let response = send_json(&app, "POST", "/models", Some(&token), create_body).await;
    assert!(response.status().is_success());
    let created = response_json(response).await;
    let model_id = created["model"]["id"].as_str().expect("model id").to_string();

    let publish_uri = format!("/models/{model_id}/publish");
    let response = send_json(&app, "POST", &publish_uri, Some(&token), serde_json::json!({})).await;
    assert!(response.status().is_success(), "publish should succeed");
    let published = response_json(response).await;
    assert_eq!(published["model"]["version"].as_i64(), Some(1));

    let version_count = ModelVersionEntity::find()
        .filter(engine_entities::ModelVersionColumn::ModelId.eq(uuid::Uuid::parse_str(&model_id).unwrap()))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(version_count, 1);

    let artifact_path = models_dir.path().join("Product.json");
    assert!(artifact_path.exists(), "published artifact should exist on disk");
    let artifact: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&artifact_path).unwrap()).unwrap();
    assert_eq!(artifact["version"].as_i64(), Some(1));

    let response = send(&app, "GET", "/api/product", Some(&token)).await;
    assert!(response.status().is_success(), "newly published table should be reachable");
    let body = response_json(response).await;
    assert_eq!(body["success"], serde_json::json!(true));
    assert_eq!(body["total"].as_i64(), Some(0));
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}
