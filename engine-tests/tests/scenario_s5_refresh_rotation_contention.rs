mod common;

use common::*;
use engine_entities::RefreshTokenEntity;
use sea_orm::EntityTrait;

/// S5 — two concurrent rotations of the same refresh token: exactly one wins
/// with a fresh pair, the other observes the token as already revoked, and the
/// persisted lineage shows the original token revoked with exactly one
/// successor.
#[tokio::test]
async fn concurrent_refresh_rotation_has_exactly_one_winner() {
    let db = setup_test_db().await;
    let models_dir = TestModelsDir::new();
    let state = build_state(db.clone(), &models_dir.path()).await;
    let app = build_app(state, &models_dir.path());

    let login_body = serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD });
    let response = send_json(&app, "POST", "/auth/token", None, login_body).await;
    assert!(response.status().is_success());
    let login = response_json(response).await;
    let refresh_token = login["refreshToken"].as_str().expect("refreshToken").to_string();
    let original_row_id = refresh_token.split_once("::").expect("wire format").0.to_string();

    let app_a = app.clone();
    let app_b = app.clone();
    let token_a = refresh_token.clone();
    let token_b = refresh_token.clone();

    let (result_a, result_b) = tokio::join!(
        send_json(&app_a, "POST", "/auth/token", None, serde_json::json!({ "refreshToken": token_a })),
        send_json(&app_b, "POST", "/auth/token", None, serde_json::json!({ "refreshToken": token_b })),
    );

    let statuses = [result_a.status(), result_b.status()];
    let success_count = statuses.iter().filter(|s| s.is_success()).count();
    let unauthorized_count = statuses.iter().filter(|s| **s == axum::http::StatusCode::UNAUTHORIZED).count();
    assert_eq!(success_count, 1, "exactly one concurrent rotation should succeed: {statuses:?}");
    assert_eq!(unauthorized_count, 1, "exactly one concurrent rotation should be rejected: {statuses:?}");

    let loser = if result_a.status().is_success() { result_b } else { result_a };
    let loser_body = response_json(loser).await;
    let message = loser_body["message"].as_str().unwrap_or_default();
    assert!(
        message.contains("revoked") || message.contains("sign in again"),
        "loser's message should indicate the token was already rotated: {message}"
    );

    let original_id = uuid::Uuid::parse_str(&original_row_id).unwrap();
    let original = RefreshTokenEntity::find_by_id(original_id)
        .one(&db)
        .await
        .unwrap()
        .expect("original refresh token row should still exist");
    assert!(original.revoked, "original token should now be revoked");
    let replaced_by = original.replaced_by_id.expect("original token should name exactly one successor");

    let all_tokens = RefreshTokenEntity::find().all(&db).await.unwrap();
    let successors: Vec<_> = all_tokens.iter().filter(|t| t.id != original_id).collect();
    assert_eq!(successors.len(), 1, "exactly one successor token row should exist, found {}", successors.len());
    assert_eq!(successors[0].id, replaced_by, "the lone successor should match replacedById");
    assert!(!successors[0].revoked, "the winning successor token should not itself be revoked");
}
