//! Support endpoints: platform-wide counters and the redacted audit feed
//! (`SPEC_FULL.md` §6.1, feature keys `VIEW_SUPPORT`/`VIEW_AUDIT`).

use axum::extract::{Query, State};
use axum::response::Response;
use engine_core::ApiError;
use engine_domain::{authorization, audit};
use engine_entities::{model_definition, user};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::response::ok;
use crate::state::AppState;

/// `GET /support/stats`: user/model/publication counts. Requires `VIEW_SUPPORT`.
pub async fn stats(State(state): State<AppState>, actor: AuthUser) -> Result<Response, ApiError> {
    authorization::require_feature(&state.db, actor.id, "VIEW_SUPPORT").await?;

    let total_users = user::Entity::find().count(&state.db).await?;
    let active_users = user::Entity::find().filter(user::Column::IsActive.eq(true)).count(&state.db).await?;
    let total_models = model_definition::Entity::find().count(&state.db).await?;
    let published_models =
        model_definition::Entity::find().filter(model_definition::Column::Published.eq(true)).count(&state.db).await?;

    Ok(ok(serde_json::json!({
        "totalUsers": total_users,
        "activeUsers": active_users,
        "totalModels": total_models,
        "publishedModels": published_models,
    })))
}

#[derive(Debug, Deserialize, Default)]
pub struct AuditQuery {
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    50
}

/// `GET /support/audit?limit=`: most recent events, redacted at read time. Requires
/// `VIEW_AUDIT`.
pub async fn audit_feed(
    State(state): State<AppState>,
    actor: AuthUser,
    Query(query): Query<AuditQuery>,
) -> Result<Response, ApiError> {
    authorization::require_feature(&state.db, actor.id, "VIEW_AUDIT").await?;
    let rows = audit::list_redacted(&state.db, query.limit).await?;
    let events: Vec<Value> = rows
        .into_iter()
        .map(|row| {
            serde_json::json!({
                "id": row.id,
                "userId": row.user_id,
                "action": row.action,
                "modelId": row.model_id,
                "modelName": row.model_name,
                "recordId": row.record_id,
                "details": row.details,
                "createdAt": row.created_at.to_rfc3339(),
            })
        })
        .collect();
    Ok(ok(serde_json::json!({ "events": events })))
}
