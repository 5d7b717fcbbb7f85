//! The five generic handlers mounted per published model under `/api/<tableName>`
//! (`SPEC_FULL.md` §4.7). Each handler authenticates (via the `require_auth`
//! middleware layered onto the whole `/api` router), authorizes the action against
//! the model name, then delegates to the Record Service.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use engine_core::ApiError;
use engine_domain::authorization::{self, ModelAction};
use engine_domain::record_service::{self, ListParams};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::response::ok;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: u64,
    #[serde(default)]
    skip: u64,
    #[serde(default)]
    owner_only: bool,
}

fn default_limit() -> u64 {
    20
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    model_name: String,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    authorization::authorize(&state.db, user.id, &model_name, ModelAction::Create, None).await?;
    let resolved = record_service::resolve_published_model(&state.db, &model_name).await?;
    let payload = body.as_object().cloned().ok_or_else(|| ApiError::bad_request("body must be a JSON object"))?;
    let record = record_service::create(&state.db, &resolved, payload, Some(user.id)).await?;
    let action = match resolved.definition.name.as_str() {
        "User" if resolved.definition.is_system => "SYSTEM_USER_CREATE",
        "Role" if resolved.definition.is_system => "SYSTEM_ROLE_CREATE",
        _ => "RECORD_CREATE",
    };
    engine_domain::audit::append(
        &state.db,
        Some(user.id),
        action,
        Some(resolved.definition.id),
        Some(&resolved.definition.name),
        Some(record.id),
        record.data.clone(),
    )
    .await?;
    Ok(ok(serde_json::json!({ "record": { "id": record.id, "data": record.data } })))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    model_name: String,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    authorization::authorize(&state.db, user.id, &model_name, ModelAction::Read, None).await?;
    let resolved = record_service::resolve_published_model(&state.db, &model_name).await?;
    let params = ListParams {
        limit: query.limit,
        skip: query.skip,
        owner_only: query.owner_only,
        acting_user_id: Some(user.id),
    };
    let result = record_service::list(&state.db, &resolved, &params).await?;
    let items: Vec<Value> = result
        .items
        .into_iter()
        .map(|r| serde_json::json!({ "id": r.id, "data": r.data }))
        .collect();
    Ok(ok(serde_json::json!({ "items": items, "total": result.total })))
}

pub async fn get(
    State(state): State<AppState>,
    user: AuthUser,
    model_name: String,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let resolved = record_service::resolve_published_model(&state.db, &model_name).await?;
    authorization::authorize(&state.db, user.id, &model_name, ModelAction::Read, Some(id)).await?;
    let record = record_service::get(&state.db, &resolved, id).await?;
    Ok(ok(serde_json::json!({ "record": { "id": record.id, "data": record.data } })))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    model_name: String,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let resolved = record_service::resolve_published_model(&state.db, &model_name).await?;
    authorization::authorize(&state.db, user.id, &model_name, ModelAction::Update, Some(id)).await?;
    let patch = body.as_object().cloned().ok_or_else(|| ApiError::bad_request("body must be a JSON object"))?;
    let record = record_service::update(&state.db, &resolved, id, patch).await?;
    engine_domain::audit::append(
        &state.db,
        Some(user.id),
        "RECORD_UPDATE",
        Some(resolved.definition.id),
        Some(&resolved.definition.name),
        Some(record.id),
        record.data.clone(),
    )
    .await?;
    Ok(ok(serde_json::json!({ "record": { "id": record.id, "data": record.data } })))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    model_name: String,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let resolved = record_service::resolve_published_model(&state.db, &model_name).await?;
    authorization::authorize(&state.db, user.id, &model_name, ModelAction::Delete, Some(id)).await?;
    record_service::delete(&state.db, &resolved, id).await?;
    engine_domain::audit::append(
        &state.db,
        Some(user.id),
        "RECORD_DELETE",
        Some(resolved.definition.id),
        Some(&resolved.definition.name),
        Some(id),
        serde_json::json!({ "id": id }),
    )
    .await?;
    Ok(ok(serde_json::json!({ "deleted": true })).into_response())
}
