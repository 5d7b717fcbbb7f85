//! Model-management endpoints: draft lifecycle, publish/unpublish, version
//! history, and the relation suggestor (`SPEC_FULL.md` §6.1).

use axum::extract::{Path, Query, State};
use axum::response::Response;
use engine_core::ApiError;
use engine_domain::{authorization, model_registry, relation_suggestor};
use engine_entities::{model_definition, model_version};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::response::ok;
use crate::state::AppState;

async fn require_manage_models(state: &AppState, actor: &AuthUser) -> Result<(), ApiError> {
    authorization::require_feature(&state.db, actor.id, "MANAGE_MODELS").await
}

async fn require_publish_model(state: &AppState, actor: &AuthUser) -> Result<(), ApiError> {
    authorization::require_feature(&state.db, actor.id, "PUBLISH_MODEL").await
}

fn model_body(m: &model_definition::Model) -> Value {
    serde_json::json!({
        "id": m.id,
        "name": m.name,
        "tableName": m.table_name,
        "ownerField": m.owner_field,
        "json": m.json,
        "version": m.version,
        "published": m.published,
        "publishedAt": m.published_at.map(|t| t.to_rfc3339()),
        "isSystem": m.is_system,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateModelRequest {
    name: String,
    json: Value,
    table_name: Option<String>,
    owner_field: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    actor: AuthUser,
    axum::Json(body): axum::Json<CreateModelRequest>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let created =
        model_registry::create(&state.db, &body.name, body.json, body.table_name, body.owner_field).await?;
    Ok(ok(serde_json::json!({ "model": model_body(&created) })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateModelRequest {
    json: Value,
}

pub async fn update(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<UpdateModelRequest>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let updated = model_registry::update_draft(&state.db, id, body.json).await?;
    Ok(ok(serde_json::json!({ "model": model_body(&updated) })))
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteQuery {
    #[serde(default)]
    force: bool,
}

pub async fn delete(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    model_registry::delete(&state.db, id, &state.config.models_dir, query.force).await?;
    Ok(ok(serde_json::json!({ "deleted": true })))
}

pub async fn publish(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_publish_model(&state, &actor).await?;
    let published =
        model_registry::publish(&state.db, id, &state.config.models_dir, Some(actor.id)).await?;
    sync_routes(&state);
    Ok(ok(serde_json::json!({ "model": model_body(&published) })))
}

pub async fn unpublish(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_publish_model(&state, &actor).await?;
    model_registry::unpublish(&state.db, id, &state.config.models_dir).await?;
    sync_routes(&state);
    Ok(ok(serde_json::json!({ "unpublished": true })))
}

/// Immediately rebuilds and swaps the route fabric after a publish/unpublish call
/// returns, so a caller that waits for the HTTP response sees the new routes
/// without depending on the watcher's debounce window.
fn sync_routes(state: &AppState) {
    let fresh = crate::router_fabric::build_router(state.clone(), &state.config.models_dir);
    state.route_fabric.swap(fresh);
}

#[derive(Debug, Deserialize, Default)]
pub struct ListModelsQuery {
    #[serde(default, rename = "onlyPublished")]
    only_published: bool,
}

pub async fn list_all(
    State(state): State<AppState>,
    actor: AuthUser,
    Query(query): Query<ListModelsQuery>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let mut finder = model_definition::Entity::find();
    if query.only_published {
        finder = finder.filter(model_definition::Column::Published.eq(true));
    }
    let models = finder.all(&state.db).await?;
    let body: Vec<Value> = models.iter().map(model_body).collect();
    Ok(ok(serde_json::json!({ "models": body })))
}

pub async fn get(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let model = model_registry::load(&state.db, id).await?;
    Ok(ok(serde_json::json!({ "model": model_body(&model) })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RelationSuggestQuery {
    q: Option<String>,
    #[serde(default = "default_limit")]
    limit: u64,
    #[serde(default = "default_sample_limit")]
    sample_limit: u64,
}

fn default_limit() -> u64 {
    20
}

fn default_sample_limit() -> u64 {
    5
}

pub async fn relation_suggestions(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<RelationSuggestQuery>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let options = relation_suggestor::SuggestOptions {
        query: query.q.as_deref(),
        limit: query.limit,
        sample_limit: query.sample_limit,
    };
    let candidates = relation_suggestor::suggest(&state.db, id, &options).await?;
    Ok(ok(serde_json::json!({ "candidates": candidates })))
}

#[derive(Debug, Deserialize, Default)]
pub struct ListVersionsQuery {
    #[serde(default = "default_versions_limit")]
    limit: u64,
}

fn default_versions_limit() -> u64 {
    20
}

pub async fn list_versions(
    State(state): State<AppState>,
    actor: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ListVersionsQuery>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let clamped = query.limit.clamp(1, 100);
    let versions = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(id))
        .order_by_desc(model_version::Column::VersionNumber)
        .limit(clamped)
        .all(&state.db)
        .await?;
    let body: Vec<Value> = versions
        .iter()
        .map(|v| serde_json::json!({ "versionNumber": v.version_number, "json": v.json, "createdAt": v.created_at.to_rfc3339() }))
        .collect();
    Ok(ok(serde_json::json!({ "versions": body })))
}

pub async fn get_version(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((id, n)): Path<(Uuid, i32)>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let version = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(id))
        .filter(model_version::Column::VersionNumber.eq(n))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("ModelVersion", Some(n.to_string())))?;
    Ok(ok(
        serde_json::json!({ "versionNumber": version.version_number, "json": version.json, "createdAt": version.created_at.to_rfc3339() }),
    ))
}

pub async fn revert_version(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((id, n)): Path<(Uuid, i32)>,
) -> Result<Response, ApiError> {
    require_manage_models(&state, &actor).await?;
    let reverted = model_registry::revert(&state.db, id, n).await?;
    engine_domain::audit::append(
        &state.db,
        Some(actor.id),
        "MODEL_REVERT",
        Some(id),
        Some(&reverted.name),
        None,
        serde_json::json!({ "targetVersion": n }),
    )
    .await?;
    Ok(ok(serde_json::json!({ "model": model_body(&reverted) })))
}

/// `publish-historical`: replaces the draft with a historical snapshot, then runs
/// a normal publish — history is append-only, so this always allocates a fresh
/// version number rather than reusing `n`.
pub async fn publish_historical(
    State(state): State<AppState>,
    actor: AuthUser,
    Path((id, n)): Path<(Uuid, i32)>,
) -> Result<Response, ApiError> {
    require_publish_model(&state, &actor).await?;
    model_registry::revert(&state.db, id, n).await?;
    let published =
        model_registry::publish(&state.db, id, &state.config.models_dir, Some(actor.id)).await?;
    sync_routes(&state);
    Ok(ok(serde_json::json!({ "model": model_body(&published) })))
}
