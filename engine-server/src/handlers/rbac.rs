//! RBAC endpoints: feature grants, model-role permission grants, and merged
//! permission views (`SPEC_FULL.md` §6.1, §4.3).

use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use engine_core::ApiError;
use engine_domain::{authorization, identity, permission_catalog};
use engine_entities::{model_definition, model_role_permission, role_permission};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::response::ok;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRoleRequest {
    role_name: String,
    feature: String,
    #[serde(default = "default_granted")]
    granted: bool,
}

fn default_granted() -> bool {
    true
}

/// Grants or revokes a feature at the role level; every user in that role inherits
/// the change unless overridden by a `UserPermission` row.
pub async fn grant_role(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(body): Json<GrantRoleRequest>,
) -> Result<Response, ApiError> {
    authorization::require_feature(&state.db, actor.id, "MANAGE_FEATURES").await?;

    let role = identity::ensure_role(&state.db, &body.role_name).await?;
    let permission = permission_catalog::resolve(&state.db, &body.feature)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("unknown feature key '{}'", body.feature)))?;

    let existing = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(role.id))
        .filter(role_permission::Column::PermissionId.eq(permission.id))
        .one(&state.db)
        .await?;

    match existing {
        Some(row) => {
            let mut active: role_permission::ActiveModel = row.into();
            active.granted = Set(body.granted);
            active.update(&state.db).await?;
        }
        None => {
            let row = engine_entities::role_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                role_id: Set(role.id),
                permission_id: Set(permission.id),
                granted: Set(body.granted),
            };
            row.insert(&state.db).await?;
        }
    }

    Ok(ok(serde_json::json!({ "roleName": role.name, "feature": body.feature, "granted": body.granted })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantUserRequest {
    user_id: Uuid,
    feature: String,
    #[serde(default = "default_granted")]
    granted: bool,
}

pub async fn grant_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(body): Json<GrantUserRequest>,
) -> Result<Response, ApiError> {
    authorization::require_feature(&state.db, actor.id, "MANAGE_FEATURES").await?;
    let applied =
        authorization::grant_user_feature(&state.db, body.user_id, &body.feature, body.granted).await?;
    Ok(ok(serde_json::json!({
        "userId": body.user_id,
        "feature": body.feature,
        "granted": body.granted,
        "applied": applied,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPermissionsRequest {
    model_name: String,
    role_name: String,
    permissions: Vec<String>,
}

/// Grants a role the listed model actions, normalizing `["ALL"]` to the four
/// actions.
pub async fn model_permissions(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(body): Json<ModelPermissionsRequest>,
) -> Result<Response, ApiError> {
    authorization::require_feature(&state.db, actor.id, "MANAGE_FEATURES").await?;

    let model = model_definition::Entity::find()
        .filter(model_definition::Column::Name.eq(&body.model_name))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("model", Some(body.model_name.clone())))?;
    let role = identity::ensure_role(&state.db, &body.role_name).await?;

    let actions: Vec<String> = if body.permissions.iter().any(|p| p.eq_ignore_ascii_case("ALL")) {
        vec!["CREATE".into(), "READ".into(), "UPDATE".into(), "DELETE".into()]
    } else {
        body.permissions.iter().map(|p| p.to_uppercase()).collect()
    };

    for action in &actions {
        let key = format!("MODEL.{action}");
        let permission = permission_catalog::resolve(&state.db, &key)
            .await?
            .ok_or_else(|| ApiError::not_initialized(format!("permission key '{key}' is missing")))?;

        let existing = model_role_permission::Entity::find()
            .filter(model_role_permission::Column::ModelId.eq(model.id))
            .filter(model_role_permission::Column::RoleId.eq(role.id))
            .filter(model_role_permission::Column::PermissionId.eq(permission.id))
            .one(&state.db)
            .await?;

        if existing.is_none() {
            let row = model_role_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                model_id: Set(model.id),
                role_id: Set(role.id),
                permission_id: Set(permission.id),
                allowed: Set(true),
            };
            row.insert(&state.db).await?;
        }
    }

    Ok(ok(serde_json::json!({ "modelName": model.name, "roleName": role.name, "permissions": actions })))
}

#[derive(Debug, Deserialize)]
pub struct MergedUserQuery {
    #[serde(rename = "userId")]
    user_id: Uuid,
}

/// A caller may always inspect their own merged feature view; inspecting someone
/// else's requires `MANAGE_FEATURES`, mirroring `merged_model_permissions`.
pub async fn merged_user(
    State(state): State<AppState>,
    actor: AuthUser,
    Query(query): Query<MergedUserQuery>,
) -> Result<Response, ApiError> {
    if actor.id != query.user_id {
        authorization::require_feature(&state.db, actor.id, "MANAGE_FEATURES").await?;
    }

    let mut merged = serde_json::Map::new();
    for key in permission_catalog::FEATURE_KEYS {
        let value = authorization::is_feature_allowed(&state.db, query.user_id, key).await?;
        merged.insert((*key).to_string(), Value::Bool(value));
    }
    Ok(ok(serde_json::json!({ "userId": query.user_id, "features": merged })))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MergedModelsQuery {
    user_id: Uuid,
    #[serde(default)]
    include_unpublished: bool,
}

pub async fn merged_models(
    State(state): State<AppState>,
    actor: AuthUser,
    Query(query): Query<MergedModelsQuery>,
) -> Result<Response, ApiError> {
    let merged = authorization::merged_model_permissions(
        &state.db,
        actor.id,
        query.user_id,
        query.include_unpublished,
    )
    .await?;
    Ok(ok(serde_json::json!({ "permissions": merged })))
}
