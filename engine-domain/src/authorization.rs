//! Authorization Engine (C3): merges user/role/model-role/feature permissions with
//! an ownership fallback for model-action checks.

use engine_core::ApiError;
use engine_entities::{
    model_definition, model_role_permission, permission, record, role, role_permission, user,
    user_permission,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::Serialize;
use uuid::Uuid;

pub const ADMIN_ROLE: &str = role::ADMIN_ROLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelAction {
    Create,
    Read,
    Update,
    Delete,
}

impl ModelAction {
    fn permission_key(self) -> &'static str {
        match self {
            Self::Create => "MODEL.CREATE",
            Self::Read => "MODEL.READ",
            Self::Update => "MODEL.UPDATE",
            Self::Delete => "MODEL.DELETE",
        }
    }
}

async fn load_user_with_role(
    db: &DatabaseConnection,
    user_id: Uuid,
) -> Result<(user::Model, role::Model), ApiError> {
    let user = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("user no longer exists"))?;
    let role = role::Entity::find_by_id(user.role_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_initialized("user's role no longer exists"))?;
    Ok((user, role))
}

fn is_admin(role: &role::Model) -> bool {
    role.name == ADMIN_ROLE
}

/// `isFeatureAllowed`: Admin short-circuits; otherwise a `UserPermission` row wins
/// over a `RolePermission` row; absent either, the feature is denied.
pub async fn is_feature_allowed(
    db: &DatabaseConnection,
    user_id: Uuid,
    feature_key: &str,
) -> Result<bool, ApiError> {
    let (_, role) = load_user_with_role(db, user_id).await?;
    if is_admin(&role) {
        return Ok(true);
    }

    let Some(permission) = permission::Entity::find()
        .filter(permission::Column::Key.eq(feature_key.to_uppercase()))
        .one(db)
        .await?
    else {
        return Ok(false);
    };

    if let Some(grant) = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(user_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?
    {
        return Ok(grant.granted);
    }

    if let Some(grant) = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(role.id))
        .filter(role_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?
    {
        return Ok(grant.granted);
    }

    Ok(false)
}

pub async fn require_feature(
    db: &DatabaseConnection,
    user_id: Uuid,
    feature_key: &str,
) -> Result<(), ApiError> {
    if is_feature_allowed(db, user_id, feature_key).await? {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("missing required permission '{feature_key}'")))
    }
}

/// `authorize`: model-action check with the layered precedence
/// `ModelRolePermission → RolePermission → ownership fallback → deny`.
pub async fn authorize(
    db: &DatabaseConnection,
    user_id: Uuid,
    model_name: &str,
    action: ModelAction,
    record_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let model = model_definition::Entity::find()
        .filter(model_definition::Column::Name.eq(model_name))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("model", Some(model_name.to_string())))?;

    let (user, role) = load_user_with_role(db, user_id).await?;
    if is_admin(&role) {
        return Ok(());
    }

    let permission_key = action.permission_key();
    let permission = permission::Entity::find()
        .filter(permission::Column::Key.eq(permission_key))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_initialized(format!("permission key '{permission_key}' is missing")))?;

    if let Some(grant) = model_role_permission::Entity::find()
        .filter(model_role_permission::Column::ModelId.eq(model.id))
        .filter(model_role_permission::Column::RoleId.eq(role.id))
        .filter(model_role_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?
    {
        return if grant.allowed { Ok(()) } else { Err(ApiError::forbidden("not permitted on this model")) };
    }

    if let Some(grant) = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(role.id))
        .filter(role_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?
    {
        return if grant.granted { Ok(()) } else { Err(ApiError::forbidden("not permitted on this model")) };
    }

    if matches!(action, ModelAction::Read | ModelAction::Update | ModelAction::Delete) {
        if let (Some(owner_field), Some(record_id)) = (&model.owner_field, record_id) {
            if let Some(record) = record::Entity::find_by_id(record_id).one(db).await? {
                let owns_by_id = record.owner_id == Some(user.id);
                let owns_by_field = record
                    .data
                    .get(owner_field)
                    .and_then(|v| v.as_str())
                    .is_some_and(|v| v == user.id.to_string());
                if owns_by_id || owns_by_field {
                    return Ok(());
                }
            }
        }
    }

    Err(ApiError::forbidden("not permitted on this model"))
}

#[derive(Debug, Clone, Serialize)]
pub struct MergedModelPermissions {
    pub model_name: String,
    pub create: bool,
    pub read: bool,
    pub update: bool,
    pub delete: bool,
}

/// Looks up a `UserPermission` row for the model-action's permission key
/// (e.g. `MODEL.UPDATE`), which is a blanket per-user override independent of
/// any specific model. `None` means no override exists and the caller should
/// fall through to `authorize`'s model-specific precedence.
async fn user_permission_override(
    db: &DatabaseConnection,
    user_id: Uuid,
    action: ModelAction,
) -> Result<Option<bool>, ApiError> {
    let Some(permission) = permission::Entity::find()
        .filter(permission::Column::Key.eq(action.permission_key()))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let grant = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(user_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?;
    Ok(grant.map(|g| g.granted))
}

/// `mergedModelPermissions`: one row per model with the four action booleans,
/// priority `UserPermission → ModelRolePermission → RolePermission → false`. Admin
/// short-circuits to all-true. A caller inspecting another user's merged view
/// requires `MANAGE_FEATURES`.
pub async fn merged_model_permissions(
    db: &DatabaseConnection,
    requesting_user_id: Uuid,
    target_user_id: Uuid,
    include_unpublished: bool,
) -> Result<Vec<MergedModelPermissions>, ApiError> {
    if requesting_user_id != target_user_id {
        require_feature(db, requesting_user_id, "MANAGE_FEATURES").await?;
    }

    let (_, role) = load_user_with_role(db, target_user_id).await?;
    let admin = is_admin(&role);

    let mut query = model_definition::Entity::find();
    if !include_unpublished {
        query = query.filter(model_definition::Column::Published.eq(true));
    }
    let models = query.all(db).await?;

    let mut results = Vec::with_capacity(models.len());
    for model in models {
        if admin {
            results.push(MergedModelPermissions {
                model_name: model.name,
                create: true,
                read: true,
                update: true,
                delete: true,
            });
            continue;
        }

        let mut row = MergedModelPermissions {
            model_name: model.name.clone(),
            create: false,
            read: false,
            update: false,
            delete: false,
        };
        for action in [ModelAction::Create, ModelAction::Read, ModelAction::Update, ModelAction::Delete] {
            let allowed = match user_permission_override(db, target_user_id, action).await? {
                Some(granted) => granted,
                None => authorize(db, target_user_id, &model.name, action, None).await.is_ok(),
            };
            match action {
                ModelAction::Create => row.create = allowed,
                ModelAction::Read => row.read = allowed,
                ModelAction::Update => row.update = allowed,
                ModelAction::Delete => row.delete = allowed,
            }
        }
        results.push(row);
    }
    Ok(results)
}

/// Feature-grant safety rule: granting a feature the user's role already grants is
/// a no-op (reported, not written); revoking a feature that is only granted via the
/// role is rejected — the caller must change the role or grant it there instead.
pub async fn grant_user_feature(
    db: &DatabaseConnection,
    user_id: Uuid,
    feature_key: &str,
    granted: bool,
) -> Result<bool, ApiError> {
    let (_, role) = load_user_with_role(db, user_id).await?;
    let permission = permission::Entity::find()
        .filter(permission::Column::Key.eq(feature_key.to_uppercase()))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("unknown feature key '{feature_key}'")))?;

    let role_grant = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.eq(role.id))
        .filter(role_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?;
    let role_grants_it = role_grant.is_some_and(|g| g.granted);

    if granted && role_grants_it {
        return Ok(false);
    }
    if !granted && role_grants_it {
        return Err(ApiError::conflict(
            "cannot revoke a feature granted at the role level; change the role or revoke it there",
        ));
    }

    let existing = user_permission::Entity::find()
        .filter(user_permission::Column::UserId.eq(user_id))
        .filter(user_permission::Column::PermissionId.eq(permission.id))
        .one(db)
        .await?;

    match existing {
        Some(row) => {
            let mut active: user_permission::ActiveModel = row.into();
            active.granted = sea_orm::ActiveValue::Set(granted);
            sea_orm::ActiveModelTrait::update(active, db).await?;
        }
        None => {
            let row = user_permission::ActiveModel {
                id: sea_orm::ActiveValue::Set(Uuid::new_v4()),
                user_id: sea_orm::ActiveValue::Set(user_id),
                permission_id: sea_orm::ActiveValue::Set(permission.id),
                granted: sea_orm::ActiveValue::Set(granted),
            };
            sea_orm::ActiveModelTrait::insert(row, db).await?;
        }
    }
    Ok(true)
}
