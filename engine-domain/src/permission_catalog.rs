//! Permission Catalog (C1): the canonical set of permission keys and categories.

use engine_core::ApiError;
use engine_entities::PermissionCategory;
use sea_orm::{ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// The four seeded model-action keys the Authorization Engine requires at startup.
pub use engine_entities::permission::MODEL_ACTION_KEYS;
/// The minimum feature-permission keys the platform seeds at startup.
pub use engine_entities::permission::FEATURE_KEYS;

/// Idempotent upsert of a permission key, normalizing it to upper-case.
pub async fn ensure<C: ConnectionTrait>(
    db: &C,
    key: &str,
    name: &str,
    category: PermissionCategory,
) -> Result<engine_entities::PermissionModel, ApiError> {
    let key = key.to_uppercase();
    if let Some(existing) = resolve(db, &key).await? {
        return Ok(existing);
    }
    let model = engine_entities::PermissionActiveModel {
        id: Set(Uuid::new_v4()),
        key: Set(key),
        name: Set(name.to_string()),
        category: Set(category),
    };
    model.insert(db).await.map_err(ApiError::from)
}

pub async fn resolve<C: ConnectionTrait>(
    db: &C,
    key: &str,
) -> Result<Option<engine_entities::PermissionModel>, ApiError> {
    engine_entities::PermissionEntity::find()
        .filter(engine_entities::PermissionColumn::Key.eq(key.to_uppercase()))
        .one(db)
        .await
        .map_err(ApiError::from)
}

/// Seeds the four model-action keys and the minimum feature keys. Called once at
/// server startup; a missing model-action key afterwards is an `InternalNotInitialized`
/// failure for both the Model Registry's publish path and the Authorization Engine.
pub async fn seed<C: ConnectionTrait>(db: &C) -> Result<(), ApiError> {
    for key in MODEL_ACTION_KEYS {
        ensure(db, key, key, PermissionCategory::ModelAction).await?;
    }
    for key in FEATURE_KEYS {
        ensure(db, key, key, PermissionCategory::Feature).await?;
    }
    Ok(())
}

/// Verifies the four model-action keys exist, failing fast with the same error the
/// Model Registry's publish path and the Authorization Engine's merge would raise.
pub async fn require_model_action_keys<C: ConnectionTrait>(db: &C) -> Result<(), ApiError> {
    for key in MODEL_ACTION_KEYS {
        if resolve(db, key).await?.is_none() {
            return Err(ApiError::not_initialized(format!(
                "required permission key '{key}' is missing; run startup seeding"
            )));
        }
    }
    Ok(())
}
