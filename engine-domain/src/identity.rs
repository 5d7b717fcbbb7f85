//! Identity Store (C2): users, roles, and refresh-token lineage.

use chrono::Utc;
use engine_core::security::password::hash_password;
use engine_core::ApiError;
use engine_entities::{role, user};
use sea_orm::{ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

pub async fn find_role_by_name<C: ConnectionTrait>(
    db: &C,
    name: &str,
) -> Result<Option<role::Model>, ApiError> {
    role::Entity::find().filter(role::Column::Name.eq(name)).one(db).await.map_err(ApiError::from)
}

pub async fn ensure_role<C: ConnectionTrait>(db: &C, name: &str) -> Result<role::Model, ApiError> {
    if let Some(existing) = find_role_by_name(db, name).await? {
        return Ok(existing);
    }
    let model = role::ActiveModel { id: Set(Uuid::new_v4()), name: Set(name.to_string()) };
    model.insert(db).await.map_err(ApiError::from)
}

pub async fn find_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>, ApiError> {
    user::Entity::find().filter(user::Column::Email.eq(email)).one(db).await.map_err(ApiError::from)
}

pub async fn find_user_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<user::Model>, ApiError> {
    user::Entity::find_by_id(id).one(db).await.map_err(ApiError::from)
}

/// Creates a user with a salted-hash password, defaulting the role to "Viewer" when
/// none is given, and failing `Conflict` on a duplicate email.
pub async fn register_user<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
    name: Option<&str>,
    role_name: Option<&str>,
) -> Result<user::Model, ApiError> {
    if find_user_by_email(db, email).await?.is_some() {
        return Err(ApiError::conflict(format!("a user with email '{email}' already exists")));
    }

    let role = ensure_role(db, role_name.unwrap_or(role::VIEWER_ROLE)).await?;
    let password_hash = hash_password(password)?;
    let now = Utc::now();

    let model = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(password_hash),
        name: Set(name.unwrap_or(email).to_string()),
        role_id: Set(role.id),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    model.insert(db).await.map_err(ApiError::from)
}

/// Ensures the Admin role exists and at least one Admin user exists, creating one
/// with the configured bootstrap credentials when none is present. Run once at
/// startup after permission-catalog seeding; idempotent across restarts.
pub async fn bootstrap_admin<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
) -> Result<(), ApiError> {
    let admin_role = ensure_role(db, role::ADMIN_ROLE).await?;

    let has_admin = user::Entity::find()
        .filter(user::Column::RoleId.eq(admin_role.id))
        .one(db)
        .await?
        .is_some();
    if has_admin {
        return Ok(());
    }

    if find_user_by_email(db, email).await?.is_some() {
        return Ok(());
    }

    register_user(db, email, password, Some("Administrator"), Some(role::ADMIN_ROLE)).await?;
    tracing::warn!(email, "bootstrapped initial Admin user with configured/default credentials");
    Ok(())
}

#[cfg(test)]
mod tests {
    // The identity store's async paths require a real or in-memory connection and are
    // exercised by the `engine-tests` integration crate; this module's pure helper
    // (role-name defaulting) is covered there alongside user registration scenarios.
}
