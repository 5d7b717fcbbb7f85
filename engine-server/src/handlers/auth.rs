//! Authentication endpoints: password login, refresh-token rotation, logout, and
//! authenticated user registration (`SPEC_FULL.md` §6.1).

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use engine_core::ApiError;
use engine_domain::{authorization, identity, token_service};
use engine_entities::role;
use sea_orm::EntityTrait;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::AuthUser;
use crate::response::ok;
use crate::state::AppState;

const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    email: Option<String>,
    password: Option<String>,
    refresh_token: Option<String>,
    #[serde(default)]
    use_cookie: bool,
}

fn refresh_cookie<'a>(state: &AppState, value: String) -> Cookie<'a> {
    Cookie::build((REFRESH_COOKIE, value))
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(match state.config.cookie_samesite.as_str() {
            "Strict" => SameSite::Strict,
            "None" => SameSite::None,
            _ => SameSite::Lax,
        })
        .path("/")
        .build()
}

fn user_summary(user: &engine_entities::UserModel, role_name: &str) -> Value {
    serde_json::json!({ "id": user.id, "email": user.email, "name": user.name, "role": role_name })
}

/// `POST /auth/token`: `{email,password}` issues a fresh pair; `{refreshToken}`
/// (or the `refreshToken` cookie) rotates the existing lineage.
pub async fn token(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<TokenRequest>,
) -> Result<Response, ApiError> {
    if let (Some(email), Some(password)) = (&body.email, &body.password) {
        let user = identity::find_user_by_email(&state.db, email)
            .await?
            .ok_or_else(|| ApiError::unauthorized("invalid email or password"))?;
        if !user.is_active {
            return Err(ApiError::unauthorized("this account has been deactivated"));
        }
        if !engine_core::security::password::verify_password(password, &user.password_hash) {
            return Err(ApiError::unauthorized("invalid email or password"));
        }
        let role = role::Entity::find_by_id(user.role_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_initialized("user's role no longer exists"))?;

        let issued = token_service::issue(&state.db, &user, &role.name, &state.token_policy()).await?;
        engine_domain::audit::append(
            &state.db,
            Some(user.id),
            "LOGIN",
            None,
            None,
            None,
            serde_json::json!({ "email": user.email }),
        )
        .await?;

        let mut response = serde_json::json!({
            "accessToken": issued.access_token,
            "refreshExpiresAt": issued.refresh_expires_at.to_rfc3339(),
            "user": user_summary(&user, &role.name),
        });

        let jar = if body.use_cookie {
            jar.add(refresh_cookie(&state, issued.refresh_token))
        } else {
            response["refreshToken"] = Value::String(issued.refresh_token);
            jar
        };

        return Ok((jar, ok(response)).into_response());
    }

    let combined = body
        .refresh_token
        .clone()
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| ApiError::bad_request("a refresh token is required"))?;

    let old_row = token_service::validate(&state.db, &combined, state.config.hash_rounds).await?;
    let user = token_service::find_user_for_token(&state.db, &old_row).await?;
    let role = role::Entity::find_by_id(user.role_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_initialized("user's role no longer exists"))?;

    let issued = token_service::rotate(&state.db, &combined, &user, &role.name, &state.token_policy()).await?;
    engine_domain::audit::append(
        &state.db,
        Some(user.id),
        "REFRESH_TOKEN_ROTATED",
        None,
        None,
        None,
        serde_json::json!({ "userId": user.id }),
    )
    .await?;

    let mut response = serde_json::json!({
        "accessToken": issued.access_token,
        "refreshExpiresAt": issued.refresh_expires_at.to_rfc3339(),
        "user": user_summary(&user, &role.name),
    });

    let jar = if body.use_cookie || jar.get(REFRESH_COOKIE).is_some() {
        jar.add(refresh_cookie(&state, issued.refresh_token))
    } else {
        response["refreshToken"] = Value::String(issued.refresh_token);
        jar
    };

    Ok((jar, ok(response)).into_response())
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    refresh_token: Option<String>,
}

/// `POST /auth/logout`: revokes the refresh token supplied via body or cookie.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LogoutRequest>,
) -> Result<Response, ApiError> {
    let combined = body
        .refresh_token
        .or_else(|| jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()))
        .ok_or_else(|| ApiError::bad_request("a refresh token is required"))?;

    token_service::revoke(&state.db, &combined, state.config.hash_rounds).await?;
    let jar = jar.remove(Cookie::from(REFRESH_COOKIE));
    Ok((jar, ok(serde_json::json!({ "loggedOut": true }))).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    email: String,
    password: String,
    name: Option<String>,
    role_name: Option<String>,
}

/// `POST /auth/register`: authenticated, requires feature `CREATE_USER` (Admin bypass).
pub async fn register(
    State(state): State<AppState>,
    actor: AuthUser,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    authorization::require_feature(&state.db, actor.id, "CREATE_USER").await?;
    let user = identity::register_user(
        &state.db,
        &body.email,
        &body.password,
        body.name.as_deref(),
        body.role_name.as_deref(),
    )
    .await?;
    engine_domain::audit::append(
        &state.db,
        Some(actor.id),
        "USER_REGISTER",
        None,
        None,
        None,
        serde_json::json!({ "email": user.email }),
    )
    .await?;
    Ok(ok(serde_json::json!({ "id": user.id, "email": user.email })))
}
