//! Bearer-token authentication middleware. Verifies the access token signature
//! and expiry, then inserts the resolved identity into the request extensions for
//! handlers to pull out with the `AuthUser` extractor, following the same
//! `from_fn_with_state` + `extensions_mut().insert` pattern the teacher's own JWT
//! example documents.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use engine_core::security::jwt::verify_access_token;
use engine_core::ApiError;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;

    let claims = verify_access_token(token, &state.jwt_public_key, &state.config.jwt_issuer)?;
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("access token subject is not a valid id"))?;

    req.extensions_mut().insert(AuthUser { id, email: claims.email, role: claims.role });
    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("authentication required"))
    }
}
