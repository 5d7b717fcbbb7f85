//! Token Service (C11): access-token signing and refresh-token rotation.
//!
//! This module owns *policy* (TTLs, rotation bookkeeping, audit emission); the
//! cryptographic primitives themselves (RS256 signing, secret hashing) live in
//! `engine_core::security` so verification can run anywhere the public key is
//! readable without distributing the private key (`SPEC_FULL.md` §9).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use engine_core::security::jwt::{
    generate_refresh_secret, hash_refresh_secret, sign_access_token, verify_refresh_secret, AccessClaims,
};
use engine_core::ApiError;
use engine_entities::{refresh_token, user};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionError,
    TransactionTrait,
};
use std::time::Duration;
use uuid::Uuid;

pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone, Copy)]
pub struct TokenPolicy<'a> {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub hash_rounds: u32,
    pub jwt_issuer: &'a str,
    pub jwt_private_key_pem: &'a [u8],
    pub jwt_public_key_pem: &'a [u8],
}

/// Mints a fresh access + refresh pair for a user and persists the refresh row.
pub async fn issue<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
    role_name: &str,
    policy: &TokenPolicy<'_>,
) -> Result<IssuedTokens, ApiError> {
    let now = Utc::now();
    let claims = AccessClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: role_name.to_string(),
        iss: policy.jwt_issuer.to_string(),
        iat: now.timestamp(),
        exp: (now + ChronoDuration::from_std(policy.access_token_ttl).unwrap_or_default()).timestamp(),
    };
    let access_token = sign_access_token(&claims, policy.jwt_private_key_pem)?;

    let row_id = Uuid::new_v4();
    let secret = generate_refresh_secret();
    let expires_at = now + ChronoDuration::from_std(policy.refresh_token_ttl).unwrap_or_default();
    let token_hash = hash_refresh_secret(&secret, &row_id.to_string(), policy.hash_rounds);

    let row = refresh_token::ActiveModel {
        id: Set(row_id),
        token_hash: Set(token_hash),
        user_id: Set(user.id),
        created_at: Set(now.into()),
        expires_at: Set(expires_at.into()),
        revoked: Set(false),
        revoked_at: Set(None),
        replaced_by_id: Set(None),
        created_by_ip: Set(None),
    };
    row.insert(db).await.map_err(ApiError::from)?;

    Ok(IssuedTokens {
        access_token,
        refresh_token: format!("{row_id}::{secret}"),
        refresh_expires_at: expires_at,
    })
}

pub fn verify_access(token: &str, policy: &TokenPolicy<'_>) -> Result<AccessClaims, ApiError> {
    engine_core::security::jwt::verify_access_token(token, policy.jwt_public_key_pem, policy.jwt_issuer)
}

fn parse_wire(combined: &str) -> Result<(Uuid, &str), ApiError> {
    let (id_part, secret) = combined
        .split_once("::")
        .ok_or_else(|| ApiError::unauthorized("malformed refresh token, please sign in again"))?;
    let id = Uuid::parse_str(id_part)
        .map_err(|_| ApiError::unauthorized("malformed refresh token, please sign in again"))?;
    Ok((id, secret))
}

/// Loads and validates a refresh-token row: not found, revoked, expired, and
/// hash-mismatch all fail the same way, guiding the caller to re-authenticate.
pub async fn validate<C: ConnectionTrait>(
    db: &C,
    combined: &str,
    hash_rounds: u32,
) -> Result<refresh_token::Model, ApiError> {
    let (id, secret) = parse_wire(combined)?;
    let row = refresh_token::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("refresh token not recognized, please sign in again"))?;

    if row.revoked {
        return Err(ApiError::unauthorized("refresh token has been revoked, please sign in again"));
    }
    if row.expires_at < Utc::now() {
        return Err(ApiError::unauthorized("refresh token has expired, please sign in again"));
    }
    if !verify_refresh_secret(secret, &row.id.to_string(), hash_rounds, &row.token_hash) {
        return Err(ApiError::unauthorized("refresh token is invalid, please sign in again"));
    }
    Ok(row)
}

/// Rotates a refresh token: validates the old row, creates a new row with a fresh
/// secret and expiry, and revokes the old row with `replacedById` set, all inside
/// one transaction. The revoke is a conditional update (`revoked=false` in the
/// `WHERE` clause, checked against rows-affected) rather than a plain
/// read-modify-write, and the new row's insert lives in the same transaction as
/// that update, so two concurrent rotations of the same token cannot both
/// observe an unrevoked row and both win: the loser's conditional update affects
/// zero rows, its transaction rolls back (so it never leaves behind an unused new
/// token row), and it reports the token as already revoked.
pub async fn rotate<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    combined: &str,
    user: &user::Model,
    role_name: &str,
    policy: &TokenPolicy<'_>,
) -> Result<IssuedTokens, ApiError> {
    let old = validate(db, combined, policy.hash_rounds).await?;
    let old_id = old.id;
    let user = user.clone();
    let role_name = role_name.to_string();
    let policy = *policy;

    db.transaction::<_, IssuedTokens, ApiError>(|txn| {
        Box::pin(async move {
            let issued = issue(txn, &user, &role_name, &policy).await?;
            let (new_id, _) = parse_wire(&issued.refresh_token)?;

            let update = refresh_token::Entity::update_many()
                .col_expr(refresh_token::Column::Revoked, Expr::value(true))
                .col_expr(refresh_token::Column::RevokedAt, Expr::value(Some(Utc::now())))
                .col_expr(refresh_token::Column::ReplacedById, Expr::value(Some(new_id)))
                .filter(refresh_token::Column::Id.eq(old_id))
                .filter(refresh_token::Column::Revoked.eq(false))
                .exec(txn)
                .await?;

            if update.rows_affected == 0 {
                return Err(ApiError::unauthorized("refresh token has been revoked, please sign in again"));
            }

            Ok(issued)
        })
    })
    .await
    .map_err(|e| match e {
        TransactionError::Connection(db_err) => ApiError::from(db_err),
        TransactionError::Transaction(api_err) => api_err,
    })
}

pub async fn revoke<C: ConnectionTrait>(db: &C, combined: &str, hash_rounds: u32) -> Result<(), ApiError> {
    let row = validate(db, combined, hash_rounds).await?;
    let mut active: refresh_token::ActiveModel = row.into();
    active.revoked = Set(true);
    active.revoked_at = Set(Some(Utc::now().into()));
    active.update(db).await.map_err(ApiError::from)?;
    Ok(())
}

pub async fn find_user_for_token<C: ConnectionTrait>(
    db: &C,
    row: &refresh_token::Model,
) -> Result<user::Model, ApiError> {
    user::Entity::find()
        .filter(user::Column::Id.eq(row.user_id))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("the user for this refresh token no longer exists"))
}
