//! Access-token signing/verification (asymmetric, RS256) and refresh-token secret
//! hashing. Token *minting policy* (who gets a token, rotation bookkeeping) lives in
//! the Token Service (`engine-domain`); this module only wraps the cryptographic
//! primitives so that verification can be performed anywhere the public key is
//! readable without distributing the private key (`SPEC_FULL.md` §9).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub fn sign_access_token(
    claims: &AccessClaims,
    private_key_pem: &[u8],
) -> Result<String, ApiError> {
    let key = EncodingKey::from_rsa_pem(private_key_pem)
        .map_err(|e| ApiError::storage("invalid signing key", e.to_string()))?;
    encode(&Header::new(Algorithm::RS256), claims, &key)
        .map_err(|e| ApiError::storage("failed to sign access token", e.to_string()))
}

pub fn verify_access_token(
    token: &str,
    public_key_pem: &[u8],
    issuer: &str,
) -> Result<AccessClaims, ApiError> {
    let key = DecodingKey::from_rsa_pem(public_key_pem)
        .map_err(|e| ApiError::storage("invalid verification key", e.to_string()))?;
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    decode::<AccessClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| ApiError::unauthorized("access token is invalid or expired, please sign in again"))
}

/// Server-generated refresh-token secret: 48 random bytes, hex-encoded to a
/// 96-character string, per `SPEC_FULL.md` §4.11.
#[must_use]
pub fn generate_refresh_secret() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 48];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Salted hash of a refresh-token secret. A per-row salt is supplied by the caller
/// (typically the row id) so two rows never collide even on secret reuse.
#[must_use]
pub fn hash_refresh_secret(secret: &str, salt: &str, rounds: u32) -> String {
    let mut digest = format!("{salt}:{secret}");
    for _ in 0..rounds.max(1) {
        let mut hasher = Sha256::new();
        hasher.update(digest.as_bytes());
        digest = hex::encode(hasher.finalize());
    }
    digest
}

#[must_use]
pub fn verify_refresh_secret(secret: &str, salt: &str, rounds: u32, stored_hash: &str) -> bool {
    hash_refresh_secret(secret, salt, rounds) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_secret_is_96_hex_chars() {
        let secret = generate_refresh_secret();
        assert_eq!(secret.len(), 96);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn refresh_hash_round_trips() {
        let secret = generate_refresh_secret();
        let hash = hash_refresh_secret(&secret, "row-1", 12);
        assert!(verify_refresh_secret(&secret, "row-1", 12, &hash));
        assert!(!verify_refresh_secret(&secret, "row-2", 12, &hash));
    }
}
