//! Password hashing, grounded in the `Argon2id` + `PasswordHasher`/`PasswordVerifier`
//! pattern used by the pack's identity-platform reference crate.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::errors::ApiError;

/// Hashes a plaintext password, encoding the salt and Argon2 parameters into the
/// returned PHC string so it is self-describing at verification time.
pub fn hash_password(raw: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(raw.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::storage("failed to hash password", e.to_string()))
}

/// Verifies a plaintext password against a previously stored PHC hash string.
#[must_use]
pub fn verify_password(raw: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default().verify_password(raw.as_bytes(), &parsed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_correct_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password("correct horse battery staple", &hash));
    }

    #[test]
    fn rejects_wrong_password() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(!verify_password("wrong password", &hash));
    }

    #[test]
    fn rejects_malformed_stored_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }
}
