//! Process-wide configuration, loaded once from the environment at startup.
//!
//! Mirrors the env-var contract every external deployment of this platform relies
//! on (`SPEC_FULL.md` §6.3): a missing `.env` file is not an error, but a missing or
//! unparsable required variable is — the server should refuse to start rather than
//! run with half a configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub models_dir: PathBuf,
    pub model_watch_debounce: Duration,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub hash_rounds: u32,
    pub jwt_issuer: String,
    pub jwt_private_key_path: PathBuf,
    pub jwt_public_key_path: PathBuf,
    pub cookie_secure: bool,
    pub cookie_samesite: String,
    pub bootstrap_admin_email: String,
    pub bootstrap_admin_password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration:\n{0}")]
    Invalid(String),
}

impl AppConfig {
    /// Loads configuration from `.env` (if present) then the process environment.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` aggregating every missing/malformed variable,
    /// rather than failing on the first one encountered.
    pub fn load() -> Result<Self, ConfigError> {
        // Best-effort: a missing .env file in production is normal, not an error.
        let _ = dotenvy::dotenv();

        let mut problems = Vec::new();

        let database_url = required("DATABASE_URL", &mut problems);
        let models_dir = optional("MODELS_DIR", "./models");
        let model_watch_debounce_ms = optional_parsed("MODEL_WATCH_DEBOUNCE_MS", 250u64, &mut problems);
        let access_token_ttl_s = optional_parsed("ACCESS_TOKEN_TTL", 900u64, &mut problems);
        let refresh_token_ttl_s = optional_parsed("REFRESH_TOKEN_TTL", 2_592_000u64, &mut problems);
        let hash_rounds = optional_parsed("HASH_ROUNDS", 12u32, &mut problems);
        let jwt_issuer = optional("JWT_ISSUER", "platform");
        let jwt_private_key_path = required("JWT_PRIVATE_KEY_PATH", &mut problems);
        let jwt_public_key_path = required("JWT_PUBLIC_KEY_PATH", &mut problems);
        let cookie_secure = optional_parsed("COOKIE_SECURE", true, &mut problems);
        let cookie_samesite = optional("COOKIE_SAMESITE", "Lax");
        let bootstrap_admin_email = optional("BOOTSTRAP_ADMIN_EMAIL", "admin@platform.local");
        let bootstrap_admin_password = optional("BOOTSTRAP_ADMIN_PASSWORD", "ChangeMe123!");

        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems.join("\n")));
        }

        Ok(Self {
            database_url,
            models_dir: PathBuf::from(models_dir),
            model_watch_debounce: Duration::from_millis(model_watch_debounce_ms),
            access_token_ttl: Duration::from_secs(access_token_ttl_s),
            refresh_token_ttl: Duration::from_secs(refresh_token_ttl_s),
            hash_rounds,
            jwt_issuer,
            jwt_private_key_path: PathBuf::from(jwt_private_key_path),
            jwt_public_key_path: PathBuf::from(jwt_public_key_path),
            cookie_secure,
            cookie_samesite,
            bootstrap_admin_email,
            bootstrap_admin_password,
        })
    }
}

fn required(key: &str, problems: &mut Vec<String>) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => {
            problems.push(format!("missing required environment variable {key}"));
            String::new()
        }
    }
}

fn optional(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_parsed<T>(key: &str, default: T, problems: &mut Vec<String>) -> T
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| {
            problems.push(format!("{key} is not a valid value"));
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_falls_back_to_default() {
        assert_eq!(optional("DEFINITELY_UNSET_VAR_XYZ", "./models"), "./models");
    }

    #[test]
    fn optional_parsed_falls_back_on_missing() {
        let mut problems = Vec::new();
        assert_eq!(optional_parsed::<u64>("DEFINITELY_UNSET_VAR_ABC", 250, &mut problems), 250);
        assert!(problems.is_empty());
    }
}
