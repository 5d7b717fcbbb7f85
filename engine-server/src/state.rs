//! Process-wide shared state: the database pool, loaded configuration, RSA key
//! material, and the Dynamic Route Fabric's current-router pointer.

use axum::Router;
use engine_core::AppConfig;
use engine_domain::token_service::TokenPolicy;
use sea_orm::DatabaseConnection;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub jwt_private_key: Arc<Vec<u8>>,
    pub jwt_public_key: Arc<Vec<u8>>,
    pub route_fabric: Arc<RouteFabric>,
}

impl AppState {
    #[must_use]
    pub fn token_policy(&self) -> TokenPolicy<'_> {
        TokenPolicy {
            access_token_ttl: self.config.access_token_ttl,
            refresh_token_ttl: self.config.refresh_token_ttl,
            hash_rounds: self.config.hash_rounds,
            jwt_issuer: &self.config.jwt_issuer,
            jwt_private_key_pem: &self.jwt_private_key,
            jwt_public_key_pem: &self.jwt_public_key,
        }
    }
}

/// The Dynamic Route Fabric's current-router indirection (`SPEC_FULL.md` §4.7): a
/// stable parent handler delegates every `/api` request to whatever router is
/// current at dispatch time. Swapping the pointer is a single write-lock critical
/// section; no handler ever holds the lock across a suspension point because
/// `axum::Router` is a cheap `Arc`-backed clone.
pub struct RouteFabric {
    current: RwLock<Router>,
}

impl RouteFabric {
    #[must_use]
    pub fn new(initial: Router) -> Self {
        Self { current: RwLock::new(initial) }
    }

    #[must_use]
    pub fn current(&self) -> Router {
        self.current.read().expect("route fabric lock poisoned").clone()
    }

    pub fn swap(&self, next: Router) {
        *self.current.write().expect("route fabric lock poisoned") = next;
    }
}
