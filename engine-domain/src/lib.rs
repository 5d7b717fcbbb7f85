pub mod artifact;
pub mod audit;
pub mod authorization;
pub mod identity;
pub mod model_registry;
pub mod permission_catalog;
pub mod record_service;
pub mod relation_suggestor;
pub mod schema;
pub mod token_service;
