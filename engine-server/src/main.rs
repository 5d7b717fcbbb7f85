//! Process entry point: loads configuration, connects storage, seeds the
//! permission catalog and an initial Admin user, builds the first `/api` route
//! fabric, starts the artifact watcher, and serves the HTTP surface.

use axum::Router;
use engine_core::AppConfig;
use engine_domain::{identity, model_registry, permission_catalog};
use engine_entities::migration::Migrator;
use engine_server::state::{AppState, RouteFabric};
use engine_server::{build_app, router_fabric};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_target(false).with_level(true).compact().init();

    let config = AppConfig::load().map_err(|e| format!("configuration error:\n{e}"))?;
    tracing::info!(models_dir = %config.models_dir.display(), "starting engine-server");

    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    permission_catalog::seed(&db).await?;
    identity::bootstrap_admin(&db, &config.bootstrap_admin_email, &config.bootstrap_admin_password).await?;

    let jwt_private_key = std::fs::read(&config.jwt_private_key_path).map_err(|e| {
        format!("failed to read JWT_PRIVATE_KEY_PATH '{}': {e}", config.jwt_private_key_path.display())
    })?;
    let jwt_public_key = std::fs::read(&config.jwt_public_key_path).map_err(|e| {
        format!("failed to read JWT_PUBLIC_KEY_PATH '{}': {e}", config.jwt_public_key_path.display())
    })?;

    std::fs::create_dir_all(&config.models_dir)?;
    model_registry::ensure_system_models(&db, &config.models_dir).await?;

    let models_dir = config.models_dir.clone();
    let debounce = config.model_watch_debounce;

    let state = AppState {
        db,
        config: Arc::new(config),
        jwt_private_key: Arc::new(jwt_private_key),
        jwt_public_key: Arc::new(jwt_public_key),
        route_fabric: Arc::new(RouteFabric::new(Router::new())),
    };

    let initial_api_router = router_fabric::build_router(state.clone(), &models_dir);
    state.route_fabric.swap(initial_api_router);
    router_fabric::spawn_watcher(state.clone(), models_dir, debounce);

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("listening on http://0.0.0.0:3000");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received; draining in-flight requests");
}
