//! Library surface behind the `engine-server` binary: route assembly, auth
//! middleware, and shared state, split out of `main.rs` so the integration test
//! crate can build the same `Router` `tower::ServiceExt::oneshot` drives requests
//! through, without spawning a real `TcpListener`.

pub mod auth;
pub mod handlers;
pub mod response;
pub mod router_fabric;
pub mod state;

use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Assembles the full HTTP surface: the unauthenticated login/refresh routes, the
/// bearer-authenticated model/RBAC/support routes, and the `/api` mount point
/// that delegates to whatever router the Dynamic Route Fabric currently holds
/// (which carries its own, separately layered, `require_auth` middleware).
#[must_use]
pub fn build_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/auth/token", post(handlers::auth::token))
        .route("/auth/logout", post(handlers::auth::logout));

    let protected = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/models", post(handlers::models::create).get(handlers::models::list_all))
        .route(
            "/models/{id}",
            get(handlers::models::get).put(handlers::models::update).delete(handlers::models::delete),
        )
        .route("/models/{id}/publish", post(handlers::models::publish))
        .route("/models/{id}/unpublish", post(handlers::models::unpublish))
        .route("/models/{id}/relations/suggest", get(handlers::models::relation_suggestions))
        .route("/models/{id}/versions", get(handlers::models::list_versions))
        .route("/models/{id}/versions/{n}", get(handlers::models::get_version))
        .route("/models/{id}/versions/{n}/revert", post(handlers::models::revert_version))
        .route("/models/{id}/versions/{n}/publish", post(handlers::models::publish_historical))
        .route("/rbac/grant/role", post(handlers::rbac::grant_role))
        .route("/rbac/grant/user", post(handlers::rbac::grant_user))
        .route("/rbac/grant/user/merged", get(handlers::rbac::merged_user))
        .route("/rbac/models/permissions", post(handlers::rbac::model_permissions))
        .route("/rbac/models/merged", get(handlers::rbac::merged_models))
        .route("/support/stats", get(handlers::support::stats))
        .route("/support/audit", get(handlers::support::audit_feed))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), auth::require_auth));

    public
        .merge(protected)
        .nest("/api", Router::new().fallback(delegate_to_route_fabric))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The Dynamic Route Fabric's stable parent handler: every request under `/api`
/// lands here and is forwarded to whatever router is current at dispatch time.
pub async fn delegate_to_route_fabric(State(state): State<AppState>, request: Request) -> Response {
    match state.route_fabric.current().oneshot(request).await {
        Ok(response) => response,
        Err(infallible) => match infallible {},
    }
}
