//! Dynamic Route Fabric (C7): builds the `/api/<tableName>` router from the
//! artifacts directory and keeps the `RouteFabric` pointer current as artifacts
//! change on disk.

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use notify_debouncer_mini::new_debouncer;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::handlers::dynamic;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactFile {
    name: String,
    table_name: Option<String>,
}

/// Enumerates `<models_dir>/*.json`, skipping files whose top-level `name` is
/// missing or whose JSON is malformed, and returns each model's canonical name
/// alongside the path segment it mounts under: `tableName` when the artifact
/// sets one, falling back to `name` otherwise (`SPEC_FULL.md` §4.7). A
/// malformed file never aborts the whole build; it is simply skipped.
fn discover_model_names(models_dir: &Path) -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir(models_dir) else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Ok(contents) = std::fs::read_to_string(&path) else { continue };
        match serde_json::from_str::<ArtifactFile>(&contents) {
            Ok(artifact) => {
                let segment = artifact.table_name.unwrap_or_else(|| artifact.name.clone());
                names.push((artifact.name, segment));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping malformed model artifact");
            }
        }
    }
    names
}

/// Builds a fresh `/api` router from the current contents of `models_dir`. Each
/// model gets five handlers bound to its canonical name; an unmatched path falls
/// through to a 404 terminal. Never fails outright — a malformed artifact is
/// skipped, not fatal — so the watcher always has a router to swap in.
#[must_use]
pub fn build_router(state: AppState, models_dir: &Path) -> Router {
    let mut api = Router::new().fallback(api_not_found);

    for (name, table_name) in discover_model_names(models_dir) {
        let segment = format!("/{}", table_name.to_lowercase());

        let create_name = name.clone();
        let list_name = name.clone();
        let get_name = name.clone();
        let update_name = name.clone();
        let delete_name = name.clone();

        let model_router = Router::new()
            .route(
                "/",
                post(move |state, user, body| dynamic::create(state, user, create_name.clone(), body))
                    .get(move |state, user, query| dynamic::list(state, user, list_name.clone(), query)),
            )
            .route(
                "/{id}",
                get(move |state, user, id| dynamic::get(state, user, get_name.clone(), id))
                    .put(move |state, user, id, body| {
                        dynamic::update(state, user, update_name.clone(), id, body)
                    })
                    .delete(move |state, user, id| dynamic::delete(state, user, delete_name.clone(), id)),
            );

        api = api.nest(&segment, model_router);
    }

    api.route_layer(axum::middleware::from_fn_with_state(state.clone(), crate::auth::require_auth))
        .with_state(state)
}

async fn api_not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "success": false, "message": "no model is mounted at this path" })),
    )
}

/// Spawns the artifact-directory watcher: on any add/change/remove event that
/// survives the debounce window, rebuilds the router from scratch and swaps it
/// in. The rebuild runs on a dedicated OS thread since it is blocking filesystem
/// I/O and the watcher's own channel is a plain `std::sync::mpsc`.
pub fn spawn_watcher(state: AppState, models_dir: PathBuf, debounce: Duration) {
    let (tx, rx) = std::sync::mpsc::channel();

    let mut debouncer = match new_debouncer(debounce, tx) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "failed to start model artifact watcher; live reload disabled");
            return;
        }
    };

    if let Err(e) =
        debouncer.watcher().watch(&models_dir, notify_debouncer_mini::notify::RecursiveMode::NonRecursive)
    {
        tracing::error!(error = %e, path = %models_dir.display(), "failed to watch models directory");
        return;
    }

    std::thread::spawn(move || {
        let _debouncer = debouncer;
        for result in rx {
            match result {
                Ok(events) if events.is_empty() => {}
                Ok(_) => {
                    let fresh = build_router(state.clone(), &models_dir);
                    state.route_fabric.swap(fresh);
                    tracing::info!("model artifacts changed; route fabric rebuilt");
                }
                Err(errors) => {
                    for error in errors {
                        tracing::warn!(error = %error, "model artifact watch event error");
                    }
                }
            }
        }
    });
}
