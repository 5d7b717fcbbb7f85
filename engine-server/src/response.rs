//! The success envelope every handler returns. Failure responses are produced
//! directly by `engine_core::ApiError`'s own `IntoResponse` impl (`SPEC_FULL.md` §7).

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{Map, Value};

/// Wraps a serializable payload as `{success: true, ...payload fields}`, matching
/// the `{success:true, record|items|total|...}` shape in §6.1. `payload` must
/// serialize to a JSON object; anything else is folded under a `data` key.
pub fn ok<T: Serialize>(payload: T) -> Response {
    let mut body = match serde_json::to_value(payload) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
        Err(_) => Map::new(),
    };
    body.insert("success".to_string(), Value::Bool(true));
    Json(Value::Object(body)).into_response()
}
