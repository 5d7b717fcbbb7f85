//! Audit Log (C9): append-only event stream with read-time redaction.

use chrono::Utc;
use engine_core::ApiError;
use engine_entities::audit_log;
use sea_orm::{ActiveValue::Set, ConnectionTrait, EntityTrait, QueryOrder, QuerySelect};
use serde_json::Value;
use uuid::Uuid;

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "pwd",
    "token",
    "refreshtoken",
    "tokenhash",
    "ssn",
    "creditcard",
    "cvv",
    "ipaddress",
    "authorization",
    "headers",
    "body",
    "payload",
    "email",
];
const MAX_STRING_LEN: usize = 1_000;
const REDACTED: &str = "[redacted]";

pub async fn append<C: ConnectionTrait>(
    db: &C,
    user_id: Option<Uuid>,
    action: &str,
    model_id: Option<Uuid>,
    model_name: Option<&str>,
    record_id: Option<Uuid>,
    details: Value,
) -> Result<(), ApiError> {
    let row = audit_log::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        action: Set(action.to_string()),
        model_id: Set(model_id),
        model_name: Set(model_name.map(str::to_string)),
        record_id: Set(record_id),
        details: Set(details),
        created_at: Set(Utc::now().into()),
    };
    row.insert(db).await?;
    Ok(())
}

/// Recursively redacts sensitive keys and over-long string values. Applied at read
/// time (not write time) so forensics can still inspect raw storage directly
/// (`SPEC_FULL.md` §9).
#[must_use]
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    if SENSITIVE_KEYS.contains(&k.to_lowercase().as_str()) {
                        (k.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (k.clone(), redact(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::String(s) if s.len() > MAX_STRING_LEN => Value::String(REDACTED.to_string()),
        other => other.clone(),
    }
}

pub async fn list_redacted<C: ConnectionTrait>(
    db: &C,
    limit: u64,
) -> Result<Vec<audit_log::Model>, ApiError> {
    let clamped = limit.clamp(1, 100);
    let rows = audit_log::Entity::find()
        .order_by_desc(audit_log::Column::CreatedAt)
        .limit(clamped)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|mut row| {
            row.details = redact(&row.details);
            row
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_top_level_sensitive_key() {
        let input = json!({"password": "hunter2", "name": "ok"});
        let out = redact(&input);
        assert_eq!(out["password"], json!("[redacted]"));
        assert_eq!(out["name"], json!("ok"));
    }

    #[test]
    fn redacts_nested_and_array_values() {
        let input = json!({"user": {"token": "abc"}, "items": [{"ssn": "123-45-6789"}]});
        let out = redact(&input);
        assert_eq!(out["user"]["token"], json!("[redacted]"));
        assert_eq!(out["items"][0]["ssn"], json!("[redacted]"));
    }

    #[test]
    fn redacts_overlong_strings_regardless_of_key() {
        let long = "x".repeat(1001);
        let input = json!({"note": long});
        let out = redact(&input);
        assert_eq!(out["note"], json!("[redacted]"));
    }

    #[test]
    fn leaves_short_non_sensitive_values_untouched() {
        let input = json!({"count": 3, "label": "fine"});
        let out = redact(&input);
        assert_eq!(out, input);
    }
}
