//! Relation Suggestor (C10): candidate-target enumeration for a model-authoring
//! relation picker.

use crate::schema::Schema;
use engine_core::ApiError;
use engine_entities::{model_definition, record, role, user};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelationCandidate {
    pub id: String,
    pub name: String,
    pub table_name: Option<String>,
    pub latest_version: i32,
    pub display_field: String,
    pub fields: Vec<String>,
    pub total_records: u64,
    pub samples: Vec<SampleRecord>,
}

pub struct SuggestOptions<'a> {
    pub query: Option<&'a str>,
    pub limit: u64,
    pub sample_limit: u64,
}

fn display_field(fields: &[String]) -> String {
    for candidate in ["name", "title", "label", "displayName"] {
        if fields.iter().any(|f| f == candidate) {
            return candidate.to_string();
        }
    }
    fields.first().cloned().unwrap_or_else(|| "id".to_string())
}

fn matches_query(name: &str, query: Option<&str>) -> bool {
    query.is_none_or(|q| name.to_lowercase().contains(&q.to_lowercase()))
}

pub async fn suggest(
    db: &DatabaseConnection,
    base_model_id: Uuid,
    options: &SuggestOptions<'_>,
) -> Result<Vec<RelationCandidate>, ApiError> {
    let limit = options.limit.clamp(1, 100);
    let sample_limit = options.sample_limit.clamp(0, 10);

    let base = model_definition::Entity::find_by_id(base_model_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("ModelDefinition", Some(base_model_id.to_string())))?;

    let mut candidates = Vec::new();

    let published = model_definition::Entity::find()
        .filter(model_definition::Column::Published.eq(true))
        .filter(model_definition::Column::Id.ne(base_model_id))
        .filter(model_definition::Column::IsSystem.eq(false))
        .all(db)
        .await?;

    for model in published {
        if !matches_query(&model.name, options.query) {
            continue;
        }
        let Ok(schema) = Schema::parse(&model.json) else { continue };
        let mut fields: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();
        if !fields.iter().any(|f| f == "id") {
            fields.insert(0, "id".to_string());
        }

        let total_records =
            record::Entity::find().filter(record::Column::ModelId.eq(model.id)).count(db).await?;

        let display = display_field(&fields);
        let recent = record::Entity::find()
            .filter(record::Column::ModelId.eq(model.id))
            .order_by_desc(record::Column::CreatedAt)
            .limit(sample_limit)
            .all(db)
            .await?;

        let samples = recent
            .into_iter()
            .map(|r| SampleRecord {
                id: r.id.to_string(),
                label: r.data.get(&display).map_or_else(|| r.id.to_string(), |v| value_to_label(v)),
            })
            .collect();

        candidates.push(RelationCandidate {
            id: model.id.to_string(),
            name: model.name.clone(),
            table_name: model.table_name.clone(),
            latest_version: model.version,
            display_field: display,
            fields,
            total_records,
            samples,
        });

        if candidates.len() as u64 >= limit {
            return Ok(candidates);
        }
    }

    for (key, name) in [("User", "User"), ("Role", "Role")] {
        if base.name == name || !matches_query(name, options.query) {
            continue;
        }
        let candidate = system_candidate(db, key, sample_limit).await?;
        candidates.push(candidate);
        if candidates.len() as u64 >= limit {
            break;
        }
    }

    candidates.truncate(limit as usize);
    Ok(candidates)
}

async fn system_candidate(
    db: &DatabaseConnection,
    key: &str,
    sample_limit: u64,
) -> Result<RelationCandidate, ApiError> {
    match key {
        "User" => {
            let total = user::Entity::find().count(db).await?;
            let recent = user::Entity::find()
                .order_by_desc(user::Column::CreatedAt)
                .limit(sample_limit)
                .all(db)
                .await?;
            Ok(RelationCandidate {
                id: "system:User".to_string(),
                name: "User".to_string(),
                table_name: None,
                latest_version: 0,
                display_field: "email".to_string(),
                fields: vec!["id".into(), "email".into(), "name".into(), "roleId".into()],
                total_records: total,
                samples: recent
                    .into_iter()
                    .map(|u| SampleRecord { id: u.id.to_string(), label: u.email })
                    .collect(),
            })
        }
        "Role" => {
            let total = role::Entity::find().count(db).await?;
            let recent = role::Entity::find().limit(sample_limit).all(db).await?;
            Ok(RelationCandidate {
                id: "system:Role".to_string(),
                name: "Role".to_string(),
                table_name: None,
                latest_version: 0,
                display_field: "name".to_string(),
                fields: vec!["id".into(), "name".into()],
                total_records: total,
                samples: recent
                    .into_iter()
                    .map(|r| SampleRecord { id: r.id.to_string(), label: r.name })
                    .collect(),
            })
        }
        other => Err(ApiError::not_initialized(format!("unknown system candidate key '{other}'"))),
    }
}

fn value_to_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_field_prefers_name_over_other_candidates() {
        let fields = vec!["id".to_string(), "title".to_string(), "name".to_string()];
        assert_eq!(display_field(&fields), "name");
    }

    #[test]
    fn display_field_falls_back_to_first_field() {
        let fields = vec!["sku".to_string(), "price".to_string()];
        assert_eq!(display_field(&fields), "sku");
    }
}
