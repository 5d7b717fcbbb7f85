//! Model Registry (C4): the model-definition lifecycle state machine
//! (draft → publish → unpublish/revert) plus relation-graph validation.

use crate::artifact::{self, ArtifactBody};
use crate::permission_catalog;
use crate::schema::{RelationKind, Schema};
use chrono::Utc;
use engine_core::ApiError;
use engine_entities::{model_definition, model_role_permission, model_version, record, role};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde_json::Value;
use std::path::Path;
use uuid::Uuid;

fn system_field_names(model_name: &str) -> Option<&'static [&'static str]> {
    match model_name {
        "User" => Some(&["id", "email", "password", "name", "roleId", "isActive", "createdAt", "updatedAt"]),
        "Role" => Some(&["id", "name"]),
        _ => None,
    }
}

pub async fn load(db: &DatabaseConnection, model_id: Uuid) -> Result<model_definition::Model, ApiError> {
    model_definition::Entity::find_by_id(model_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("ModelDefinition", Some(model_id.to_string())))
}

pub async fn find_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<model_definition::Model>, ApiError> {
    model_definition::Entity::find()
        .filter(model_definition::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(ApiError::from)
}

/// Loads the latest (highest `versionNumber`) snapshot's field schema for a model,
/// falling back to the built-in field list for `User`/`Role` when no version has
/// been published yet (`SPEC_FULL.md` §4.4).
async fn latest_published_fields(
    db: &DatabaseConnection,
    target: &model_definition::Model,
) -> Result<Vec<String>, ApiError> {
    let latest = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(target.id))
        .order_by_desc(model_version::Column::VersionNumber)
        .one(db)
        .await?;

    if let Some(version) = latest {
        let schema = Schema::parse(&version.json)?;
        return Ok(schema.fields.into_iter().map(|f| f.name).collect());
    }

    if let Some(fallback) = system_field_names(&target.name) {
        return Ok(fallback.iter().map(|s| (*s).to_string()).collect());
    }

    Ok(Vec::new())
}

/// Relation-target validation invoked by create/update/publish/revert.
/// `many-to-many` and self-references are rejected unconditionally, since
/// they're structural properties of the schema alone and catching them at draft
/// time gives the fastest possible feedback. Whether the target model must
/// already be published, and whether its field must already exist on a
/// published snapshot, is controlled by `require_published`: a draft is allowed
/// to name a field on a model that doesn't exist yet or isn't published yet
/// (S2's "create Order referencing an unpublished Customer" succeeds), but
/// publishing that draft re-checks with `require_published = true` and fails
/// until the target is itself published.
pub async fn validate_relation_targets(
    db: &DatabaseConnection,
    schema: &Schema,
    owning_model_name: &str,
    require_published: bool,
) -> Result<(), ApiError> {
    for field in schema.relation_fields() {
        let relation = field.relation.as_ref().expect("relation field has relation descriptor");

        if relation.kind == RelationKind::ManyToMany {
            return Err(ApiError::bad_request(format!(
                "field '{}' uses many-to-many, which is not supported; use an explicit linking model",
                field.name
            )));
        }

        if relation.model.eq_ignore_ascii_case(owning_model_name) {
            return Err(ApiError::bad_request(format!(
                "field '{}' references its own model '{}'; self-references are not supported",
                field.name, owning_model_name
            )));
        }

        if !require_published {
            continue;
        }

        let target = find_by_name(db, &relation.model).await?.ok_or_else(|| {
            ApiError::bad_request(format!(
                "field '{}' references unknown model '{}'",
                field.name, relation.model
            ))
        })?;

        if !target.published {
            return Err(ApiError::bad_request(format!(
                "field '{}' references model '{}', which is not published",
                field.name, relation.model
            )));
        }

        let target_fields = latest_published_fields(db, &target).await?;
        if relation.field != "id" && !target_fields.iter().any(|f| f == &relation.field) {
            return Err(ApiError::bad_request(format!(
                "field '{}' references field '{}' which does not exist on model '{}'",
                field.name, relation.field, relation.model
            )));
        }
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    name: &str,
    json: Value,
    table_name: Option<String>,
    owner_field: Option<String>,
) -> Result<model_definition::Model, ApiError> {
    if find_by_name(db, name).await?.is_some() {
        return Err(ApiError::conflict(format!("a model named '{name}' already exists")));
    }

    let schema = Schema::parse(&json)?;
    validate_relation_targets(db, &schema, name, false).await?;

    let model = model_definition::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        table_name: Set(table_name),
        owner_field: Set(owner_field),
        json: Set(json),
        version: Set(0),
        published: Set(false),
        published_at: Set(None),
        published_by: Set(None),
        is_system: Set(false),
        file_path: Set(None),
    };
    model.insert(db).await.map_err(ApiError::from)
}

pub async fn update_draft(
    db: &DatabaseConnection,
    model_id: Uuid,
    json: Value,
) -> Result<model_definition::Model, ApiError> {
    let existing = load(db, model_id).await?;
    if existing.is_system {
        return Err(ApiError::forbidden("system models cannot be structurally edited"));
    }

    let schema = Schema::parse(&json)?;
    validate_relation_targets(db, &schema, &existing.name, false).await?;

    let mut active: model_definition::ActiveModel = existing.into();
    active.json = Set(json);
    active.update(db).await.map_err(ApiError::from)
}

async fn replace_model_role_permissions(
    db: &sea_orm::DatabaseTransaction,
    model_id: Uuid,
    rbac: Option<&Value>,
) -> Result<(), ApiError> {
    model_role_permission::Entity::delete_many()
        .filter(model_role_permission::Column::ModelId.eq(model_id))
        .exec(db)
        .await?;

    let Some(rbac) = rbac.and_then(Value::as_object) else {
        return Ok(());
    };

    for (role_name, actions) in rbac {
        let role_row = if let Some(existing) = role::Entity::find()
            .filter(role::Column::Name.eq(role_name.as_str()))
            .one(db)
            .await?
        {
            existing
        } else {
            let created =
                role::ActiveModel { id: Set(Uuid::new_v4()), name: Set(role_name.clone()) };
            created.insert(db).await?
        };

        let raw_actions: Vec<String> = actions
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_uppercase)).collect())
            .unwrap_or_default();

        let actions = if raw_actions.iter().any(|a| a == "ALL") {
            vec!["CREATE".to_string(), "READ".to_string(), "UPDATE".to_string(), "DELETE".to_string()]
        } else {
            raw_actions
        };

        for action in actions {
            let key = format!("MODEL.{action}");
            let permission = permission_catalog::resolve(db, &key).await?.ok_or_else(|| {
                ApiError::not_initialized(format!("permission key '{key}' is missing; run startup seeding"))
            })?;

            let grant = model_role_permission::ActiveModel {
                id: Set(Uuid::new_v4()),
                model_id: Set(model_id),
                role_id: Set(role_row.id),
                permission_id: Set(permission.id),
                allowed: Set(true),
            };
            grant.insert(db).await?;
        }
    }

    Ok(())
}

fn build_artifact_body<'a>(
    definition: &'a model_definition::Model,
    version: i32,
    published_at: chrono::DateTime<Utc>,
    schema_json: &'a Value,
) -> ArtifactBody<'a> {
    ArtifactBody {
        id: definition.id.to_string(),
        name: &definition.name,
        table_name: definition.table_name.as_deref(),
        owner_field: definition.owner_field.as_deref(),
        version,
        published_at: published_at.to_rfc3339(),
        is_system: definition.is_system,
        definition: schema_json.clone(),
    }
}

/// Publishes the current draft: computes the next version number, snapshots the
/// draft `json` into a new `ModelVersion`, replaces the model's RBAC grants, and
/// writes the artifact. The artifact's temp file is written *before* the database
/// transaction opens (a serialization/filesystem failure aborts with nothing
/// committed); the transaction then commits the version bump and RBAC rows; the
/// temp file is renamed onto its final path only after that commit succeeds. A
/// rename failure at that point is reported as `PartialFailure`: the database state
/// is authoritative and already committed.
pub async fn publish(
    db: &DatabaseConnection,
    model_id: Uuid,
    models_dir: &Path,
    published_by: Option<Uuid>,
) -> Result<model_definition::Model, ApiError> {
    let definition = load(db, model_id).await?;
    let schema = Schema::parse(&definition.json)?;
    validate_relation_targets(db, &schema, &definition.name, true).await?;

    let latest = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(model_id))
        .order_by_desc(model_version::Column::VersionNumber)
        .one(db)
        .await?;
    let new_version = latest.map_or(1, |v| v.version_number + 1);
    let now = Utc::now();

    let artifact_json = definition.json.clone();
    let artifact_body = build_artifact_body(&definition, new_version, now, &artifact_json);
    let (temp_path, final_path) = artifact::write_temp(models_dir, &artifact_body)?;

    let definition_name = definition.name.clone();
    let rbac = schema.rbac.clone();

    let commit_result = db
        .transaction::<_, model_definition::Model, ApiError>(|txn| {
            Box::pin(async move {
                let mut active: model_definition::ActiveModel = definition.into();
                active.version = Set(new_version);
                active.published = Set(true);
                active.published_at = Set(Some(now.into()));
                active.published_by = Set(published_by);
                active.file_path = Set(Some(final_path.display().to_string()));
                let updated = active.update(txn).await?;

                let version_row = model_version::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    model_id: Set(model_id),
                    version_number: Set(new_version),
                    json: Set(updated.json.clone()),
                    created_by: Set(published_by),
                    created_at: Set(now.into()),
                };
                version_row.insert(txn).await?;

                replace_model_role_permissions(txn, model_id, rbac.as_ref()).await?;

                Ok(updated)
            })
        })
        .await;

    match commit_result {
        Ok(updated) => match artifact::finalize(&temp_path, &final_path) {
            Ok(()) => Ok(updated),
            Err(e) => Err(ApiError::partial_failure(
                format!("model '{definition_name}' published but the artifact could not be written: {e}"),
                Some(serde_json::json!({ "modelName": definition_name, "reason": e.to_string() })),
            )),
        },
        Err(err) => {
            let _ = std::fs::remove_file(&temp_path);
            Err(into_api_error(err))
        }
    }
}

fn into_api_error(err: sea_orm::TransactionError<ApiError>) -> ApiError {
    match err {
        sea_orm::TransactionError::Connection(db_err) => ApiError::from(db_err),
        sea_orm::TransactionError::Transaction(api_err) => api_err,
    }
}

/// Registers and publishes the built-in `User`/`Role` model definitions on first
/// startup, so `/api/user` and `/api/role` are reachable through the same Dynamic
/// Route Fabric as any other model without an operator ever drafting them by
/// hand. Idempotent: a model already present (by name) is left untouched, so this
/// is safe to call on every startup.
pub async fn ensure_system_models(db: &DatabaseConnection, models_dir: &Path) -> Result<(), ApiError> {
    ensure_system_model(db, models_dir, "User", user_schema_json()).await?;
    ensure_system_model(db, models_dir, "Role", role_schema_json()).await?;
    Ok(())
}

fn user_schema_json() -> Value {
    serde_json::json!({
        "fields": [
            { "name": "email", "type": "string", "required": true },
            { "name": "name", "type": "string" },
            { "name": "roleId", "type": "string" },
            { "name": "isActive", "type": "boolean" }
        ]
    })
}

fn role_schema_json() -> Value {
    serde_json::json!({ "fields": [ { "name": "name", "type": "string", "required": true } ] })
}

async fn ensure_system_model(
    db: &DatabaseConnection,
    models_dir: &Path,
    name: &str,
    json: Value,
) -> Result<(), ApiError> {
    if find_by_name(db, name).await?.is_some() {
        return Ok(());
    }

    let model = model_definition::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        table_name: Set(None),
        owner_field: Set(None),
        json: Set(json),
        version: Set(0),
        published: Set(false),
        published_at: Set(None),
        published_by: Set(None),
        is_system: Set(true),
        file_path: Set(None),
    };
    let inserted = model.insert(db).await?;

    publish(db, inserted.id, models_dir, None).await?;
    Ok(())
}

pub async fn unpublish(db: &DatabaseConnection, model_id: Uuid, models_dir: &Path) -> Result<(), ApiError> {
    let definition = load(db, model_id).await?;
    if definition.is_system {
        return Err(ApiError::forbidden("system models cannot be unpublished"));
    }
    let model_name = definition.name.clone();

    db.transaction::<_, (), DbErr>(|txn| {
        let definition = definition.clone();
        Box::pin(async move {
            model_role_permission::Entity::delete_many()
                .filter(model_role_permission::Column::ModelId.eq(definition.id))
                .exec(txn)
                .await?;

            let mut active: model_definition::ActiveModel = definition.into();
            active.published = Set(false);
            active.published_at = Set(None);
            active.published_by = Set(None);
            active.update(txn).await?;
            Ok(())
        })
    })
    .await
    .map_err(|e| match e {
        sea_orm::TransactionError::Connection(db_err) | sea_orm::TransactionError::Transaction(db_err) => {
            ApiError::from(db_err)
        }
    })?;

    artifact::remove_best_effort(models_dir, &model_name);
    Ok(())
}

pub async fn delete(
    db: &DatabaseConnection,
    model_id: Uuid,
    models_dir: &Path,
    force: bool,
) -> Result<(), ApiError> {
    let definition = load(db, model_id).await?;
    if definition.is_system {
        return Err(ApiError::forbidden("system models cannot be deleted"));
    }

    if !force {
        let referencing = find_referencing_models(db, &definition.name).await?;
        if !referencing.is_empty() {
            return Err(ApiError::conflict_with(
                format!("model '{}' is referenced by other models", definition.name),
                serde_json::json!({ "referencedBy": referencing }),
            ));
        }

        let record_count = record::Entity::find()
            .filter(record::Column::ModelId.eq(model_id))
            .count(db)
            .await?;
        if record_count > 0 {
            return Err(ApiError::conflict(format!(
                "model '{}' still has {record_count} record(s); pass force=true to delete anyway",
                definition.name
            )));
        }
    }

    let model_name = definition.name.clone();
    db.transaction::<_, (), DbErr>(|txn| {
        Box::pin(async move {
            model_role_permission::Entity::delete_many()
                .filter(model_role_permission::Column::ModelId.eq(model_id))
                .exec(txn)
                .await?;
            record::Entity::delete_many().filter(record::Column::ModelId.eq(model_id)).exec(txn).await?;
            model_version::Entity::delete_many()
                .filter(model_version::Column::ModelId.eq(model_id))
                .exec(txn)
                .await?;
            model_definition::Entity::delete_by_id(model_id).exec(txn).await?;
            Ok(())
        })
    })
    .await
    .map_err(|e| match e {
        sea_orm::TransactionError::Connection(db_err) | sea_orm::TransactionError::Transaction(db_err) => {
            ApiError::from(db_err)
        }
    })?;

    artifact::remove_best_effort(models_dir, &model_name);
    Ok(())
}

async fn find_referencing_models(
    db: &DatabaseConnection,
    target_name: &str,
) -> Result<Vec<serde_json::Value>, ApiError> {
    let all = model_definition::Entity::find().all(db).await?;
    let mut referencing = Vec::new();
    for candidate in all {
        if candidate.name == target_name {
            continue;
        }
        let Ok(schema) = Schema::parse(&candidate.json) else { continue };
        for field in schema.relation_fields() {
            if field.relation.as_ref().is_some_and(|r| r.model == target_name) {
                referencing
                    .push(serde_json::json!({ "modelName": candidate.name, "fieldName": field.name }));
            }
        }
    }
    Ok(referencing)
}

/// Reverts the draft `json` to a historical `ModelVersion` snapshot, re-validating
/// relations against the *currently* published ecosystem (the target of a relation
/// may no longer be published). Does not bump `version`; append-only history means
/// publishing again always allocates a fresh version number.
pub async fn revert(
    db: &DatabaseConnection,
    model_id: Uuid,
    target_version: i32,
) -> Result<model_definition::Model, ApiError> {
    let definition = load(db, model_id).await?;
    if definition.is_system {
        return Err(ApiError::forbidden("system models cannot be reverted"));
    }

    let snapshot = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(model_id))
        .filter(model_version::Column::VersionNumber.eq(target_version))
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("ModelVersion", Some(target_version.to_string())))?;

    let schema = Schema::parse(&snapshot.json)?;
    validate_relation_targets(db, &schema, &definition.name, false).await?;

    let mut active: model_definition::ActiveModel = definition.into();
    active.json = Set(snapshot.json);
    active.update(db).await.map_err(ApiError::from)
}
