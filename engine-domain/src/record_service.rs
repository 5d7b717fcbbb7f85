//! Record Service (C8): the generic CRUD surface every `/api/<tableName>` route is
//! backed by. Five layers, matching `SPEC_FULL.md` §4.8: model resolution, payload
//! validation + relation resolution, linking-model uniqueness, owner resolution,
//! and system-model dual-write.

use crate::schema::{FieldType, RelationDescriptor, Schema};
use chrono::Utc;
use engine_core::security::password::hash_password;
use engine_entities::{model_definition, model_version, record, role, user};
use engine_core::ApiError;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, TransactionError, TransactionTrait,
};
use serde_json::{Map, Value};
use uuid::Uuid;

const RECORD_SCAN_CAP: u64 = 2_000;

fn into_api_error(err: TransactionError<ApiError>) -> ApiError {
    match err {
        TransactionError::Connection(db_err) => ApiError::from(db_err),
        TransactionError::Transaction(api_err) => api_err,
    }
}

pub struct ResolvedModel {
    pub definition: model_definition::Model,
    pub schema: Schema,
    pub version_id: Uuid,
}

/// `resolvePublishedModel`: case-insensitive match on `name` or `tableName`,
/// requires `published=true`, loads the latest `ModelVersion` snapshot. The
/// snapshot is authoritative for validation; the definition is authoritative for
/// `ownerField`, `isSystem`, and routing.
pub async fn resolve_published_model(
    db: &DatabaseConnection,
    route_name: &str,
) -> Result<ResolvedModel, ApiError> {
    let lower = route_name.to_lowercase();
    let candidates = model_definition::Entity::find()
        .filter(model_definition::Column::Published.eq(true))
        .all(db)
        .await?;

    let definition = candidates
        .into_iter()
        .find(|d| {
            d.name.to_lowercase() == lower
                || d.table_name.as_deref().map(str::to_lowercase).as_deref() == Some(lower.as_str())
        })
        .ok_or_else(|| ApiError::not_found("model", Some(route_name.to_string())))?;

    let version = model_version::Entity::find()
        .filter(model_version::Column::ModelId.eq(definition.id))
        .order_by_desc(model_version::Column::VersionNumber)
        .one(db)
        .await?
        .ok_or_else(|| {
            ApiError::not_initialized(format!("model '{}' has no published version", definition.name))
        })?;

    let schema = Schema::parse(&version.json)?;
    Ok(ResolvedModel { definition, schema, version_id: version.id })
}

fn check_primitive_type(field_name: &str, field_type: FieldType, value: &Value) -> Result<(), ApiError> {
    let ok = match field_type {
        FieldType::String | FieldType::Date | FieldType::Json => true,
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::StringArray => value.is_array() && value.as_array().unwrap().iter().all(Value::is_string),
        FieldType::Relation => true,
    };
    if ok {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("field '{field_name}' has the wrong type")))
    }
}

/// Single-target relation resolution for `→ targetModelName.targetFieldName` given
/// a provided value. Returns the canonical target id to store.
pub async fn resolve_single_target(
    db: &DatabaseConnection,
    relation: &RelationDescriptor,
    value: &Value,
) -> Result<Value, ApiError> {
    if relation.model == "User" {
        return resolve_user_target(db, value).await;
    }

    let target = model_definition::Entity::find()
        .filter(model_definition::Column::Name.eq(&relation.model))
        .filter(model_definition::Column::Published.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| {
            ApiError::bad_request(format!("relation target model '{}' is not published", relation.model))
        })?;

    if let Value::String(s) = value {
        if let Ok(id) = Uuid::parse_str(s) {
            if let Some(found) = record::Entity::find_by_id(id).one(db).await? {
                if found.model_id == target.id {
                    return Ok(Value::String(found.id.to_string()));
                }
            }
        }
    }

    let candidates = record::Entity::find()
        .filter(record::Column::ModelId.eq(target.id))
        .limit(RECORD_SCAN_CAP)
        .all(db)
        .await?;

    let matches: Vec<_> = candidates
        .into_iter()
        .filter(|r| r.data.get(&relation.field).is_some_and(|v| v == value))
        .collect();

    match matches.len() {
        0 => Err(ApiError::bad_request(format!(
            "no '{}' record found where {} = {value}",
            relation.model, relation.field
        ))),
        1 => Ok(Value::String(matches[0].id.to_string())),
        _ => Err(ApiError::conflict(format!(
            "relation value for '{}' matches more than one '{}' record; supply an explicit id",
            relation.field, relation.model
        ))),
    }
}

async fn resolve_user_target(db: &DatabaseConnection, value: &Value) -> Result<Value, ApiError> {
    let Value::String(raw) = value else {
        return Err(ApiError::bad_request("user relation value must be a string"));
    };

    if let Ok(id) = Uuid::parse_str(raw) {
        if let Some(found) = user::Entity::find_by_id(id).one(db).await? {
            return Ok(Value::String(found.id.to_string()));
        }
    }

    if let Some(found) =
        user::Entity::find().filter(user::Column::Email.eq(raw.as_str())).one(db).await?
    {
        return Ok(Value::String(found.id.to_string()));
    }

    if let Ok(record_id) = Uuid::parse_str(raw) {
        if let Some(found) = record::Entity::find_by_id(record_id).one(db).await? {
            for key in ["email", "emailAddress", "userEmail", "username", "name"] {
                if let Some(email) = found.data.get(key).and_then(Value::as_str) {
                    if let Some(user) =
                        user::Entity::find().filter(user::Column::Email.eq(email)).one(db).await?
                    {
                        return Ok(Value::String(user.id.to_string()));
                    }
                }
            }
        }
    }

    Err(ApiError::bad_request(format!("could not resolve '{raw}' to a user")))
}

/// Validates required/typed fields and resolves every relation field in place so
/// the stored payload always holds a canonical target id (or array of ids).
pub async fn validate_and_resolve(
    db: &DatabaseConnection,
    schema: &Schema,
    payload: &mut Map<String, Value>,
) -> Result<(), ApiError> {
    for field in &schema.fields {
        if field.relation.is_some() {
            continue;
        }
        let value = payload.get(&field.name).cloned();
        match value {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(ApiError::bad_request(format!("field '{}' is required", field.name)));
                }
            }
            Some(v) => check_primitive_type(&field.name, field.field_type, &v)?,
        }
    }

    for field in &schema.fields {
        let Some(relation) = &field.relation else { continue };
        let raw = payload.get(&field.name).cloned();
        let raw = match raw {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(ApiError::bad_request(format!("field '{}' is required", field.name)));
                }
                continue;
            }
            Some(v) => v,
        };

        if relation.kind.is_multi() {
            let items = raw
                .as_array()
                .ok_or_else(|| ApiError::bad_request(format!("field '{}' must be an array", field.name)))?;
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_single_target(db, relation, item).await?);
            }
            payload.insert(field.name.clone(), Value::Array(resolved));
        } else {
            if raw.is_array() {
                return Err(ApiError::bad_request(format!("field '{}' must not be an array", field.name)));
            }
            let resolved = resolve_single_target(db, relation, &raw).await?;
            payload.insert(field.name.clone(), resolved);
        }
    }

    Ok(())
}

/// Linking-model composite uniqueness (§4.8.3): if the schema has ≥2 single-target
/// relation fields and the payload sets all of them, no other record of this model
/// may already hold that exact tuple.
pub async fn check_linking_uniqueness(
    db: &DatabaseConnection,
    model_id: Uuid,
    schema: &Schema,
    payload: &Map<String, Value>,
    exclude_record_id: Option<Uuid>,
) -> Result<(), ApiError> {
    let relation_fields = schema.single_target_relation_fields();
    if relation_fields.len() < 2 {
        return Ok(());
    }

    let mut tuple = Vec::with_capacity(relation_fields.len());
    for field in &relation_fields {
        match payload.get(&field.name) {
            Some(Value::String(s)) => tuple.push((field.name.clone(), s.clone())),
            _ => return Ok(()),
        }
    }

    let existing = record::Entity::find()
        .filter(record::Column::ModelId.eq(model_id))
        .limit(RECORD_SCAN_CAP)
        .all(db)
        .await?;

    for other in existing {
        if Some(other.id) == exclude_record_id {
            continue;
        }
        let matches_all = tuple.iter().all(|(name, value)| {
            other.data.get(name).and_then(Value::as_str) == Some(value.as_str())
        });
        if matches_all {
            let details = serde_json::json!(tuple.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>());
            return Err(ApiError::conflict_with(
                "a record with this combination of relation values already exists",
                details,
            ));
        }
    }

    Ok(())
}

/// Owner resolution (§4.8.4): explicit `payload.ownerId`, then `payload[ownerField]`,
/// then the acting user (only if they exist in the identity store). Injects the
/// resolved owner back into `ownerField` when the model declares one and the
/// payload didn't already set it.
pub async fn resolve_owner(
    db: &DatabaseConnection,
    definition: &model_definition::Model,
    payload: &mut Map<String, Value>,
    acting_user_id: Option<Uuid>,
) -> Result<Option<Uuid>, ApiError> {
    let explicit = payload.get("ownerId").cloned();
    let owner_field_value = definition.owner_field.as_ref().and_then(|f| payload.get(f).cloned());

    let candidate = match explicit.or(owner_field_value) {
        Some(v) => Some(v),
        None => acting_user_id.map(|id| Value::String(id.to_string())),
    };

    let Some(candidate) = candidate else { return Ok(None) };

    let resolved = resolve_user_target(db, &candidate).await;
    let owner_id = match resolved {
        Ok(Value::String(s)) => Uuid::parse_str(&s).ok(),
        _ => None,
    };

    if owner_id.is_none() {
        if let Some(user_id) = acting_user_id {
            if user::Entity::find_by_id(user_id).one(db).await?.is_none() {
                return Ok(None);
            }
        }
        return Err(ApiError::bad_request("could not resolve an owner for this record"));
    }

    if let (Some(owner_field), Some(owner_id)) = (&definition.owner_field, owner_id) {
        payload.entry(owner_field.clone()).or_insert_with(|| Value::String(owner_id.to_string()));
    }

    Ok(owner_id)
}

pub struct RecordView {
    pub id: Uuid,
    pub data: Value,
}

/// Creates a record. System models (`User`, `Role`) are dual-written into both the
/// origin table and the generic record mirror; every other model writes straight
/// into the `Record` table.
pub async fn create(
    db: &DatabaseConnection,
    resolved: &ResolvedModel,
    mut payload: Map<String, Value>,
    acting_user_id: Option<Uuid>,
) -> Result<RecordView, ApiError> {
    validate_and_resolve(db, &resolved.schema, &mut payload).await?;

    if resolved.definition.is_system && resolved.definition.name == "User" {
        return create_system_user(db, &mut payload).await;
    }
    if resolved.definition.is_system && resolved.definition.name == "Role" {
        return create_system_role(db, &mut payload).await;
    }

    check_linking_uniqueness(db, resolved.definition.id, &resolved.schema, &payload, None).await?;
    let owner_id = resolve_owner(db, &resolved.definition, &mut payload, acting_user_id).await?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let row = record::ActiveModel {
        id: Set(id),
        model_id: Set(resolved.definition.id),
        model_name: Set(resolved.definition.name.clone()),
        model_version_id: Set(Some(resolved.version_id)),
        data: Set(Value::Object(payload)),
        owner_id: Set(owner_id),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        deleted_at: Set(None),
    };
    let inserted = row.insert(db).await?;
    Ok(RecordView { id: inserted.id, data: inserted.data })
}

async fn create_system_user(
    db: &DatabaseConnection,
    payload: &mut Map<String, Value>,
) -> Result<RecordView, ApiError> {
    let email = payload
        .get("email")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("field 'email' is required"))?
        .to_string();

    if crate::identity::find_user_by_email(db, &email).await?.is_some() {
        return Err(ApiError::conflict(format!("a user with email '{email}' already exists")));
    }

    let name = payload.get("name").and_then(Value::as_str).unwrap_or(&email).to_string();
    let password = payload.get("password").and_then(Value::as_str).unwrap_or("changeme").to_string();

    let role_id = if let Some(role_ref) = payload.get("roleId").and_then(Value::as_str) {
        resolve_role_origin_id(db, role_ref).await?
    } else {
        crate::identity::ensure_role(db, role::VIEWER_ROLE).await?.id
    };

    let now = Utc::now();
    let user_id = Uuid::new_v4();
    let password_hash = hash_password(&password)?;

    let mut mirror_data = payload.clone();
    mirror_data.remove("password");
    mirror_data.insert("id".to_string(), Value::String(user_id.to_string()));
    mirror_data.insert("email".to_string(), Value::String(email.clone()));

    let user_model_id = system_model_id(db, "User").await?;
    let mirror_id = Uuid::new_v4();

    let view_data = mirror_data.clone();
    db.transaction::<_, (), ApiError>(|txn| {
        Box::pin(async move {
            let user_row = user::ActiveModel {
                id: Set(user_id),
                email: Set(email),
                password_hash: Set(password_hash),
                name: Set(name),
                role_id: Set(role_id),
                is_active: Set(true),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            user_row.insert(txn).await?;

            let mirror = record::ActiveModel {
                id: Set(mirror_id),
                model_id: Set(user_model_id),
                model_name: Set("User".to_string()),
                model_version_id: Set(None),
                data: Set(Value::Object(mirror_data)),
                owner_id: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                deleted_at: Set(None),
            };
            mirror.insert(txn).await?;

            Ok(())
        })
    })
    .await
    .map_err(into_api_error)?;

    Ok(RecordView { id: mirror_id, data: Value::Object(view_data) })
}

async fn create_system_role(
    db: &DatabaseConnection,
    payload: &mut Map<String, Value>,
) -> Result<RecordView, ApiError> {
    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("field 'name' is required"))?
        .to_string();

    if crate::identity::find_role_by_name(db, &name).await?.is_some() {
        return Err(ApiError::conflict(format!("a role named '{name}' already exists")));
    }

    let now = Utc::now();
    let role_id = Uuid::new_v4();
    let mirror_data = serde_json::json!({ "id": role_id.to_string(), "name": name });
    let role_model_id = system_model_id(db, "Role").await?;
    let mirror_id = Uuid::new_v4();

    let view_data = mirror_data.clone();
    db.transaction::<_, (), ApiError>(|txn| {
        Box::pin(async move {
            let role_row = role::ActiveModel { id: Set(role_id), name: Set(name) };
            role_row.insert(txn).await?;

            let mirror = record::ActiveModel {
                id: Set(mirror_id),
                model_id: Set(role_model_id),
                model_name: Set("Role".to_string()),
                model_version_id: Set(None),
                data: Set(mirror_data),
                owner_id: Set(None),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
                deleted_at: Set(None),
            };
            mirror.insert(txn).await?;

            Ok(())
        })
    })
    .await
    .map_err(into_api_error)?;

    Ok(RecordView { id: mirror_id, data: view_data })
}

async fn system_model_id(db: &DatabaseConnection, name: &str) -> Result<Uuid, ApiError> {
    model_definition::Entity::find()
        .filter(model_definition::Column::Name.eq(name))
        .one(db)
        .await?
        .map(|m| m.id)
        .ok_or_else(|| ApiError::not_initialized(format!("system model '{name}' is not registered")))
}

/// Resolves a client-supplied `roleId`, which may be either a system role id or a
/// Role-model record id, to the origin role id.
async fn resolve_role_origin_id(db: &DatabaseConnection, raw: &str) -> Result<Uuid, ApiError> {
    let Ok(candidate) = Uuid::parse_str(raw) else {
        return Err(ApiError::bad_request("'roleId' must be a uuid"));
    };

    if role::Entity::find_by_id(candidate).one(db).await?.is_some() {
        return Ok(candidate);
    }

    if let Some(mirror) = record::Entity::find_by_id(candidate).one(db).await? {
        if let Some(origin) = mirror.data.get("id").and_then(Value::as_str) {
            if let Ok(origin_id) = Uuid::parse_str(origin) {
                if role::Entity::find_by_id(origin_id).one(db).await?.is_some() {
                    return Ok(origin_id);
                }
            }
        }
    }

    Err(ApiError::bad_request(format!("'{raw}' does not resolve to a known role")))
}

/// Finds the generic-record mirror for a system origin row by scanning records
/// whose `data.id` matches the origin id, as the bounded-scan approach the design
/// notes describe as replaceable later with a functional index.
pub async fn find_mirror_by_origin_id(
    db: &DatabaseConnection,
    model_name: &str,
    origin_id: Uuid,
) -> Result<Option<record::Model>, ApiError> {
    let model_id = system_model_id(db, model_name).await?;
    let candidates = record::Entity::find()
        .filter(record::Column::ModelId.eq(model_id))
        .limit(RECORD_SCAN_CAP)
        .all(db)
        .await?;
    Ok(candidates.into_iter().find(|r| {
        r.data.get("id").and_then(Value::as_str) == Some(origin_id.to_string().as_str())
    }))
}

pub async fn get(db: &DatabaseConnection, resolved: &ResolvedModel, id: Uuid) -> Result<RecordView, ApiError> {
    if resolved.definition.name == "User" {
        let origin = resolve_user_or_record_id(db, id).await?;
        let user = user::Entity::find_by_id(origin)
            .one(db)
            .await?
            .ok_or_else(|| ApiError::not_found("User", Some(id.to_string())))?;
        return Ok(user_to_view(db, &user).await?);
    }
    if resolved.definition.name == "Role" {
        let origin = resolve_role_or_record_id(db, id).await?;
        let role = role::Entity::find_by_id(origin)
            .one(db)
            .await?
            .ok_or_else(|| ApiError::not_found("Role", Some(id.to_string())))?;
        return Ok(role_to_view(&role));
    }

    let row = record::Entity::find_by_id(id)
        .one(db)
        .await?
        .filter(|r| r.model_id == resolved.definition.id && r.deleted_at.is_none())
        .ok_or_else(|| ApiError::not_found(&resolved.definition.name, Some(id.to_string())))?;
    Ok(RecordView { id: row.id, data: row.data })
}

async fn resolve_user_or_record_id(db: &DatabaseConnection, id: Uuid) -> Result<Uuid, ApiError> {
    if user::Entity::find_by_id(id).one(db).await?.is_some() {
        return Ok(id);
    }
    if let Some(mirror) = record::Entity::find_by_id(id).one(db).await? {
        if let Some(origin) = mirror.data.get("id").and_then(Value::as_str) {
            if let Ok(origin_id) = Uuid::parse_str(origin) {
                return Ok(origin_id);
            }
        }
    }
    Err(ApiError::not_found("User", Some(id.to_string())))
}

async fn resolve_role_or_record_id(db: &DatabaseConnection, id: Uuid) -> Result<Uuid, ApiError> {
    if role::Entity::find_by_id(id).one(db).await?.is_some() {
        return Ok(id);
    }
    if let Some(mirror) = record::Entity::find_by_id(id).one(db).await? {
        if let Some(origin) = mirror.data.get("id").and_then(Value::as_str) {
            if let Ok(origin_id) = Uuid::parse_str(origin) {
                return Ok(origin_id);
            }
        }
    }
    Err(ApiError::not_found("Role", Some(id.to_string())))
}

/// Maps a user's origin `roleId` to the corresponding Role record id, per the list
/// and get contracts in §4.8.5, so clients always see a uniform record id.
async fn role_record_id_for(db: &DatabaseConnection, role_id: Uuid) -> Result<Value, ApiError> {
    match find_mirror_by_origin_id(db, "Role", role_id).await? {
        Some(mirror) => Ok(Value::String(mirror.id.to_string())),
        None => Ok(Value::String(role_id.to_string())),
    }
}

async fn user_to_view(db: &DatabaseConnection, user: &user::Model) -> Result<RecordView, ApiError> {
    let role_ref = role_record_id_for(db, user.role_id).await?;
    let data = serde_json::json!({
        "id": user.id.to_string(),
        "email": user.email,
        "name": user.name,
        "roleId": role_ref,
        "isActive": user.is_active,
        "createdAt": user.created_at.to_rfc3339(),
        "updatedAt": user.updated_at.to_rfc3339(),
    });
    Ok(RecordView { id: user.id, data })
}

fn role_to_view(role: &role::Model) -> RecordView {
    RecordView { id: role.id, data: serde_json::json!({ "id": role.id.to_string(), "name": role.name }) }
}

pub struct ListParams {
    pub limit: u64,
    pub skip: u64,
    pub owner_only: bool,
    pub acting_user_id: Option<Uuid>,
}

pub struct ListResult {
    pub items: Vec<RecordView>,
    pub total: u64,
}

pub async fn list(
    db: &DatabaseConnection,
    resolved: &ResolvedModel,
    params: &ListParams,
) -> Result<ListResult, ApiError> {
    let limit = params.limit.clamp(1, 200);

    if resolved.definition.name == "User" {
        let total = user::Entity::find().count(db).await?;
        let rows = user::Entity::find().order_by_desc(user::Column::CreatedAt).offset(params.skip).limit(limit).all(db).await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(user_to_view(db, &row).await?);
        }
        return Ok(ListResult { items, total });
    }
    if resolved.definition.name == "Role" {
        let total = role::Entity::find().count(db).await?;
        let rows = role::Entity::find().offset(params.skip).limit(limit).all(db).await?;
        return Ok(ListResult { items: rows.iter().map(role_to_view).collect(), total });
    }

    let mut query =
        record::Entity::find().filter(record::Column::ModelId.eq(resolved.definition.id)).filter(record::Column::DeletedAt.is_null());
    if params.owner_only {
        if let Some(user_id) = params.acting_user_id {
            query = query.filter(record::Column::OwnerId.eq(user_id));
        }
    }
    let total = query.clone().count(db).await?;
    let rows = query.order_by_desc(record::Column::CreatedAt).offset(params.skip).limit(limit).all(db).await?;
    Ok(ListResult { items: rows.into_iter().map(|r| RecordView { id: r.id, data: r.data }).collect(), total })
}

pub async fn update(
    db: &DatabaseConnection,
    resolved: &ResolvedModel,
    id: Uuid,
    mut patch: Map<String, Value>,
) -> Result<RecordView, ApiError> {
    validate_and_resolve(db, &resolved.schema, &mut patch).await?;

    if resolved.definition.name == "User" {
        return update_system_user(db, id, patch).await;
    }
    if resolved.definition.name == "Role" {
        return update_system_role(db, id, patch).await;
    }

    let existing = record::Entity::find_by_id(id)
        .one(db)
        .await?
        .filter(|r| r.model_id == resolved.definition.id && r.deleted_at.is_none())
        .ok_or_else(|| ApiError::not_found(&resolved.definition.name, Some(id.to_string())))?;

    let mut merged = existing.data.as_object().cloned().unwrap_or_default();
    merged.extend(patch);
    check_linking_uniqueness(db, resolved.definition.id, &resolved.schema, &merged, Some(id)).await?;

    let mut active: record::ActiveModel = existing.into();
    active.data = Set(Value::Object(merged));
    active.model_version_id = Set(Some(resolved.version_id));
    active.updated_at = Set(Utc::now().into());
    let updated = active.update(db).await?;
    Ok(RecordView { id: updated.id, data: updated.data })
}

async fn update_system_user(
    db: &DatabaseConnection,
    id: Uuid,
    patch: Map<String, Value>,
) -> Result<RecordView, ApiError> {
    let origin_id = resolve_user_or_record_id(db, id).await?;
    let existing = user::Entity::find_by_id(origin_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("User", Some(id.to_string())))?;

    let role_id = if let Some(role_ref) = patch.get("roleId").and_then(Value::as_str) {
        resolve_role_origin_id(db, role_ref).await?
    } else {
        existing.role_id
    };

    let mirror = find_mirror_by_origin_id(db, "User", existing.id).await?;

    let updated = db
        .transaction::<_, user::Model, ApiError>(|txn| {
            Box::pin(async move {
                let mut active: user::ActiveModel = existing.clone().into();
                if let Some(name) = patch.get("name").and_then(Value::as_str) {
                    active.name = Set(name.to_string());
                }
                if let Some(active_flag) = patch.get("isActive").and_then(Value::as_bool) {
                    active.is_active = Set(active_flag);
                }
                active.role_id = Set(role_id);
                active.updated_at = Set(Utc::now().into());
                let updated = active.update(txn).await?;

                if let Some(mirror) = mirror {
                    let mut data = mirror.data.as_object().cloned().unwrap_or_default();
                    let mut sanitized_patch = patch;
                    sanitized_patch.remove("password");
                    data.extend(sanitized_patch);
                    data.insert("id".to_string(), Value::String(updated.id.to_string()));
                    data.insert("email".to_string(), Value::String(updated.email.clone()));
                    let mut mirror_active: record::ActiveModel = mirror.into();
                    mirror_active.data = Set(Value::Object(data));
                    mirror_active.updated_at = Set(Utc::now().into());
                    mirror_active.update(txn).await?;
                }

                Ok(updated)
            })
        })
        .await
        .map_err(into_api_error)?;

    user_to_view(db, &updated).await
}

async fn update_system_role(
    db: &DatabaseConnection,
    id: Uuid,
    patch: Map<String, Value>,
) -> Result<RecordView, ApiError> {
    let origin_id = resolve_role_or_record_id(db, id).await?;
    let existing = role::Entity::find_by_id(origin_id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Role", Some(id.to_string())))?;

    let mirror = find_mirror_by_origin_id(db, "Role", existing.id).await?;

    let updated = db
        .transaction::<_, role::Model, ApiError>(|txn| {
            Box::pin(async move {
                let mut active: role::ActiveModel = existing.into();
                if let Some(name) = patch.get("name").and_then(Value::as_str) {
                    active.name = Set(name.to_string());
                }
                let updated = active.update(txn).await?;

                if let Some(mirror) = mirror {
                    let mut mirror_active: record::ActiveModel = mirror.into();
                    mirror_active.data =
                        Set(serde_json::json!({ "id": updated.id.to_string(), "name": updated.name }));
                    mirror_active.updated_at = Set(Utc::now().into());
                    mirror_active.update(txn).await?;
                }

                Ok(updated)
            })
        })
        .await
        .map_err(into_api_error)?;

    Ok(role_to_view(&updated))
}

pub async fn delete(db: &DatabaseConnection, resolved: &ResolvedModel, id: Uuid) -> Result<(), ApiError> {
    if resolved.definition.name == "User" {
        let origin_id = resolve_user_or_record_id(db, id).await?;
        let mirror_id = find_mirror_by_origin_id(db, "User", origin_id).await?.map(|m| m.id);
        db.transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move {
                if let Some(mirror_id) = mirror_id {
                    record::Entity::delete_by_id(mirror_id).exec(txn).await?;
                }
                user::Entity::delete_by_id(origin_id).exec(txn).await?;
                Ok(())
            })
        })
        .await
        .map_err(into_api_error)?;
        return Ok(());
    }
    if resolved.definition.name == "Role" {
        let origin_id = resolve_role_or_record_id(db, id).await?;
        let mirror_id = find_mirror_by_origin_id(db, "Role", origin_id).await?.map(|m| m.id);
        db.transaction::<_, (), ApiError>(|txn| {
            Box::pin(async move {
                if let Some(mirror_id) = mirror_id {
                    record::Entity::delete_by_id(mirror_id).exec(txn).await?;
                }
                role::Entity::delete_by_id(origin_id).exec(txn).await?;
                Ok(())
            })
        })
        .await
        .map_err(into_api_error)?;
        return Ok(());
    }

    let existing = record::Entity::find_by_id(id)
        .one(db)
        .await?
        .filter(|r| r.model_id == resolved.definition.id)
        .ok_or_else(|| ApiError::not_found(&resolved.definition.name, Some(id.to_string())))?;
    let mut active: record::ActiveModel = existing.into();
    active.deleted_at = Set(Some(Utc::now().into()));
    active.update(db).await?;
    Ok(())
}
