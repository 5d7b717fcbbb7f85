//! Field/Schema shapes and the pure schema validator (C5).
//!
//! The schema payload authored by a model admin is either a bare `{fields: [...]}`
//! object or the wrapped `{definition: {fields: [...]}, rbac: {...}}` form; both are
//! normalized into `Schema` here so every other component works against one shape.

use engine_core::ApiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    #[serde(rename = "string[]")]
    StringArray,
    Relation,
}

impl FieldType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "string" => Some(Self::String),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "date" => Some(Self::Date),
            "json" => Some(Self::Json),
            "string[]" => Some(Self::StringArray),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "one-to-one" => Some(Self::OneToOne),
            "one-to-many" => Some(Self::OneToMany),
            "many-to-one" => Some(Self::ManyToOne),
            "many-to-many" => Some(Self::ManyToMany),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, Self::OneToMany | Self::ManyToMany)
    }
}

#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    pub model: String,
    pub field: String,
    pub kind: RelationKind,
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub unique: bool,
    pub default: Option<Value>,
    pub relation: Option<RelationDescriptor>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    pub fields: Vec<FieldDescriptor>,
    pub rbac: Option<Value>,
}

impl Schema {
    /// Parses and validates a model's `json` payload. Rejects everything C5 names:
    /// non-object payload; missing `fields`; fields without `name`/`type`; unknown
    /// `type`; relation fields missing `relation.{model,field,type}`; `relation.type`
    /// outside the allowed four kinds (`many-to-many` is structurally valid here but
    /// refused downstream by the Model Registry, which is the first layer with enough
    /// context to also reject self-references); duplicate field names.
    pub fn parse(json: &Value) -> Result<Self, ApiError> {
        let obj = json.as_object().ok_or_else(|| ApiError::bad_request("schema must be a JSON object"))?;

        let fields_value = obj
            .get("definition")
            .and_then(|d| d.get("fields"))
            .or_else(|| obj.get("fields"))
            .ok_or_else(|| ApiError::bad_request("schema is missing a 'fields' array"))?;

        let rbac = obj.get("definition").and_then(|d| d.get("rbac")).or_else(|| obj.get("rbac")).cloned();

        let raw_fields =
            fields_value.as_array().ok_or_else(|| ApiError::bad_request("'fields' must be an array"))?;

        let mut fields = Vec::with_capacity(raw_fields.len());
        let mut seen = std::collections::HashSet::new();

        for raw in raw_fields {
            let field = parse_field(raw)?;
            if !seen.insert(field.name.clone()) {
                return Err(ApiError::bad_request(format!("duplicate field name '{}'", field.name)));
            }
            fields.push(field);
        }

        Ok(Self { fields, rbac })
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn relation_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.relation.is_some()).collect()
    }

    /// Single-target relation fields (one-to-one, many-to-one): the ones the
    /// linking-model uniqueness rule in the Record Service cares about.
    #[must_use]
    pub fn single_target_relation_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields
            .iter()
            .filter(|f| matches!(&f.relation, Some(r) if !r.kind.is_multi()))
            .collect()
    }
}

fn parse_field(raw: &Value) -> Result<FieldDescriptor, ApiError> {
    let obj = raw.as_object().ok_or_else(|| ApiError::bad_request("each field must be an object"))?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::bad_request("field is missing a non-empty 'name'"))?
        .to_string();

    let type_raw = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request(format!("field '{name}' is missing 'type'")))?;

    let field_type = FieldType::parse(type_raw)
        .ok_or_else(|| ApiError::bad_request(format!("field '{name}' has unknown type '{type_raw}'")))?;

    let required = obj.get("required").and_then(Value::as_bool).unwrap_or(false);
    let unique = obj.get("unique").and_then(Value::as_bool).unwrap_or(false);
    let default = obj.get("default").cloned();

    let relation = if field_type == FieldType::Relation {
        let rel_obj = obj
            .get("relation")
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::bad_request(format!("relation field '{name}' is missing 'relation'")))?;

        let model = rel_obj
            .get("model")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request(format!("relation field '{name}' is missing 'relation.model'")))?
            .to_string();

        let target_field = rel_obj
            .get("field")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request(format!("relation field '{name}' is missing 'relation.field'")))?
            .to_string();

        let kind_raw = rel_obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::bad_request(format!("relation field '{name}' is missing 'relation.type'")))?;

        let kind = RelationKind::parse(kind_raw).ok_or_else(|| {
            ApiError::bad_request(format!(
                "relation field '{name}' has unsupported relation.type '{kind_raw}'"
            ))
        })?;

        Some(RelationDescriptor { model, field: target_field, kind })
    } else {
        None
    };

    Ok(FieldDescriptor { name, field_type, required, unique, default, relation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_fields_shape() {
        let schema = Schema::parse(&json!({"fields": [{"name": "name", "type": "string", "required": true}]})).unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert!(schema.field("name").unwrap().required);
    }

    #[test]
    fn parses_wrapped_definition_shape() {
        let schema = Schema::parse(&json!({
            "definition": {"fields": [{"name": "price", "type": "number"}], "rbac": {"Admin": ["ALL"]}}
        }))
        .unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert!(schema.rbac.is_some());
    }

    #[test]
    fn rejects_duplicate_field_names() {
        let err = Schema::parse(&json!({"fields": [
            {"name": "x", "type": "string"}, {"name": "x", "type": "number"}
        ]}))
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[test]
    fn rejects_unknown_type() {
        let err = Schema::parse(&json!({"fields": [{"name": "x", "type": "blob"}]})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[test]
    fn rejects_relation_missing_target() {
        let err = Schema::parse(&json!({"fields": [{"name": "customerId", "type": "relation"}]})).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { .. }));
    }

    #[test]
    fn accepts_relation_with_full_descriptor() {
        let schema = Schema::parse(&json!({"fields": [
            {"name": "customerId", "type": "relation", "relation": {"model": "Customer", "field": "id", "type": "many-to-one"}}
        ]}))
        .unwrap();
        let field = schema.field("customerId").unwrap();
        assert_eq!(field.relation.as_ref().unwrap().model, "Customer");
    }
}
