use sea_orm::entity::prelude::*;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_definitions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub table_name: Option<String>,
    pub owner_field: Option<String>,
    pub json: Json,
    pub version: i32,
    pub published: bool,
    pub published_at: Option<DateTimeUtc>,
    pub published_by: Option<Uuid>,
    pub is_system: bool,
    pub file_path: Option<String>,
}

impl Model {
    /// The schema payload, normalized to its `{fields, rbac}` shape regardless of
    /// whether it was authored as a bare `{fields}` object or the wrapped form.
    #[must_use]
    pub fn fields_value(&self) -> Option<&Value> {
        self.json
            .get("definition")
            .and_then(|d| d.get("fields"))
            .or_else(|| self.json.get("fields"))
    }

    #[must_use]
    pub fn rbac_value(&self) -> Option<&Value> {
        self.json.get("definition").and_then(|d| d.get("rbac")).or_else(|| self.json.get("rbac"))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::model_version::Entity")]
    Versions,
    #[sea_orm(has_many = "super::record::Entity")]
    Records,
    #[sea_orm(has_many = "super::model_role_permission::Entity")]
    RolePermissions,
}

impl Related<super::model_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl Related<super::record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl Related<super::model_role_permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RolePermissions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
