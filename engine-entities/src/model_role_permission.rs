use sea_orm::entity::prelude::*;

/// Per-(model, role, permission) grant. Uniqueness on the triple is the contract
/// storage must satisfy (`SPEC_FULL.md` §6.4); enforced by a composite unique index
/// at the migration layer.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_role_permissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub model_id: Uuid,
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub allowed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::model_definition::Entity",
        from = "Column::ModelId",
        to = "super::model_definition::Column::Id"
    )]
    ModelDefinition,
    #[sea_orm(
        belongs_to = "super::role::Entity",
        from = "Column::RoleId",
        to = "super::role::Column::Id"
    )]
    Role,
    #[sea_orm(
        belongs_to = "super::permission::Entity",
        from = "Column::PermissionId",
        to = "super::permission::Column::Id"
    )]
    Permission,
}

impl Related<super::model_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelDefinition.def()
    }
}

impl Related<super::role::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Role.def()
    }
}

impl Related<super::permission::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Permission.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
