use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveActiveEnum, EnumIter)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum PermissionCategory {
    #[sea_orm(string_value = "feature")]
    Feature,
    #[sea_orm(string_value = "model_action")]
    ModelAction,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "permissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub key: String,
    pub name: String,
    pub category: PermissionCategory,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// The four seeded model-action keys the Authorization Engine depends on existing
/// at startup (`SPEC_FULL.md` §4.1).
pub const MODEL_ACTION_KEYS: [&str; 4] = ["MODEL.CREATE", "MODEL.READ", "MODEL.UPDATE", "MODEL.DELETE"];

/// The minimum feature-permission keys the platform seeds at startup.
pub const FEATURE_KEYS: [&str; 7] = [
    "CREATE_ROLE",
    "CREATE_USER",
    "MANAGE_MODELS",
    "PUBLISH_MODEL",
    "MANAGE_FEATURES",
    "VIEW_SUPPORT",
    "VIEW_AUDIT",
];
