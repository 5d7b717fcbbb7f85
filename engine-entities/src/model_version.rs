use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "model_versions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub model_id: Uuid,
    pub version_number: i32,
    pub json: Json,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::model_definition::Entity",
        from = "Column::ModelId",
        to = "super::model_definition::Column::Id"
    )]
    ModelDefinition,
}

impl Related<super::model_definition::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ModelDefinition.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
