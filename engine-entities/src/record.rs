use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub model_id: Uuid,
    pub model_name: String,
    pub model_version_id: Option<Uuid>,
    pub data: Json,
    pub owner_id: Option<Uuid>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
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
