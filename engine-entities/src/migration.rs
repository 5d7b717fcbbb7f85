//! Schema migrations for the platform's fixed system tables
//! (`SPEC_FULL.md` §6.4), run once at startup against whatever driver
//! `DATABASE_URL` points at.

use sea_orm_migration::prelude::*;

use crate::{
    audit_log, model_definition, model_role_permission, model_version, permission, record,
    refresh_token, role, role_permission, user, user_permission,
};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateSystemTables)]
    }
}

pub struct CreateSystemTables;

impl MigrationName for CreateSystemTables {
    fn name(&self) -> &'static str {
        "m20250101_000001_create_system_tables"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateSystemTables {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(role::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(role::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(role::Column::Name).string().not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(permission::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(permission::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(permission::Column::Key).string().not_null().unique_key())
                    .col(ColumnDef::new(permission::Column::Name).string().not_null())
                    .col(ColumnDef::new(permission::Column::Category).string_len(32).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(user::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(user::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(user::Column::Email).string().not_null().unique_key())
                    .col(ColumnDef::new(user::Column::PasswordHash).string().not_null())
                    .col(ColumnDef::new(user::Column::Name).string().not_null())
                    .col(ColumnDef::new(user::Column::RoleId).uuid().not_null())
                    .col(ColumnDef::new(user::Column::IsActive).boolean().not_null().default(true))
                    .col(ColumnDef::new(user::Column::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(user::Column::UpdatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create().from(user::Entity, user::Column::RoleId).to(role::Entity, role::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(role_permission::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(role_permission::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(role_permission::Column::RoleId).uuid().not_null())
                    .col(ColumnDef::new(role_permission::Column::PermissionId).uuid().not_null())
                    .col(ColumnDef::new(role_permission::Column::Granted).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(role_permission::Entity, role_permission::Column::RoleId)
                            .to(role::Entity, role::Column::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(role_permission::Entity, role_permission::Column::PermissionId)
                            .to(permission::Entity, permission::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_role_permission_pair")
                    .table(role_permission::Entity)
                    .col(role_permission::Column::RoleId)
                    .col(role_permission::Column::PermissionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(user_permission::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(user_permission::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(user_permission::Column::UserId).uuid().not_null())
                    .col(ColumnDef::new(user_permission::Column::PermissionId).uuid().not_null())
                    .col(ColumnDef::new(user_permission::Column::Granted).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(user_permission::Entity, user_permission::Column::UserId)
                            .to(user::Entity, user::Column::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(user_permission::Entity, user_permission::Column::PermissionId)
                            .to(permission::Entity, permission::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_user_permission_pair")
                    .table(user_permission::Entity)
                    .col(user_permission::Column::UserId)
                    .col(user_permission::Column::PermissionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(model_definition::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(model_definition::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(model_definition::Column::Name).string().not_null().unique_key())
                    .col(ColumnDef::new(model_definition::Column::TableName).string())
                    .col(ColumnDef::new(model_definition::Column::OwnerField).string())
                    .col(ColumnDef::new(model_definition::Column::Json).json().not_null())
                    .col(ColumnDef::new(model_definition::Column::Version).integer().not_null().default(0))
                    .col(ColumnDef::new(model_definition::Column::Published).boolean().not_null().default(false))
                    .col(ColumnDef::new(model_definition::Column::PublishedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(model_definition::Column::PublishedBy).uuid())
                    .col(ColumnDef::new(model_definition::Column::IsSystem).boolean().not_null().default(false))
                    .col(ColumnDef::new(model_definition::Column::FilePath).string())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_model_definition_name")
                    .table(model_definition::Entity)
                    .col(model_definition::Column::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(model_version::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(model_version::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(model_version::Column::ModelId).uuid().not_null())
                    .col(ColumnDef::new(model_version::Column::VersionNumber).integer().not_null())
                    .col(ColumnDef::new(model_version::Column::Json).json().not_null())
                    .col(ColumnDef::new(model_version::Column::CreatedBy).uuid())
                    .col(ColumnDef::new(model_version::Column::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(model_version::Entity, model_version::Column::ModelId)
                            .to(model_definition::Entity, model_definition::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_model_version_model")
                    .table(model_version::Entity)
                    .col(model_version::Column::ModelId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_model_version_pair")
                    .table(model_version::Entity)
                    .col(model_version::Column::ModelId)
                    .col(model_version::Column::VersionNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(model_role_permission::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(model_role_permission::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(model_role_permission::Column::ModelId).uuid().not_null())
                    .col(ColumnDef::new(model_role_permission::Column::RoleId).uuid().not_null())
                    .col(ColumnDef::new(model_role_permission::Column::PermissionId).uuid().not_null())
                    .col(ColumnDef::new(model_role_permission::Column::Allowed).boolean().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(model_role_permission::Entity, model_role_permission::Column::ModelId)
                            .to(model_definition::Entity, model_definition::Column::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(model_role_permission::Entity, model_role_permission::Column::RoleId)
                            .to(role::Entity, role::Column::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(model_role_permission::Entity, model_role_permission::Column::PermissionId)
                            .to(permission::Entity, permission::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_model_role_permission_triple")
                    .table(model_role_permission::Entity)
                    .col(model_role_permission::Column::ModelId)
                    .col(model_role_permission::Column::RoleId)
                    .col(model_role_permission::Column::PermissionId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(record::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(record::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(record::Column::ModelId).uuid().not_null())
                    .col(ColumnDef::new(record::Column::ModelName).string().not_null())
                    .col(ColumnDef::new(record::Column::ModelVersionId).uuid())
                    .col(ColumnDef::new(record::Column::Data).json().not_null())
                    .col(ColumnDef::new(record::Column::OwnerId).uuid())
                    .col(ColumnDef::new(record::Column::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(record::Column::UpdatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(record::Column::DeletedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .from(record::Entity, record::Column::ModelId)
                            .to(model_definition::Entity, model_definition::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        for (name, col) in [
            ("idx_record_model_id", record::Column::ModelId),
            ("idx_record_model_name", record::Column::ModelName),
            ("idx_record_owner_id", record::Column::OwnerId),
            ("idx_record_model_version_id", record::Column::ModelVersionId),
        ] {
            manager.create_index(Index::create().name(name).table(record::Entity).col(col).to_owned()).await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(refresh_token::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(refresh_token::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(refresh_token::Column::TokenHash).string().not_null())
                    .col(ColumnDef::new(refresh_token::Column::UserId).uuid().not_null())
                    .col(ColumnDef::new(refresh_token::Column::CreatedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(refresh_token::Column::ExpiresAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(refresh_token::Column::Revoked).boolean().not_null().default(false))
                    .col(ColumnDef::new(refresh_token::Column::RevokedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(refresh_token::Column::ReplacedById).uuid())
                    .col(ColumnDef::new(refresh_token::Column::CreatedByIp).string())
                    .foreign_key(
                        ForeignKey::create()
                            .from(refresh_token::Entity, refresh_token::Column::UserId)
                            .to(user::Entity, user::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        for (name, col) in [
            ("idx_refresh_token_user_id", refresh_token::Column::UserId),
            ("idx_refresh_token_expires_at", refresh_token::Column::ExpiresAt),
        ] {
            manager
                .create_index(Index::create().name(name).table(refresh_token::Entity).col(col).to_owned())
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(audit_log::Entity)
                    .if_not_exists()
                    .col(ColumnDef::new(audit_log::Column::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(audit_log::Column::UserId).uuid())
                    .col(ColumnDef::new(audit_log::Column::Action).string().not_null())
                    .col(ColumnDef::new(audit_log::Column::ModelId).uuid())
                    .col(ColumnDef::new(audit_log::Column::ModelName).string())
                    .col(ColumnDef::new(audit_log::Column::RecordId).uuid())
                    .col(ColumnDef::new(audit_log::Column::Details).json().not_null())
                    .col(ColumnDef::new(audit_log::Column::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .from(audit_log::Entity, audit_log::Column::UserId)
                            .to(user::Entity, user::Column::Id),
                    )
                    .to_owned(),
            )
            .await?;
        for (name, col) in [
            ("idx_audit_log_user_id", audit_log::Column::UserId),
            ("idx_audit_log_model_id", audit_log::Column::ModelId),
            ("idx_audit_log_created_at", audit_log::Column::CreatedAt),
        ] {
            manager.create_index(Index::create().name(name).table(audit_log::Entity).col(col).to_owned()).await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(audit_log::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(refresh_token::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(record::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(model_role_permission::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(model_version::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(model_definition::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(user_permission::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(role_permission::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(user::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(permission::Entity).if_exists().to_owned()).await?;
        manager.drop_table(Table::drop().table(role::Entity).if_exists().to_owned()).await?;
        Ok(())
    }
}
