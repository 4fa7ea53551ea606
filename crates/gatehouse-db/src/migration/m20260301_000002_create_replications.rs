//! create replication outbox table migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Replications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Replications::UniqId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Replications::CreationDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Replications::Instance).string().not_null())
                    .col(ColumnDef::new(Replications::Action).string().not_null())
                    .col(ColumnDef::new(Replications::Data).text().not_null())
                    .to_owned(),
            )
            .await?;

        // the forwarder always pops the oldest entry
        manager
            .create_index(
                Index::create()
                    .name("idx_replications_creation_date")
                    .table(Replications::Table)
                    .col(Replications::CreationDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Replications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Replications {
    Table,
    UniqId,
    CreationDate,
    Instance,
    Action,
    Data,
}
