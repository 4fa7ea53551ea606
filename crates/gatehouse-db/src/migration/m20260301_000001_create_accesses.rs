//! create accesses table migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Accesses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Accesses::UniqId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Accesses::Host).string_len(100).not_null().default(""))
                    .col(ColumnDef::new(Accesses::Prefix).string_len(50).not_null().default(""))
                    .col(ColumnDef::new(Accesses::Alias).string_len(100).not_null().default(""))
                    .col(ColumnDef::new(Accesses::User).string_len(50).not_null().default(""))
                    .col(ColumnDef::new(Accesses::Port).integer().not_null().default(0))
                    .col(ColumnDef::new(Accesses::Comment).text().not_null().default(""))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_accesses_destination")
                    .table(Accesses::Table)
                    .col(Accesses::Host)
                    .col(Accesses::Prefix)
                    .col(Accesses::Alias)
                    .col(Accesses::User)
                    .col(Accesses::Port)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Accesses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Accesses {
    Table,
    UniqId,
    Host,
    Prefix,
    Alias,
    User,
    Port,
    Comment,
}
