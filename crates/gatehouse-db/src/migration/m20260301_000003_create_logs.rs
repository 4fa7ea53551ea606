//! create session logs table migration

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Logs::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Logs::UniqId).string().not_null().primary_key())
                    .col(ColumnDef::new(Logs::LocalUsername).string_len(50).not_null())
                    .col(ColumnDef::new(Logs::Arguments).text().not_null())
                    .col(
                        ColumnDef::new(Logs::SessionStartDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Logs::SessionEndDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Logs::IpFrom).string_len(45).not_null())
                    .col(ColumnDef::new(Logs::PortFrom).string_len(5).not_null())
                    .col(ColumnDef::new(Logs::BastionIp).string_len(45).not_null())
                    .col(ColumnDef::new(Logs::BastionPort).string_len(5).not_null())
                    .col(ColumnDef::new(Logs::Command).text().not_null())
                    .col(ColumnDef::new(Logs::Comment).text().not_null())
                    .col(ColumnDef::new(Logs::HostTo).string_len(100).not_null())
                    .col(ColumnDef::new(Logs::PortTo).integer().not_null().default(0))
                    .col(ColumnDef::new(Logs::UserTo).string_len(100).not_null())
                    .col(ColumnDef::new(Logs::Allowed).boolean().not_null().default(false))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_logs_session_start_date")
                    .table(Logs::Table)
                    .col(Logs::SessionStartDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Logs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Logs {
    Table,
    UniqId,
    LocalUsername,
    Arguments,
    SessionStartDate,
    SessionEndDate,
    IpFrom,
    PortFrom,
    BastionIp,
    BastionPort,
    Command,
    Comment,
    HostTo,
    PortTo,
    UserTo,
    Allowed,
}
