//! database migrations for gatehouse.
//!
//! each store file gets its own migrator so a principal's `accesses.db`
//! carries only the access table.

pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_accesses;
mod m20260301_000002_create_replications;
mod m20260301_000003_create_logs;

/// migrations of a per-principal access store.
pub struct AccessMigrator;

#[async_trait::async_trait]
impl MigratorTrait for AccessMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000001_create_accesses::Migration)]
    }
}

/// migrations of the instance outbox.
pub struct OutboxMigrator;

#[async_trait::async_trait]
impl MigratorTrait for OutboxMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000002_create_replications::Migration)]
    }
}

/// migrations of a session log store.
pub struct LogMigrator;

#[async_trait::async_trait]
impl MigratorTrait for LogMigrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20260301_000003_create_logs::Migration)]
    }
}
