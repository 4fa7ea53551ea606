//! replication outbox store.

use std::path::Path;

use gatehouse_types::ReplicationEntry;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait, QueryOrder};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::entity::replication;
use crate::migration::OutboxMigrator;
use crate::{Error, OutboxStore, Result, connect, connect_in_memory};

/// sqlite implementation of [`OutboxStore`].
#[derive(Debug, Clone)]
pub struct OutboxDb {
    conn: DatabaseConnection,
}

impl OutboxDb {
    /// open (and migrate) the outbox at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Self {
            conn: connect(path).await?,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// create an in-memory outbox for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let db = Self {
            conn: connect_in_memory().await?,
        };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        OutboxMigrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration {
                store: "outbox",
                reason: e.to_string(),
            })
    }
}

impl OutboxStore for OutboxDb {
    async fn push_entry(&self, entry: &ReplicationEntry) -> Result<()> {
        let model: replication::ActiveModel = entry.into();
        replication::Entity::insert(model).exec(&self.conn).await?;
        Ok(())
    }

    async fn next_entry(&self) -> Result<Option<ReplicationEntry>> {
        replication::Entity::find()
            .order_by_asc(replication::Column::CreationDate)
            .order_by_asc(replication::Column::UniqId)
            .one(&self.conn)
            .await?
            .map(ReplicationEntry::try_from)
            .transpose()
    }

    async fn remove_entry(&self, id: Uuid) -> Result<()> {
        let result = replication::Entity::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::NotFound(format!("replication entry {id}")));
        }
        Ok(())
    }

    async fn count_entries(&self) -> Result<u64> {
        Ok(replication::Entity::find().count(&self.conn).await?)
    }
}
