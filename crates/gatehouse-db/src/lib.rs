//! embedded stores for gatehouse.
//!
//! this crate provides persistent storage for:
//! - Accesses, one sqlite file per principal (`accesses.db`)
//! - the replication outbox, one per instance
//! - Session logs, instance-wide and per account (`logs.db`)

#![warn(missing_docs)]

mod accesses;
mod entity;
mod error;
mod logs;
mod migration;
mod outbox;

pub use accesses::AccessDb;
pub use error::Error;
pub use logs::LogDb;
pub use outbox::OutboxDb;

use std::future::Future;
use std::path::Path;

use gatehouse_types::{Access, ReplicationEntry, SessionLog};
use sea_orm::{Database as SeaOrmDatabase, DatabaseConnection};
use uuid::Uuid;

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// storage of one principal's grants.
pub trait AccessStore: Send + Sync {
    /// list every stored access.
    fn list_accesses(&self) -> impl Future<Output = Result<Vec<Access>>> + Send;

    /// insert an access, assigning its id. fails with `AlreadyExists` on a
    /// duplicate `(host, prefix, alias, user, port)`.
    fn insert_access(&self, access: &Access) -> impl Future<Output = Result<Access>> + Send;

    /// find the access with the same host, prefix, user and port.
    fn find_access(&self, access: &Access) -> impl Future<Output = Result<Option<Access>>> + Send;

    /// delete the access with the same host, prefix, user and port,
    /// returning the deleted row.
    fn delete_access(&self, access: &Access) -> impl Future<Output = Result<Access>> + Send;
}

/// the local durable queue of entries waiting to be forwarded.
pub trait OutboxStore: Send + Sync {
    /// append an entry.
    fn push_entry(&self, entry: &ReplicationEntry) -> impl Future<Output = Result<()>> + Send;

    /// the oldest entry, if any.
    fn next_entry(&self) -> impl Future<Output = Result<Option<ReplicationEntry>>> + Send;

    /// remove a forwarded entry.
    fn remove_entry(&self, id: Uuid) -> impl Future<Output = Result<()>> + Send;

    /// number of queued entries.
    fn count_entries(&self) -> impl Future<Output = Result<u64>> + Send;
}

/// session log storage.
pub trait LogStore: Send + Sync {
    /// insert or update a log by id.
    fn save_log(&self, log: &SessionLog) -> impl Future<Output = Result<()>> + Send;

    /// fetch one log.
    fn get_log(&self, id: Uuid) -> impl Future<Output = Result<Option<SessionLog>>> + Send;

    /// most recent logs first, optionally restricted to one command.
    fn list_logs(
        &self,
        command: Option<&str>,
        limit: u64,
    ) -> impl Future<Output = Result<Vec<SessionLog>>> + Send;
}

/// connect to the sqlite file at `path`, creating it if needed.
async fn connect(path: &Path) -> Result<DatabaseConnection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Open {
                path: parent.to_path_buf(),
                reason: e.to_string(),
            })?;
    }
    let url = format!("sqlite:{}?mode=rwc", path.display());
    SeaOrmDatabase::connect(&url).await.map_err(|e| Error::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// connect to a private in-memory sqlite database.
async fn connect_in_memory() -> Result<DatabaseConnection> {
    SeaOrmDatabase::connect("sqlite::memory:")
        .await
        .map_err(|e| Error::Open {
            path: ":memory:".into(),
            reason: e.to_string(),
        })
}
