//! session log store.

use std::path::Path;

use gatehouse_types::SessionLog;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::entity::session_log;
use crate::migration::LogMigrator;
use crate::{Error, LogStore, Result, connect, connect_in_memory};

/// sqlite implementation of [`LogStore`].
#[derive(Debug, Clone)]
pub struct LogDb {
    conn: DatabaseConnection,
}

impl LogDb {
    /// open (and migrate) the log store at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Self {
            conn: connect(path).await?,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// create an in-memory log store for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let db = Self {
            conn: connect_in_memory().await?,
        };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        LogMigrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration {
                store: "log",
                reason: e.to_string(),
            })
    }
}

impl LogStore for LogDb {
    async fn save_log(&self, log: &SessionLog) -> Result<()> {
        use session_log::Column;

        let model: session_log::ActiveModel = log.into();
        session_log::Entity::insert(model)
            .on_conflict(
                OnConflict::column(Column::UniqId)
                    .update_columns([
                        Column::SessionEndDate,
                        Column::Command,
                        Column::Comment,
                        Column::HostTo,
                        Column::PortTo,
                        Column::UserTo,
                        Column::Allowed,
                    ])
                    .to_owned(),
            )
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    async fn get_log(&self, id: Uuid) -> Result<Option<SessionLog>> {
        session_log::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await?
            .map(SessionLog::try_from)
            .transpose()
    }

    async fn list_logs(&self, command: Option<&str>, limit: u64) -> Result<Vec<SessionLog>> {
        let mut query = session_log::Entity::find();
        if let Some(command) = command {
            query = query.filter(session_log::Column::Command.eq(command));
        }
        query
            .order_by_desc(session_log::Column::SessionStartDate)
            .limit(limit)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(SessionLog::try_from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn test_log_open_then_update() {
        let db = LogDb::new_in_memory().await.unwrap();
        let mut log = SessionLog::open("alice", &["connect".to_string()], None);
        db.save_log(&log).await.unwrap();

        log.command = "connect".into();
        log.host_to = "example.com".into();
        log.port_to = 22;
        log.user_to = "root".into();
        log.allowed = true;
        log.close();
        db.save_log(&log).await.unwrap();

        let stored = db.get_log(log.uniq_id).await.unwrap().unwrap();
        assert!(stored.allowed);
        assert_eq!(stored.host_to, "example.com");
        assert!(stored.session_end_date.is_some());
        assert_eq!(db.list_logs(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_logs_filters_and_orders() {
        let db = LogDb::new_in_memory().await.unwrap();
        for (age, command) in [(30, "connect"), (20, "info"), (10, "connect")] {
            let mut log = SessionLog::open("alice", &[], None);
            log.session_start_date = Utc::now() - Duration::seconds(age);
            log.command = command.to_string();
            db.save_log(&log).await.unwrap();
        }

        let sessions = db.list_logs(Some("connect"), 10).await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].session_start_date > sessions[1].session_start_date);

        assert_eq!(db.list_logs(None, 1).await.unwrap().len(), 1);
    }
}
