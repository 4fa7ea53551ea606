//! per-principal access store.

use std::path::Path;

use gatehouse_types::Access;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use crate::entity::access;
use crate::migration::AccessMigrator;
use crate::{AccessStore, Error, Result, connect, connect_in_memory};

/// sqlite implementation of [`AccessStore`].
#[derive(Debug, Clone)]
pub struct AccessDb {
    conn: DatabaseConnection,
}

impl AccessDb {
    /// open (and migrate) the access store at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let db = Self {
            conn: connect(path).await?,
        };
        db.migrate().await?;
        Ok(db)
    }

    /// create an in-memory store for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let db = Self {
            conn: connect_in_memory().await?,
        };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        AccessMigrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration {
                store: "access",
                reason: e.to_string(),
            })
    }

    /// the row with the same `(host, prefix, alias, user, port)` key.
    async fn find_model(&self, access: &Access) -> Result<Option<access::Model>> {
        let prefix = access.prefix.map(|p| p.to_string()).unwrap_or_default();
        let found = access::Entity::find()
            .filter(access::Column::Host.eq(access.host.as_str()))
            .filter(access::Column::Prefix.eq(prefix))
            .filter(access::Column::Alias.eq(access.alias.as_deref().unwrap_or_default()))
            .filter(access::Column::User.eq(access.user.as_str()))
            .filter(access::Column::Port.eq(i32::from(access.port)))
            .one(&self.conn)
            .await?;
        Ok(found)
    }
}

impl AccessStore for AccessDb {
    async fn list_accesses(&self) -> Result<Vec<Access>> {
        access::Entity::find()
            .all(&self.conn)
            .await?
            .into_iter()
            .map(Access::try_from)
            .collect()
    }

    async fn insert_access(&self, access: &Access) -> Result<Access> {
        let mut access = access.clone();
        if access.uniq_id.is_empty() {
            access.uniq_id = Uuid::new_v4().to_string();
        }
        let model: access::ActiveModel = (&access).into();
        let inserted = model.insert(&self.conn).await.map_err(|e| match Error::from(e) {
            Error::AlreadyExists(_) => Error::AlreadyExists(format!("access {}", access.short_string())),
            other => other,
        })?;
        inserted.try_into()
    }

    async fn find_access(&self, access: &Access) -> Result<Option<Access>> {
        self.find_model(access).await?.map(Access::try_from).transpose()
    }

    async fn delete_access(&self, access: &Access) -> Result<Access> {
        let model = self
            .find_model(access)
            .await?
            .ok_or_else(|| Error::NotFound(format!("access {}", access.short_string())))?;
        let deleted = Access::try_from(model.clone())?;
        model.delete(&self.conn).await?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(host: &str, prefix: Option<&str>, alias: Option<&str>, user: &str, port: u16) -> Access {
        Access {
            uniq_id: String::new(),
            host: host.into(),
            prefix: prefix.map(|p| p.parse().unwrap()),
            alias: alias.map(str::to_string),
            user: user.into(),
            port,
            comment: String::new(),
            ip: None,
        }
    }

    #[tokio::test]
    async fn test_access_crud() {
        let db = AccessDb::new_in_memory().await.unwrap();

        let mut grant = access("example.com", Some("93.184.216.34/32"), Some("web"), "root", 22);
        grant.comment = "granted for the migration".into();
        let stored = db.insert_access(&grant).await.unwrap();
        assert!(!stored.uniq_id.is_empty());
        assert_eq!(stored.alias.as_deref(), Some("web"));
        assert_eq!(stored.comment, "granted for the migration");

        let all = db.list_accesses().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], stored);

        let found = db.find_access(&grant).await.unwrap().unwrap();
        assert_eq!(found.uniq_id, stored.uniq_id);

        let deleted = db.delete_access(&grant).await.unwrap();
        assert_eq!(deleted.uniq_id, stored.uniq_id);
        assert!(db.list_accesses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_access_rejected() {
        let db = AccessDb::new_in_memory().await.unwrap();
        let grant = access("", Some("10.0.0.0/8"), None, "root", 22);
        db.insert_access(&grant).await.unwrap();

        let err = db.insert_access(&grant).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)), "got {err:?}");

        // same destination on another port is a different grant
        let other_port = access("", Some("10.0.0.0/8"), None, "root", 2222);
        db.insert_access(&other_port).await.unwrap();
        assert_eq!(db.list_accesses().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_alias_is_part_of_the_key() {
        let db = AccessDb::new_in_memory().await.unwrap();
        let web = access("example.com", Some("93.184.216.34/32"), Some("web"), "root", 22);
        db.insert_access(&web).await.unwrap();

        let web2 = access("example.com", Some("93.184.216.34/32"), Some("web2"), "root", 22);
        assert!(db.find_access(&web2).await.unwrap().is_none());
        db.insert_access(&web2).await.unwrap();

        let bare = access("example.com", Some("93.184.216.34/32"), None, "root", 22);
        assert!(matches!(db.delete_access(&bare).await, Err(Error::NotFound(_))));
        assert_eq!(db.list_accesses().await.unwrap().len(), 2);

        let deleted = db.delete_access(&web).await.unwrap();
        assert_eq!(deleted.alias.as_deref(), Some("web"));
        let remaining = db.list_accesses().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].alias.as_deref(), Some("web2"));
    }

    #[tokio::test]
    async fn test_delete_missing_access() {
        let db = AccessDb::new_in_memory().await.unwrap();
        let err = db
            .delete_access(&access("test.com", None, None, "root", 22))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home").join("accesses.db");

        {
            let db = AccessDb::open(&path).await.unwrap();
            db.insert_access(&access("test.com", Some("198.51.100.20/32"), None, "root", 22))
                .await
                .unwrap();
        }

        let reopened = AccessDb::open(&path).await.unwrap();
        let all = reopened.list_accesses().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].host, "test.com");
    }
}
