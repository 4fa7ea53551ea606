//! outbox entity for pending replication entries.

use chrono::{DateTime, Utc};
use gatehouse_types::ReplicationEntry;
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use crate::Error;

/// replication outbox database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "replications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uniq_id: String,
    pub creation_date: DateTime<Utc>,
    pub instance: String,
    pub action: String,
    pub data: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for ReplicationEntry {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let uniq_id = model
            .uniq_id
            .parse()
            .map_err(|_| Error::Corrupt {
                table: "replications",
                detail: format!("id {:?}", model.uniq_id),
            })?;
        Ok(ReplicationEntry {
            uniq_id,
            creation_date: model.creation_date,
            instance: model.instance,
            action: model.action,
            data: model.data,
        })
    }
}

impl From<&ReplicationEntry> for ActiveModel {
    fn from(entry: &ReplicationEntry) -> Self {
        ActiveModel {
            uniq_id: Set(entry.uniq_id.to_string()),
            creation_date: Set(entry.creation_date),
            instance: Set(entry.instance.clone()),
            action: Set(entry.action.clone()),
            data: Set(entry.data.clone()),
        }
    }
}
