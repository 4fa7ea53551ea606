//! access entity for database storage.

use gatehouse_types::Access;
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use crate::Error;

/// access database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accesses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uniq_id: String,
    pub host: String,
    /// canonical cidr, empty when the access has no prefix.
    pub prefix: String,
    /// empty when the access has no alias.
    pub alias: String,
    pub user: String,
    pub port: i32,
    pub comment: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Access {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let prefix = if model.prefix.is_empty() {
            None
        } else {
            Some(model.prefix.parse().map_err(|_| {
                Error::Corrupt {
                    table: "accesses",
                    detail: format!("{} has prefix {:?}", model.uniq_id, model.prefix),
                }
            })?)
        };
        let port = u16::try_from(model.port)
            .map_err(|_| Error::Corrupt {
                table: "accesses",
                detail: format!("{} has port {}", model.uniq_id, model.port),
            })?;

        Ok(Access {
            uniq_id: model.uniq_id,
            host: model.host,
            prefix,
            alias: (!model.alias.is_empty()).then_some(model.alias),
            user: model.user,
            port,
            comment: model.comment,
            ip: None,
        })
    }
}

impl From<&Access> for ActiveModel {
    fn from(access: &Access) -> Self {
        ActiveModel {
            uniq_id: Set(access.uniq_id.clone()),
            host: Set(access.host.clone()),
            prefix: Set(access.prefix.map(|p| p.to_string()).unwrap_or_default()),
            alias: Set(access.alias.clone().unwrap_or_default()),
            user: Set(access.user.clone()),
            port: Set(i32::from(access.port)),
            comment: Set(access.comment.clone()),
        }
    }
}
