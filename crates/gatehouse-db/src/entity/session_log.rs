//! session log entity.

use chrono::{DateTime, Utc};
use gatehouse_types::SessionLog;
use sea_orm::Set;
use sea_orm::entity::prelude::*;

use crate::Error;

/// session log database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub uniq_id: String,
    pub local_username: String,
    pub arguments: String,
    pub session_start_date: DateTime<Utc>,
    pub session_end_date: Option<DateTime<Utc>>,
    pub ip_from: String,
    pub port_from: String,
    pub bastion_ip: String,
    pub bastion_port: String,
    pub command: String,
    pub comment: String,
    pub host_to: String,
    pub port_to: i32,
    pub user_to: String,
    pub allowed: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for SessionLog {
    type Error = Error;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(SessionLog {
            uniq_id: model
                .uniq_id
                .parse()
                .map_err(|_| Error::Corrupt {
                    table: "logs",
                    detail: format!("id {:?}", model.uniq_id),
                })?,
            local_username: model.local_username,
            arguments: model.arguments,
            session_start_date: model.session_start_date,
            session_end_date: model.session_end_date,
            ip_from: model.ip_from,
            port_from: model.port_from,
            bastion_ip: model.bastion_ip,
            bastion_port: model.bastion_port,
            command: model.command,
            comment: model.comment,
            host_to: model.host_to,
            port_to: u16::try_from(model.port_to).unwrap_or_default(),
            user_to: model.user_to,
            allowed: model.allowed,
        })
    }
}

impl From<&SessionLog> for ActiveModel {
    fn from(log: &SessionLog) -> Self {
        ActiveModel {
            uniq_id: Set(log.uniq_id.to_string()),
            local_username: Set(log.local_username.clone()),
            arguments: Set(log.arguments.clone()),
            session_start_date: Set(log.session_start_date),
            session_end_date: Set(log.session_end_date),
            ip_from: Set(log.ip_from.clone()),
            port_from: Set(log.port_from.clone()),
            bastion_ip: Set(log.bastion_ip.clone()),
            bastion_port: Set(log.bastion_port.clone()),
            command: Set(log.command.clone()),
            comment: Set(log.comment.clone()),
            host_to: Set(log.host_to.clone()),
            port_to: Set(i32::from(log.port_to)),
            user_to: Set(log.user_to.clone()),
            allowed: Set(log.allowed),
        }
    }
}
