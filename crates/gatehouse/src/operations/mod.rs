//! built-in bastion operations.

mod access;
mod account;
mod connect;
mod group;
mod host_key;
mod info;
mod ingress_key;
mod totp;

pub use access::{AccessAdd, AccessDel, AccessList, Scope};
pub use account::{AccountCreate, AccountDelete};
pub use connect::Connect;
pub use group::{GroupCreate, GroupDelete, GroupInfo, GroupList, RoleChange};
pub use host_key::{EgressKeyList, HostKeyForget};
pub use info::{Info, SessionsList};
pub use ingress_key::{IngressKeyAdd, IngressKeyDel, IngressKeyList};
pub use totp::{TotpDisable, TotpEnable, TotpRegenerate};

use chrono::Utc;
use gatehouse_state::{Role, User};
use gatehouse_types::ReplicationData;

use crate::Result;
use crate::context::Bastion;
use crate::error::Error;
use crate::registry::Registry;

/// register every built-in operation.
pub fn register_builtins(registry: &mut Registry) {
    for scope in [Scope::Personal, Scope::Group] {
        registry
            .register(AccessAdd::new(scope))
            .register(AccessDel::new(scope))
            .register(AccessList::new(scope));
    }
    for role in Role::ALL {
        registry
            .register(RoleChange::new(role, true))
            .register(RoleChange::new(role, false));
    }
    registry
        .register(GroupCreate::new())
        .register(GroupDelete::new())
        .register(GroupList::new())
        .register(GroupInfo::new())
        .register(AccountCreate::new())
        .register(AccountDelete::new())
        .register(IngressKeyAdd::new())
        .register(IngressKeyDel::new())
        .register(IngressKeyList::new())
        .register(EgressKeyList::new())
        .register(HostKeyForget::new())
        .register(TotpEnable::new())
        .register(TotpDisable::new())
        .register(TotpRegenerate::new())
        .register(Info::new())
        .register(SessionsList::new())
        .register(Connect::new());
}

/// suffix given to archived accounts and groups.
fn archive_suffix() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// the account a payload is about.
async fn payload_user(bastion: &Bastion, payload: &ReplicationData) -> Result<User> {
    let account = payload.require("account")?;
    Ok(bastion.directory().load_user(account).await?)
}

/// fail unless `account` is managed by this bastion.
async fn require_managed(bastion: &Bastion, account: &str) -> Result<()> {
    if bastion.directory().is_managed_user(account).await? {
        Ok(())
    } else {
        Err(Error::NotFound(format!("account {account}")))
    }
}

fn parse_role(raw: &str) -> Result<Role> {
    Role::ALL
        .into_iter()
        .find(|r| r.as_str() == raw)
        .ok_or_else(|| Error::Validation(format!("unknown role {raw:?}")))
}
