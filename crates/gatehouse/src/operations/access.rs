//! personal and group access grants.

use async_trait::async_trait;
use gatehouse_db::{AccessDb, AccessStore, Error as DbError};
use gatehouse_grants::split_user_input;
use gatehouse_state::open_accesses;
use gatehouse_types::{Access, ReplicationData, Rights};

use crate::Result;
use crate::args::ArgSpec;
use crate::context::Bastion;
use crate::error::Error;
use crate::gate::{ACCESS_ARG, GROUP_ARG};
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

/// whose access store an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// the caller's own accesses.
    Personal,
    /// the accesses of the `--group` group.
    Group,
}

impl Scope {
    /// payload key naming the owning principal.
    fn key(self) -> &'static str {
        match self {
            Scope::Personal => "account",
            Scope::Group => "group",
        }
    }

    /// the principal named by the invocation.
    fn owner<'a>(self, inv: &'a Invocation<'_>) -> Result<&'a str> {
        match self {
            Scope::Personal => Ok(&inv.user.name),
            Scope::Group => inv.args.require(GROUP_ARG),
        }
    }

    async fn store(self, bastion: &Bastion, owner: &str) -> Result<AccessDb> {
        let directory = bastion.directory();
        let db = match self {
            Scope::Personal => open_accesses(&directory.load_user(owner).await?).await?,
            Scope::Group => open_accesses(&directory.group(owner).await?).await?,
        };
        Ok(db)
    }
}

const PERSONAL_ADD_ARGS: &[ArgSpec] = &[
    ArgSpec::required("access", "destination as [user@]host[:port], ip or prefix"),
    ArgSpec::optional("alias", "short name for the destination"),
    ArgSpec::optional("comment", "free text note"),
    ArgSpec::flag("force", "keep a host that does not resolve as an alias"),
];

const GROUP_ADD_ARGS: &[ArgSpec] = &[
    ArgSpec::required("group", "group name"),
    ArgSpec::required("access", "destination as [user@]host[:port], ip or prefix"),
    ArgSpec::optional("alias", "short name for the destination"),
    ArgSpec::optional("comment", "free text note"),
    ArgSpec::flag("force", "keep a host that does not resolve as an alias"),
];

const PERSONAL_DEL_ARGS: &[ArgSpec] = &[
    ArgSpec::required("access", "destination exactly as it was added"),
    ArgSpec::optional("alias", "alias the destination was added with"),
];

const GROUP_DEL_ARGS: &[ArgSpec] = &[
    ArgSpec::required("group", "group name"),
    ArgSpec::required("access", "destination exactly as it was added"),
    ArgSpec::optional("alias", "alias the destination was added with"),
];

const GROUP_LIST_ARGS: &[ArgSpec] = &[ArgSpec::required("group", "group name")];

/// grant a destination.
pub struct AccessAdd {
    scope: Scope,
    spec: OperationSpec,
}

impl AccessAdd {
    /// the add operation for `scope`.
    pub fn new(scope: Scope) -> Self {
        let spec = match scope {
            Scope::Personal => OperationSpec {
                name: "self access add",
                aliases: &[],
                description: "grant yourself access to a destination",
                rights: Rights::Public,
                args: PERSONAL_ADD_ARGS,
                replicable: true,
            },
            Scope::Group => OperationSpec {
                name: "group access add",
                aliases: &[],
                description: "grant a group access to a destination",
                rights: Rights::GroupAclKeeper,
                args: GROUP_ADD_ARGS,
                replicable: true,
            },
        };
        Self { scope, spec }
    }
}

#[async_trait]
impl Operation for AccessAdd {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let target = split_user_input(inv.args.require(ACCESS_ARG)?, false)?;
        if inv.registry.is_reserved(&target.host) {
            return Err(Error::Validation(format!(
                "{} is a reserved word and cannot be a host",
                target.host
            )));
        }
        if let Some(alias) = inv.args.get("alias") {
            if alias.is_empty() || alias.contains(char::is_whitespace) {
                return Err(Error::Validation(format!("invalid alias {alias:?}")));
            }
            if inv.registry.is_reserved(alias) {
                return Err(Error::Validation(format!(
                    "{alias} is a reserved word and cannot be an alias"
                )));
            }
        }
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let target = split_user_input(inv.args.require(ACCESS_ARG)?, false)?;
        let strict = !inv.args.flag("force");
        let (mut access, _) = inv
            .bastion
            .engine()
            .build_access(
                &target.host,
                &target.user,
                target.port,
                inv.args.get("alias"),
                strict,
            )
            .await?;
        access.comment = inv.args.get("comment").unwrap_or_default().to_string();

        let owner = self.scope.owner(inv)?;
        let store = self.scope.store(inv.bastion, owner).await?;
        if store.find_access(&access).await?.is_some() {
            return Err(Error::Validation(format!(
                "access {} already exists",
                access.short_string()
            )));
        }

        let payload = access_payload(&access).with(self.scope.key(), owner);
        Ok(Outcome::mutation(
            format!("access to {} added", access.short_string()),
            payload,
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let access = access_from_payload(payload)?;
        let store = self
            .scope
            .store(bastion, payload.require(self.scope.key())?)
            .await?;
        match store.insert_access(&access).await {
            Ok(_) | Err(DbError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// revoke a destination.
pub struct AccessDel {
    scope: Scope,
    spec: OperationSpec,
}

impl AccessDel {
    /// the delete operation for `scope`.
    pub fn new(scope: Scope) -> Self {
        let spec = match scope {
            Scope::Personal => OperationSpec {
                name: "self access del",
                aliases: &[],
                description: "revoke one of your accesses",
                rights: Rights::Public,
                args: PERSONAL_DEL_ARGS,
                replicable: true,
            },
            Scope::Group => OperationSpec {
                name: "group access del",
                aliases: &[],
                description: "revoke one of a group's accesses",
                rights: Rights::GroupAclKeeper,
                args: GROUP_DEL_ARGS,
                replicable: true,
            },
        };
        Self { scope, spec }
    }
}

#[async_trait]
impl Operation for AccessDel {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let target = split_user_input(inv.args.require(ACCESS_ARG)?, false)?;
        let (access, _) = inv
            .bastion
            .engine()
            .build_access(
                &target.host,
                &target.user,
                target.port,
                inv.args.get("alias"),
                false,
            )
            .await?;

        let owner = self.scope.owner(inv)?;
        let store = self.scope.store(inv.bastion, owner).await?;
        let found = store
            .find_access(&access)
            .await?
            .ok_or_else(|| Error::NotFound(format!("access {}", access.short_string())))?;

        let payload = access_payload(&found).with(self.scope.key(), owner);
        Ok(Outcome::mutation(
            format!("access to {} removed", found.short_string()),
            payload,
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let access = access_from_payload(payload)?;
        let store = self
            .scope
            .store(bastion, payload.require(self.scope.key())?)
            .await?;
        match store.delete_access(&access).await {
            Ok(_) | Err(DbError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// show granted destinations.
pub struct AccessList {
    scope: Scope,
    spec: OperationSpec,
}

impl AccessList {
    /// the list operation for `scope`.
    pub fn new(scope: Scope) -> Self {
        let spec = match scope {
            Scope::Personal => OperationSpec {
                name: "self access list",
                aliases: &["self accesses"],
                description: "list your personal accesses",
                rights: Rights::Public,
                args: &[],
                replicable: false,
            },
            Scope::Group => OperationSpec {
                name: "group access list",
                aliases: &["group accesses"],
                description: "list a group's accesses",
                rights: Rights::GroupMember,
                args: GROUP_LIST_ARGS,
                replicable: false,
            },
        };
        Self { scope, spec }
    }
}

#[async_trait]
impl Operation for AccessList {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let owner = self.scope.owner(inv)?;
        let accesses = self
            .scope
            .store(inv.bastion, owner)
            .await?
            .list_accesses()
            .await?;
        if accesses.is_empty() {
            return Ok(Outcome::output("no accesses"));
        }
        let lines: Vec<String> = accesses.iter().map(Access::to_string).collect();
        Ok(Outcome::output(lines.join("\n")))
    }
}

fn access_payload(access: &Access) -> ReplicationData {
    ReplicationData::new()
        .with("host", access.host.clone())
        .with(
            "prefix",
            access.prefix.map(|p| p.to_string()).unwrap_or_default(),
        )
        .with("alias", access.alias.clone().unwrap_or_default())
        .with("user", access.user.clone())
        .with("port", access.port.to_string())
        .with("comment", access.comment.clone())
}

fn access_from_payload(payload: &ReplicationData) -> Result<Access> {
    let prefix = match payload.get("prefix").unwrap_or_default() {
        "" => None,
        raw => Some(
            raw.parse()
                .map_err(|_| Error::Validation(format!("invalid prefix {raw:?}")))?,
        ),
    };
    let access = Access {
        uniq_id: String::new(),
        host: payload.get("host").unwrap_or_default().to_string(),
        prefix,
        alias: payload
            .get("alias")
            .filter(|a| !a.is_empty())
            .map(str::to_string),
        user: payload.get("user").unwrap_or_default().to_string(),
        port: payload.port("port")?,
        comment: payload.get("comment").unwrap_or_default().to_string(),
        ip: None,
    };
    access
        .validate()
        .map_err(|e| Error::Validation(e.to_string()))?;
    Ok(access)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_payload_round_trip() {
        let access = Access {
            host: "example.com".into(),
            prefix: Some("93.184.216.34/32".parse().unwrap()),
            alias: Some("web".into()),
            user: "root".into(),
            port: 22,
            comment: "prod".into(),
            ..Access::default()
        };
        let payload = access_payload(&access);
        assert_eq!(payload.get("prefix"), Some("93.184.216.34/32"));
        assert_eq!(access_from_payload(&payload).unwrap(), access);
    }

    #[test]
    fn test_invalid_payload_rejected() {
        let empty = ReplicationData::new().with("port", "22");
        assert!(access_from_payload(&empty).is_err());
        let bad_prefix = ReplicationData::new().with("host", "x").with("prefix", "nope");
        assert!(access_from_payload(&bad_prefix).is_err());
    }
}
