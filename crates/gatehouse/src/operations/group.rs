//! groups and the roles accounts hold in them.

use async_trait::async_trait;
use gatehouse_state::{OWNERS_GROUP, Role};
use gatehouse_types::{GroupName, ReplicationData, Rights};
use tracing::debug;

use super::{archive_suffix, parse_role, require_managed};
use crate::Result;
use crate::args::ArgSpec;
use crate::context::Bastion;
use crate::error::Error;
use crate::gate::GROUP_ARG;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

const ROLE_ARGS: &[ArgSpec] = &[
    ArgSpec::required("group", "group name"),
    ArgSpec::required("account", "account to change"),
];

/// grant or revoke one role in a group.
pub struct RoleChange {
    role: Role,
    add: bool,
    spec: OperationSpec,
}

impl RoleChange {
    /// the operation adding (`add`) or removing `role`.
    pub fn new(role: Role, add: bool) -> Self {
        let (name, description) = match (role, add) {
            (Role::Member, true) => ("group member add", "add a member to a group"),
            (Role::Member, false) => ("group member del", "remove a member from a group"),
            (Role::AclKeeper, true) => ("group aclkeeper add", "add an acl-keeper to a group"),
            (Role::AclKeeper, false) => {
                ("group aclkeeper del", "remove an acl-keeper from a group")
            }
            (Role::GateKeeper, true) => ("group gatekeeper add", "add a gate-keeper to a group"),
            (Role::GateKeeper, false) => {
                ("group gatekeeper del", "remove a gate-keeper from a group")
            }
            (Role::Owner, true) => ("group owner add", "add an owner to a group"),
            (Role::Owner, false) => ("group owner del", "remove an owner from a group"),
        };
        // members are handled by gate-keepers, every other role by owners
        let rights = match role {
            Role::Member => Rights::GroupGateKeeper,
            _ => Rights::GroupOwner,
        };
        Self {
            role,
            add,
            spec: OperationSpec {
                name,
                aliases: &[],
                description,
                rights,
                args: ROLE_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for RoleChange {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let group = inv.args.require(GROUP_ARG)?;
        let account = inv.args.require("account")?;
        require_managed(inv.bastion, account).await?;

        let holds = inv
            .bastion
            .directory()
            .load_user(account)
            .await?
            .has_role(group, self.role);
        match (self.add, holds) {
            (true, true) => Err(Error::Validation(format!(
                "{account} is already {} of {group}",
                self.role
            ))),
            (false, false) => Err(Error::Validation(format!(
                "{account} is not {} of {group}",
                self.role
            ))),
            (false, true) if self.role == Role::Owner => {
                let owners = inv
                    .bastion
                    .directory()
                    .group_members(group, Role::Owner)
                    .await?;
                if owners.len() <= 1 {
                    Err(Error::Validation(format!(
                        "{account} is the last owner of {group}"
                    )))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let group = inv.args.require(GROUP_ARG)?;
        let account = inv.args.require("account")?;
        let payload = ReplicationData::new()
            .with("group", group)
            .with("account", account)
            .with("role", self.role.as_str());
        let output = if self.add {
            format!("{account} is now {} of {group}", self.role)
        } else {
            format!("{account} is no longer {} of {group}", self.role)
        };
        Ok(Outcome::mutation(output, payload))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let group = payload.require("group")?;
        let account = payload.require("account")?;
        let role = parse_role(payload.require("role")?)?;
        let directory = bastion.directory();
        if self.add {
            directory.grant_role(group, account, role).await?;
        } else {
            directory.revoke_role(group, account, role).await?;
        }
        Ok(())
    }
}

const CREATE_ARGS: &[ArgSpec] = &[
    ArgSpec::required("group", "name of the new group"),
    ArgSpec::required("owner", "account that will own the group"),
];

/// create a group.
pub struct GroupCreate {
    spec: OperationSpec,
}

impl GroupCreate {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "group create",
                aliases: &[],
                description: "create a group and its service account",
                rights: Rights::BastionOwner,
                args: CREATE_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for GroupCreate {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let group = GroupName::new(inv.args.require(GROUP_ARG)?)?;
        let directory = inv.bastion.directory();
        if directory.find_group(group.as_str()).await?.is_some() {
            return Err(Error::Validation(format!(
                "group {} already exists",
                group.as_str()
            )));
        }
        let system_name = directory.naming().system_name(group.as_str());
        if directory.accounts().user(&system_name).await?.is_some() {
            return Err(Error::Validation(format!(
                "account {system_name} already exists"
            )));
        }
        require_managed(inv.bastion, inv.args.require("owner")?).await
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let group = inv.args.require(GROUP_ARG)?;
        let owner = inv.args.require("owner")?;
        Ok(Outcome::mutation(
            format!("group {group} created, owned by {owner}"),
            ReplicationData::new()
                .with("group", group)
                .with("owner", owner),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let group = payload.require("group")?;
        let directory = bastion.directory();
        if directory.find_group(group).await?.is_some() {
            debug!(group, "group already exists, nothing to create");
            return Ok(());
        }
        directory
            .provision_group(group, payload.require("owner")?)
            .await?;
        Ok(())
    }
}

const DELETE_ARGS: &[ArgSpec] = &[ArgSpec::required("group", "group to delete")];

/// archive a group.
pub struct GroupDelete {
    spec: OperationSpec,
}

impl GroupDelete {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "group delete",
                aliases: &[],
                description: "archive a group, its role groups and its service account",
                rights: Rights::BastionOwner,
                args: DELETE_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for GroupDelete {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let group = inv.args.require(GROUP_ARG)?;
        if group == OWNERS_GROUP {
            return Err(Error::Validation(format!(
                "the {OWNERS_GROUP} group cannot be deleted"
            )));
        }
        inv.bastion.directory().group(group).await?;
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let group = inv.args.require(GROUP_ARG)?;
        Ok(Outcome::mutation(
            format!("group {group} deleted"),
            ReplicationData::new()
                .with("group", group)
                .with("suffix", archive_suffix()),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let group = payload.require("group")?;
        let directory = bastion.directory();
        if directory.find_group(group).await?.is_none() {
            debug!(group, "group already gone, nothing to archive");
            return Ok(());
        }
        directory
            .archive_group(group, payload.require("suffix")?)
            .await?;
        Ok(())
    }
}

/// list groups with the caller's roles.
pub struct GroupList {
    spec: OperationSpec,
}

impl GroupList {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "group list",
                aliases: &["groups"],
                description: "list every group and your roles in it",
                rights: Rights::Public,
                args: &[],
                replicable: false,
            },
        }
    }
}

#[async_trait]
impl Operation for GroupList {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let groups = inv.bastion.directory().all_groups().await?;
        if groups.is_empty() {
            return Ok(Outcome::output("no groups"));
        }
        let lines: Vec<String> = groups
            .iter()
            .map(|group| {
                let roles: Vec<&str> = inv
                    .user
                    .membership(group)
                    .roles()
                    .into_iter()
                    .map(Role::as_str)
                    .collect();
                if roles.is_empty() {
                    group.clone()
                } else {
                    format!("{group:<24} {}", roles.join(", "))
                }
            })
            .collect();
        Ok(Outcome::output(lines.join("\n")))
    }
}

const INFO_ARGS: &[ArgSpec] = &[ArgSpec::required("group", "group to describe")];

/// show who holds which role in a group.
pub struct GroupInfo {
    spec: OperationSpec,
}

impl GroupInfo {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "group info",
                aliases: &[],
                description: "show the members of a group by role",
                rights: Rights::Public,
                args: INFO_ARGS,
                replicable: false,
            },
        }
    }
}

#[async_trait]
impl Operation for GroupInfo {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let group = inv.args.require(GROUP_ARG)?;
        let directory = inv.bastion.directory();
        directory.group(group).await?;

        let mut lines = vec![format!("group {group}")];
        for role in Role::ALL {
            let members = directory.group_members(group, role).await?;
            lines.push(format!("  {:<11} {}", role.as_str(), members.join(", ")));
        }
        Ok(Outcome::output(lines.join("\n")))
    }
}
