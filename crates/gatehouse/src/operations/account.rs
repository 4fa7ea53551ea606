//! bastion accounts.

use async_trait::async_trait;
use gatehouse_state::PublicKey;
use gatehouse_types::{AccountName, ReplicationData, Rights};
use tracing::debug;

use super::{archive_suffix, require_managed};
use crate::Result;
use crate::args::ArgSpec;
use crate::context::Bastion;
use crate::error::Error;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

const CREATE_ARGS: &[ArgSpec] = &[
    ArgSpec::required("account", "name of the new account"),
    ArgSpec::required("public-key", "first ingress key, as one authorized_keys line"),
];

const DELETE_ARGS: &[ArgSpec] = &[ArgSpec::required("account", "account to delete")];

/// create a managed account.
pub struct AccountCreate {
    spec: OperationSpec,
}

impl AccountCreate {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "account create",
                aliases: &[],
                description: "create a bastion account with its first ingress key",
                rights: Rights::BastionOwner,
                args: CREATE_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for AccountCreate {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let account = AccountName::new(inv.args.require("account")?)?;
        let directory = inv.bastion.directory();
        if account.as_str().starts_with(directory.naming().prefix()) {
            return Err(Error::Validation(format!(
                "account names cannot start with {}",
                directory.naming().prefix()
            )));
        }
        if directory.accounts().user(account.as_str()).await?.is_some() {
            return Err(Error::Validation(format!(
                "account {} already exists",
                account.as_str()
            )));
        }
        PublicKey::parse(inv.args.require("public-key")?)?;
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let account = inv.args.require("account")?;
        let key = PublicKey::parse(inv.args.require("public-key")?)?;
        Ok(Outcome::mutation(
            format!("account {account} created"),
            ReplicationData::new()
                .with("account", account)
                .with("public-key", key.to_string()),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let account = payload.require("account")?;
        let directory = bastion.directory();
        if directory.accounts().user(account).await?.is_some() {
            debug!(account, "account already exists, nothing to create");
            return Ok(());
        }
        let key = PublicKey::parse(payload.require("public-key")?)?;
        directory.provision_user(account, &key).await?;
        Ok(())
    }
}

/// archive a managed account.
pub struct AccountDelete {
    spec: OperationSpec,
}

impl AccountDelete {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "account delete",
                aliases: &[],
                description: "archive a bastion account and its home",
                rights: Rights::BastionOwner,
                args: DELETE_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for AccountDelete {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let account = inv.args.require("account")?;
        if account == inv.user.name {
            return Err(Error::Validation("you cannot delete your own account".into()));
        }
        require_managed(inv.bastion, account).await
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let account = inv.args.require("account")?;
        Ok(Outcome::mutation(
            format!("account {account} deleted"),
            ReplicationData::new()
                .with("account", account)
                .with("suffix", archive_suffix()),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let account = payload.require("account")?;
        if !bastion.directory().is_managed_user(account).await? {
            debug!(account, "account already gone, nothing to archive");
            return Ok(());
        }
        bastion
            .directory()
            .archive_user(account, payload.require("suffix")?)
            .await?;
        Ok(())
    }
}
