//! the ssh client state of an account: egress keys and known hosts.

use async_trait::async_trait;
use gatehouse_state::{Home, list_key_pairs};
use gatehouse_types::{ReplicationData, Rights};
use tracing::debug;

use super::payload_user;
use crate::Result;
use crate::args::ArgSpec;
use crate::context::Bastion;
use crate::error::Error;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

const FORGET_ARGS: &[ArgSpec] = &[ArgSpec::required(
    "hostkey",
    "host whose key to forget, as name, address or [name]:port",
)];

/// forget the key a destination presented, so a rebuilt host can be
/// reached again.
pub struct HostKeyForget {
    spec: OperationSpec,
}

impl HostKeyForget {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self hostkey forget",
                aliases: &[],
                description: "forget a host key from your known_hosts file",
                rights: Rights::Public,
                args: FORGET_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for HostKeyForget {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let host = inv.args.require("hostkey")?;
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(Error::Validation(format!("invalid host {host:?}")));
        }
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let host = inv.args.require("hostkey")?;
        Ok(Outcome::mutation(
            format!("host key of {host} forgotten"),
            ReplicationData::new()
                .with("account", inv.user.name.clone())
                .with("hostkey", host),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let user = payload_user(bastion, payload).await?;
        let host = payload.require("hostkey")?;
        let removed = bastion.directory().forget_host_key(&user, host).await?;
        debug!(account = %user.name, host, removed, "forgot host key");
        Ok(())
    }
}

/// show the keys the bastion uses on the account's behalf.
pub struct EgressKeyList {
    spec: OperationSpec,
}

impl EgressKeyList {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self egress-key list",
                aliases: &["self egress-keys", "self egress-keys list"],
                description: "list the public keys your sessions leave the bastion with",
                rights: Rights::Public,
                args: &[],
                replicable: false,
            },
        }
    }
}

#[async_trait]
impl Operation for EgressKeyList {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let pairs = list_key_pairs(&inv.user.ssh_dir()).await?;
        if pairs.is_empty() {
            return Ok(Outcome::output("no egress keys"));
        }
        let lines: Vec<String> = pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| format!("{:>2}: {} ({})", i + 1, pair.public, pair.public_path.display()))
            .collect();
        Ok(Outcome::output(lines.join("\n")))
    }
}
