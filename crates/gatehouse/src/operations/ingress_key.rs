//! the keys an account logs into the bastion with.

use async_trait::async_trait;
use gatehouse_state::{PublicKey, read_authorized_keys};
use gatehouse_types::{ReplicationData, Rights};

use super::payload_user;
use crate::Result;
use crate::args::ArgSpec;
use crate::context::Bastion;
use crate::error::Error;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

const ADD_ARGS: &[ArgSpec] = &[ArgSpec::required(
    "public-key",
    "key to add, as one authorized_keys line",
)];

const DEL_ARGS: &[ArgSpec] = &[ArgSpec::required(
    "public-key",
    "key to remove, as a full line or its base64 data",
)];

/// add an ingress key.
pub struct IngressKeyAdd {
    spec: OperationSpec,
}

impl IngressKeyAdd {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self ingress-key add",
                aliases: &[],
                description: "allow a new key to log into your account",
                rights: Rights::Public,
                args: ADD_ARGS,
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for IngressKeyAdd {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let key = PublicKey::parse(inv.args.require("public-key")?)?;
        let keys = read_authorized_keys(&inv.user.authorized_keys_path()).await?;
        if keys.iter().any(|k| k.same_key(&key)) {
            return Err(Error::Validation("this key is already allowed".into()));
        }
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let key = PublicKey::parse(inv.args.require("public-key")?)?;
        Ok(Outcome::mutation(
            format!("{} key added", key.algorithm),
            ReplicationData::new()
                .with("account", inv.user.name.clone())
                .with("public-key", key.to_string()),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let user = payload_user(bastion, payload).await?;
        let key = PublicKey::parse(payload.require("public-key")?)?;
        let mut keys = read_authorized_keys(&user.authorized_keys_path()).await?;
        if keys.iter().any(|k| k.same_key(&key)) {
            return Ok(());
        }
        keys.push(key);
        bastion.directory().write_authorized_keys(&user, &keys).await?;
        Ok(())
    }
}

/// remove an ingress key.
pub struct IngressKeyDel {
    spec: OperationSpec,
}

impl IngressKeyDel {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self ingress-key del",
                aliases: &[],
                description: "stop a key from logging into your account",
                rights: Rights::Public,
                args: DEL_ARGS,
                replicable: true,
            },
        }
    }
}

/// the stored key `raw` designates, by full line or by blob.
fn find_key<'k>(keys: &'k [PublicKey], raw: &str) -> Option<&'k PublicKey> {
    let raw = raw.trim();
    match PublicKey::parse(raw) {
        Ok(key) => keys.iter().find(|k| k.same_key(&key)),
        Err(_) => keys.iter().find(|k| k.blob == raw),
    }
}

#[async_trait]
impl Operation for IngressKeyDel {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        let keys = read_authorized_keys(&inv.user.authorized_keys_path()).await?;
        if find_key(&keys, inv.args.require("public-key")?).is_none() {
            return Err(Error::NotFound("no such ingress key".into()));
        }
        if keys.len() == 1 {
            return Err(Error::Validation(
                "this is your last ingress key and cannot be removed".into(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let keys = read_authorized_keys(&inv.user.authorized_keys_path()).await?;
        let key = find_key(&keys, inv.args.require("public-key")?)
            .ok_or_else(|| Error::NotFound("no such ingress key".into()))?;
        Ok(Outcome::mutation(
            format!("{} key removed", key.algorithm),
            ReplicationData::new()
                .with("account", inv.user.name.clone())
                .with("blob", key.blob.clone()),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let user = payload_user(bastion, payload).await?;
        let blob = payload.require("blob")?;
        let mut keys = read_authorized_keys(&user.authorized_keys_path()).await?;
        let before = keys.len();
        keys.retain(|k| k.blob != blob);
        if keys.len() != before {
            bastion.directory().write_authorized_keys(&user, &keys).await?;
        }
        Ok(())
    }
}

/// list ingress keys.
pub struct IngressKeyList {
    spec: OperationSpec,
}

impl IngressKeyList {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self ingress-key list",
                aliases: &["self ingress-keys"],
                description: "list the keys allowed to log into your account",
                rights: Rights::Public,
                args: &[],
                replicable: false,
            },
        }
    }
}

#[async_trait]
impl Operation for IngressKeyList {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let keys = read_authorized_keys(&inv.user.authorized_keys_path()).await?;
        if keys.is_empty() {
            return Ok(Outcome::output("no ingress keys"));
        }
        let lines: Vec<String> = keys
            .iter()
            .enumerate()
            .map(|(i, k)| format!("{:>2}: {k}", i + 1))
            .collect();
        Ok(Outcome::output(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGZha2VrZXlmYWtla2V5ZmFrZWtleWZha2VrZXk= alice@laptop";

    #[test]
    fn test_find_key_by_line_or_blob() {
        let key = PublicKey::parse(ED25519).unwrap();
        let keys = vec![key.clone()];
        assert_eq!(find_key(&keys, ED25519), Some(&key));
        assert_eq!(find_key(&keys, &key.blob), Some(&key));
        assert_eq!(find_key(&keys, "AAAAnothing"), None);
    }
}
