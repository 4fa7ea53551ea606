//! second factor state of the calling account.

use async_trait::async_trait;
use gatehouse_state::TotpState;
use gatehouse_types::{ReplicationData, Rights};

use super::payload_user;
use crate::Result;
use crate::context::Bastion;
use crate::error::Error;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

const CODE_SEPARATOR: &str = ";";

fn state_payload(account: &str, state: &TotpState) -> ReplicationData {
    ReplicationData::new()
        .with("account", account)
        .with("secret", state.secret.clone())
        .with("codes", state.codes.join(CODE_SEPARATOR))
}

fn state_from_payload(payload: &ReplicationData) -> Result<TotpState> {
    let codes = payload.require("codes")?;
    Ok(TotpState {
        secret: payload.require("secret")?.to_string(),
        codes: codes
            .split(CODE_SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

fn render_codes(state: &TotpState) -> String {
    let mut out = String::from("emergency codes, each usable once:\n");
    for code in &state.codes {
        out.push_str(&format!("  {code}\n"));
    }
    out
}

async fn write_state(bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
    let user = payload_user(bastion, payload).await?;
    let state = state_from_payload(payload)?;
    bastion.directory().write_totp(&user, Some(&state)).await?;
    Ok(())
}

/// turn totp on.
pub struct TotpEnable {
    spec: OperationSpec,
}

impl TotpEnable {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self totp enable",
                aliases: &[],
                description: "require a one-time password on login",
                rights: Rights::Public,
                args: &[],
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for TotpEnable {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        if inv.bastion.directory().read_totp(inv.user).await?.is_some() {
            return Err(Error::Validation("totp is already enabled".into()));
        }
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let state = TotpState::generate();
        let output = format!(
            "totp enabled, add this secret to your authenticator: {}\n{}",
            state.secret,
            render_codes(&state)
        );
        Ok(Outcome::mutation(output, state_payload(&inv.user.name, &state)))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        write_state(bastion, payload).await
    }
}

/// turn totp off.
pub struct TotpDisable {
    spec: OperationSpec,
}

impl TotpDisable {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self totp disable",
                aliases: &[],
                description: "stop requiring a one-time password on login",
                rights: Rights::Public,
                args: &[],
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for TotpDisable {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn checks(&self, inv: &Invocation<'_>) -> Result<()> {
        if inv.bastion.directory().read_totp(inv.user).await?.is_none() {
            return Err(Error::Validation("totp is not enabled".into()));
        }
        Ok(())
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        Ok(Outcome::mutation(
            "totp disabled",
            ReplicationData::new().with("account", inv.user.name.clone()),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        let user = payload_user(bastion, payload).await?;
        bastion.directory().write_totp(&user, None).await?;
        Ok(())
    }
}

/// replace the emergency codes.
pub struct TotpRegenerate {
    spec: OperationSpec,
}

impl TotpRegenerate {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self totp regenerate-codes",
                aliases: &[],
                description: "replace your emergency codes with a fresh set",
                rights: Rights::Public,
                args: &[],
                replicable: true,
            },
        }
    }
}

#[async_trait]
impl Operation for TotpRegenerate {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let mut state = inv
            .bastion
            .directory()
            .read_totp(inv.user)
            .await?
            .ok_or_else(|| Error::Validation("totp is not enabled".into()))?;
        state.regenerate_codes();
        Ok(Outcome::mutation(
            render_codes(&state),
            state_payload(&inv.user.name, &state),
        ))
    }

    async fn replicate(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        write_state(bastion, payload).await
    }
}
