//! the contract every bastion operation implements.

use std::path::PathBuf;

use async_trait::async_trait;
use gatehouse_grants::Source;
use gatehouse_state::User;
use gatehouse_types::{Access, ReplicationData, Rights};
use uuid::Uuid;

use crate::Result;
use crate::args::{ArgSpec, Arguments, usage};
use crate::context::Bastion;
use crate::registry::Registry;
use crate::session::Prompt;

/// static description of an operation, fixed at registration.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    /// space separated command name, e.g. `group member add`.
    pub name: &'static str,
    /// alternative names.
    pub aliases: &'static [&'static str],
    /// one line description.
    pub description: &'static str,
    /// rights level checked before anything else runs.
    pub rights: Rights,
    /// accepted arguments.
    pub args: &'static [ArgSpec],
    /// whether the payload is queued for siblings and post-processing.
    pub replicable: bool,
}

impl OperationSpec {
    /// usage text shown for `help`.
    pub fn usage(&self) -> String {
        usage(self.name, self.description, self.args)
    }
}

/// the destination the gate resolved for a `HasAccess` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantedAccess {
    /// the selected destination.
    pub destination: Access,
    /// keys usable for it.
    pub key_paths: Vec<PathBuf>,
    /// sources that granted it.
    pub sources: Vec<Source>,
}

/// one authorized call of an operation.
pub struct Invocation<'a> {
    /// the instance.
    pub bastion: &'a Bastion,
    /// every registered operation.
    pub registry: &'a Registry,
    /// the calling account.
    pub user: &'a User,
    /// parsed arguments.
    pub args: &'a Arguments,
    /// interactive prompt of the calling session.
    pub prompt: &'a dyn Prompt,
    /// destination resolved by the gate, for `HasAccess` operations.
    pub grant: Option<GrantedAccess>,
    /// id of the session log, which also names the recording.
    pub session_id: Uuid,
}

/// what an execution produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// text shown to the caller.
    pub output: String,
    /// mutation capture, empty for read-only operations.
    pub payload: ReplicationData,
}

impl Outcome {
    /// a read-only result.
    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            payload: ReplicationData::new(),
        }
    }

    /// a result carrying a mutation.
    pub fn mutation(output: impl Into<String>, payload: ReplicationData) -> Self {
        Self {
            output: output.into(),
            payload,
        }
    }
}

/// a registered bastion command.
///
/// `checks` validates without mutating, `execute` reduces the request to a
/// payload, and `replicate` applies a payload. the dispatcher runs
/// `replicate` right after `execute` on the origin and the daemon runs it
/// again on every sibling, so it must rely on nothing but the payload.
#[async_trait]
pub trait Operation: Send + Sync {
    /// static description.
    fn spec(&self) -> &OperationSpec;

    /// operation specific preconditions.
    async fn checks(&self, _inv: &Invocation<'_>) -> Result<()> {
        Ok(())
    }

    /// run the operation and capture its mutation.
    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome>;

    /// follow-on work run by the forwarder before the entry leaves.
    async fn post_execute(&self, _bastion: &Bastion, _payload: &ReplicationData) -> Result<()> {
        Ok(())
    }

    /// apply a captured mutation.
    async fn replicate(&self, _bastion: &Bastion, _payload: &ReplicationData) -> Result<()> {
        Ok(())
    }
}
