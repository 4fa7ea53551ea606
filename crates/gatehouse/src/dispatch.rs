//! runs one bastion command end to end, from lookup to session log.

use std::sync::Arc;

use gatehouse_state::User;
use gatehouse_types::SessionLog;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::Result;
use crate::args::Arguments;
use crate::context::Bastion;
use crate::error::Error;
use crate::gate::Gate;
use crate::operation::Invocation;
use crate::registry::Registry;
use crate::session::Prompt;

/// the result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// text for the caller.
    pub output: String,
    /// id of the session log written for the call.
    pub session_id: Uuid,
}

/// looks commands up, gates them, runs them and records the session.
pub struct Dispatcher {
    bastion: Arc<Bastion>,
    registry: Arc<Registry>,
    prompt: Arc<dyn Prompt>,
}

impl Dispatcher {
    /// a dispatcher over `bastion` and `registry`.
    pub fn new(bastion: Arc<Bastion>, registry: Arc<Registry>, prompt: Arc<dyn Prompt>) -> Self {
        Self {
            bastion,
            registry,
            prompt,
        }
    }

    /// the instance.
    pub fn bastion(&self) -> &Arc<Bastion> {
        &self.bastion
    }

    /// run `words` as `account`.
    ///
    /// a session log is written when the call starts and again when it
    /// ends, whatever the outcome. denied calls are recorded with
    /// `allowed = false`.
    pub async fn dispatch(
        &self,
        account: &str,
        words: &[String],
        ssh_connection: Option<&str>,
    ) -> Result<Response> {
        let user = self.bastion.directory().load_user(account).await?;
        let mut log = SessionLog::open(account, words, ssh_connection);
        self.record(&user, &log, true).await?;

        let result = self.run(&user, words, &mut log).await;
        match &result {
            Ok(_) => info!(account, command = %log.command, "command succeeded"),
            Err(e) if e.is_denial() => {
                warn!(account, command = %log.command, error = %e, "command denied")
            }
            Err(e) => debug!(account, command = %log.command, error = %e, "command failed"),
        }

        log.close();
        self.record(&user, &log, false).await?;

        result.map(|output| Response {
            output,
            session_id: log.uniq_id,
        })
    }

    async fn run(&self, user: &User, words: &[String], log: &mut SessionLog) -> Result<String> {
        let config = self.bastion.config();
        let (operation, used) = self
            .registry
            .lookup(words)
            .ok_or_else(|| Error::UnknownOperation(words.join(" ")))?;
        let spec = operation.spec();
        log.command = spec.name.to_string();

        if config
            .general
            .disabled_operations
            .iter()
            .any(|name| name == spec.name)
        {
            return Err(Error::Disabled(spec.name.to_string()));
        }

        let args = Arguments::parse(spec.args, &words[used..], &spec.usage())?;
        let gate = Gate::new(&self.bastion, self.prompt.as_ref());
        let grant = gate.check(spec.rights, user, &args, log).await?;
        if let Some(grant) = &grant {
            log.set_target(&grant.destination);
        }

        let invocation = Invocation {
            bastion: &self.bastion,
            registry: &self.registry,
            user,
            args: &args,
            prompt: self.prompt.as_ref(),
            grant,
            session_id: log.uniq_id,
        };
        operation.checks(&invocation).await?;

        log.allowed = true;
        self.record(user, log, false).await?;

        let outcome = operation.execute(&invocation).await?;
        if !outcome.payload.is_empty() {
            operation.replicate(&self.bastion, &outcome.payload).await?;
            if spec.replicable && config.daemon_enabled() {
                self.bastion
                    .outbox()
                    .enqueue(spec.name, &outcome.payload)
                    .await?;
            }
        }
        Ok(outcome.output)
    }

    async fn record(&self, user: &User, log: &SessionLog, is_new: bool) -> Result<()> {
        self.bastion.save_log(Some(user), log).await?;
        if self.bastion.config().replication.enabled {
            self.bastion.outbox().enqueue_log(log, is_new).await?;
        }
        Ok(())
    }
}
