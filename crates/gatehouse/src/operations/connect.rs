//! interactive sessions to granted destinations.

use std::path::PathBuf;

use async_trait::async_trait;
use gatehouse_types::{ReplicationData, Rights};
use tracing::{debug, info};

use crate::Result;
use crate::args::ArgSpec;
use crate::context::Bastion;
use crate::error::Error;
use crate::gate::ACCESS_ARG;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};
use crate::session::SessionRequest;

const CONNECT_ARGS: &[ArgSpec] = &[ArgSpec::required(
    "access",
    "destination as [user@]host[:port] or alias",
)];

/// open a session to a granted destination.
pub struct Connect {
    spec: OperationSpec,
}

impl Connect {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "connect",
                aliases: &["ssh"],
                description: "open an ssh session to a destination you are granted",
                rights: Rights::HasAccess,
                args: CONNECT_ARGS,
                replicable: true,
            },
        }
    }
}

/// where the blob of a recording lives in off-load storage.
fn storage_key(account: &str, session: &str) -> String {
    format!("{account}/{session}.ttyrec")
}

#[async_trait]
impl Operation for Connect {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let grant = inv.grant.as_ref().ok_or_else(|| {
            Error::Authorization(format!(
                "no destination resolved for {}",
                inv.args.get(ACCESS_ARG).unwrap_or_default()
            ))
        })?;
        let destination = &grant.destination;

        let dir = inv.user.ttyrec_dir().join(destination.display_host());
        tokio::fs::create_dir_all(&dir).await?;
        let recording = dir.join(format!("{}.ttyrec", inv.session_id));

        let request = SessionRequest {
            account: inv.user.name.clone(),
            destination: destination.clone(),
            key_paths: grant.key_paths.clone(),
            recording: recording.clone(),
        };
        let status = inv.bastion.launcher().launch(&request).await?;

        Ok(Outcome::mutation(
            format!(
                "session to {} ended with status {status}",
                destination.short_string()
            ),
            ReplicationData::new()
                .with("account", inv.user.name.clone())
                .with("session", inv.session_id.to_string())
                .with("recording", recording.display().to_string()),
        ))
    }

    async fn post_execute(&self, bastion: &Bastion, payload: &ReplicationData) -> Result<()> {
        if !bastion.config().offloading.enabled {
            return Ok(());
        }
        let recording = PathBuf::from(payload.require("recording")?);
        if !tokio::fs::try_exists(&recording).await? {
            debug!(path = %recording.display(), "no recording to off-load");
            return Ok(());
        }

        let sealed = bastion.cipher().seal(&tokio::fs::read(&recording).await?)?;
        let staged = recording.with_extension("ttyrec.enc");
        tokio::fs::write(&staged, sealed).await?;

        let key = storage_key(payload.require("account")?, payload.require("session")?);
        let pushed = bastion.storage().push(&key, &staged).await;
        tokio::fs::remove_file(&staged).await?;
        pushed?;

        tokio::fs::remove_file(&recording).await?;
        info!(key = %key, "recording off-loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_layout() {
        assert_eq!(
            storage_key("alice", "67e55044-10b1-426f-9247-bb680e5fe0c8"),
            "alice/67e55044-10b1-426f-9247-bb680e5fe0c8.ttyrec"
        );
    }
}
