//! read-only views of the calling account.

use async_trait::async_trait;
use gatehouse_db::{LogDb, LogStore};
use gatehouse_state::Role;
use gatehouse_types::{Rights, SessionLog};

use crate::Result;
use crate::args::ArgSpec;
use crate::error::Error;
use crate::operation::{Invocation, Operation, OperationSpec, Outcome};

/// describe the caller and this instance.
pub struct Info {
    spec: OperationSpec,
}

impl Info {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "info",
                aliases: &["whoami"],
                description: "show your account and this bastion",
                rights: Rights::Public,
                args: &[],
                replicable: false,
            },
        }
    }
}

#[async_trait]
impl Operation for Info {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let bastion = inv.bastion;
        let user = inv.user;
        let directory = bastion.directory();
        let totp = directory.read_totp(user).await?.is_some();

        let mut lines = vec![
            format!("bastion:  {} ({})", bastion.config().general.name, bastion.instance()),
            format!("account:  {} (uid {})", user.name, user.uid),
            format!("owner:    {}", if directory.is_bastion_owner(user) { "yes" } else { "no" }),
            format!("totp:     {}", if totp { "enabled" } else { "disabled" }),
        ];
        if user.groups.is_empty() {
            lines.push("groups:   none".to_string());
        } else {
            lines.push("groups:".to_string());
            for (group, membership) in &user.groups {
                let roles: Vec<&str> = membership.roles().into_iter().map(Role::as_str).collect();
                lines.push(format!("  {group:<24} {}", roles.join(", ")));
            }
        }
        Ok(Outcome::output(lines.join("\n")))
    }
}

const SESSIONS_ARGS: &[ArgSpec] = &[
    ArgSpec::optional("command", "only show this operation"),
    ArgSpec::optional("limit", "how many sessions to show").default_value("20"),
];

/// list the caller's recent sessions.
pub struct SessionsList {
    spec: OperationSpec,
}

impl SessionsList {
    /// the operation.
    pub fn new() -> Self {
        Self {
            spec: OperationSpec {
                name: "self sessions list",
                aliases: &["self sessions"],
                description: "list your most recent sessions",
                rights: Rights::Public,
                args: SESSIONS_ARGS,
                replicable: false,
            },
        }
    }
}

fn render_log(log: &SessionLog) -> String {
    let mut line = format!(
        "{} {:<8} {:<24}",
        log.session_start_date.format("%Y-%m-%d %H:%M:%S"),
        if log.allowed { "allowed" } else { "denied" },
        log.command,
    );
    if !log.host_to.is_empty() {
        line.push_str(&format!(" {}@{}:{}", log.user_to, log.host_to, log.port_to));
    }
    if !log.ip_from.is_empty() {
        line.push_str(&format!(" from {}", log.ip_from));
    }
    line
}

#[async_trait]
impl Operation for SessionsList {
    fn spec(&self) -> &OperationSpec {
        &self.spec
    }

    async fn execute(&self, inv: &Invocation<'_>) -> Result<Outcome> {
        let limit: u64 = inv
            .args
            .require("limit")?
            .parse()
            .map_err(|_| Error::Validation("--limit must be a positive number".into()))?;
        let store = LogDb::open(&inv.user.logs_db_path()).await?;
        let logs = store.list_logs(inv.args.get("command"), limit).await?;
        if logs.is_empty() {
            return Ok(Outcome::output("no sessions"));
        }
        let lines: Vec<String> = logs.iter().map(render_log).collect();
        Ok(Outcome::output(lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_types::Access;

    use super::*;

    #[test]
    fn test_render_log_shows_target() {
        let mut log = SessionLog::open("alice", &[], Some("192.0.2.7 51234 10.0.0.1 22"));
        log.command = "connect".into();
        log.allowed = true;
        log.set_target(&Access {
            host: "example.com".into(),
            user: "root".into(),
            port: 22,
            ..Access::default()
        });
        let line = render_log(&log);
        assert!(line.contains("allowed"));
        assert!(line.contains("root@example.com:22"));
        assert!(line.ends_with("from 192.0.2.7"));
    }

    #[test]
    fn test_render_denied_log_without_target() {
        let log = SessionLog::open("alice", &[], None);
        let line = render_log(&log);
        assert!(line.contains("denied"));
        assert!(!line.contains('@'));
    }
}
