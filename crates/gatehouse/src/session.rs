//! seams onto the interactive terminal and the remote session.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use gatehouse_types::Access;
use tokio::process::Command;
use tracing::info;

use crate::error::Error;
use crate::Result;

/// asks the invoking user to make a choice.
pub trait Prompt: Send + Sync {
    /// pick one of `choices`; `None` when the user declined.
    fn choose(&self, question: &str, choices: &[String]) -> Option<usize>;
}

/// never answers; every choice is declined.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn choose(&self, _question: &str, _choices: &[String]) -> Option<usize> {
        None
    }
}

/// reads answers from the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn choose(&self, question: &str, choices: &[String]) -> Option<usize> {
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{question}");
        for (i, choice) in choices.iter().enumerate() {
            let _ = writeln!(stdout, "  {}) {choice}", i + 1);
        }
        let _ = write!(stdout, "choice: ");
        let _ = stdout.flush();

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        let picked: usize = line.trim().parse().ok()?;
        (1..=choices.len()).contains(&picked).then(|| picked - 1)
    }
}

/// everything needed to open a session to a granted destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    /// local account opening the session.
    pub account: String,
    /// resolved destination.
    pub destination: Access,
    /// private keys the destination may accept, in preference order.
    pub key_paths: Vec<PathBuf>,
    /// where the session recording should be written.
    pub recording: PathBuf,
}

/// opens the remote session.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    /// run the session to completion, returning the remote exit status.
    async fn launch(&self, request: &SessionRequest) -> Result<i32>;
}

/// runs the system `ssh` client with the terminal attached.
#[derive(Debug, Clone)]
pub struct SshLauncher {
    program: PathBuf,
}

impl SshLauncher {
    /// launch through `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SshLauncher {
    fn default() -> Self {
        Self::new("/usr/bin/ssh")
    }
}

#[async_trait]
impl SessionLauncher for SshLauncher {
    async fn launch(&self, request: &SessionRequest) -> Result<i32> {
        let destination = &request.destination;
        let mut command = Command::new(&self.program);
        for key in &request.key_paths {
            command.arg("-i").arg(key);
        }
        if destination.port != 0 {
            command.arg("-p").arg(destination.port.to_string());
        }
        let host = match destination.ip {
            Some(ip) => ip.to_string(),
            None => destination.display_host(),
        };
        if destination.user.is_empty() {
            command.arg(host);
        } else {
            command.arg(format!("{}@{}", destination.user, host));
        }

        info!(account = %request.account, destination = %destination.short_string(), "opening session");
        let status = command
            .status()
            .await
            .map_err(|e| Error::System(format!("{}: {e}", self.program.display())))?;
        Ok(status.code().unwrap_or(1))
    }
}
