//! command line entry points.
//!
//! the binary is installed as the login shell of managed accounts, so sshd
//! runs it as `gatehouse -c "<command>"`. the same words can be given after
//! `gatehouse run`, and `gatehouse daemon` runs the replication daemon.

mod config;

pub use config::{ConfigArgs, parse_level};

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use gatehouse_replication::queue_from_config;
use tracing::debug;
use tracing_subscriber::FmtSubscriber;

use crate::context::Bastion;
use crate::daemon::Daemon;
use crate::dispatch::Dispatcher;
use crate::gate::ACCESS_ARG;
use crate::registry::Registry;
use crate::session::TerminalPrompt;

/// gatehouse - ssh bastion with replicated authorization state
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(about = "SSH bastion with replicated authorization state", long_about = None)]
#[command(version)]
pub struct Cli {
    /// command line passed by sshd when used as a login shell
    #[arg(short = 'c', value_name = "COMMAND")]
    pub command_string: Option<String>,

    /// configuration flags
    #[command(flatten)]
    pub config: ConfigArgs,

    /// subcommand; without one the `-c` command line is dispatched
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run one bastion command as the invoking account
    Run {
        /// operation name followed by its arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        words: Vec<String>,
    },

    /// run the replication daemon
    Daemon,
}

impl Cli {
    /// run the parsed command line, returning the process exit code.
    pub async fn run(self) -> Result<i32> {
        let level = self.config.log_level.clone();
        let config = self.config.into_config()?;

        let level = parse_level(level.as_deref().unwrap_or(&config.general.log_level));
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;

        let words = match (self.command, self.command_string) {
            (Some(Command::Daemon), _) => {
                let bastion = Arc::new(Bastion::builder(config).open().await?);
                let queue = queue_from_config(&bastion.config().replication.queue);
                let registry = Arc::new(Registry::with_builtins());
                Daemon::new(bastion, registry, queue)
                    .run()
                    .await
                    .wrap_err("replication daemon stopped")?;
                return Ok(0);
            }
            (Some(Command::Run { words }), _) => words,
            (None, Some(line)) => split_command_line(&line)?,
            (None, None) => Vec::new(),
        };

        let registry = Arc::new(Registry::with_builtins());
        if words.is_empty() {
            println!("{}", help_text(&registry));
            return Ok(0);
        }
        let words = implicit_connect(&registry, words);

        let bastion = Arc::new(Bastion::builder(config).open().await?);
        let dispatcher = Dispatcher::new(bastion, registry, Arc::new(TerminalPrompt));
        let account = whoami::username();
        let ssh_connection = std::env::var("SSH_CONNECTION").ok();
        debug!(account = %account, command = %words.join(" "), "dispatching");

        match dispatcher
            .dispatch(&account, &words, ssh_connection.as_deref())
            .await
        {
            Ok(response) => {
                if !response.output.is_empty() {
                    println!("{}", response.output);
                }
                Ok(0)
            }
            Err(e) => {
                eprintln!("{e}");
                Ok(e.exit_code())
            }
        }
    }
}

/// the list of operations shown when no command is given.
pub fn help_text(registry: &Registry) -> String {
    let mut lines = vec!["available commands:".to_string()];
    for operation in registry.operations() {
        let spec = operation.spec();
        lines.push(format!("  {:<28} {}", spec.name, spec.description));
    }
    lines.join("\n")
}

/// treat words that name no operation as a destination to connect to.
pub fn implicit_connect(registry: &Registry, words: Vec<String>) -> Vec<String> {
    if registry.lookup(&words).is_some() {
        return words;
    }
    match words.first() {
        Some(first) if !first.starts_with('-') && !registry.is_reserved(first) => {
            let mut rewritten = vec!["connect".to_string(), format!("--{ACCESS_ARG}")];
            rewritten.extend(words);
            rewritten
        }
        _ => words,
    }
}

/// split a `-c` command line into words, honouring quotes and backslashes.
pub fn split_command_line(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                in_word = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_word = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        color_eyre::eyre::bail!("unterminated {q} quote in command");
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &[&str]) -> Vec<String> {
        s.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_split_plain_words() {
        let split = split_command_line("  self access list ").unwrap();
        assert_eq!(split, words(&["self", "access", "list"]));
    }

    #[test]
    fn test_split_keeps_quoted_key() {
        let split =
            split_command_line(r#"self ingress-key add --public-key "ssh-ed25519 AAAA me@x""#)
                .unwrap();
        assert_eq!(
            split,
            words(&["self", "ingress-key", "add", "--public-key", "ssh-ed25519 AAAA me@x"])
        );

        let split = split_command_line(r#"a 'b c' d\ e """#).unwrap();
        assert_eq!(split, words(&["a", "b c", "d e", ""]));
    }

    #[test]
    fn test_split_rejects_open_quote() {
        assert!(split_command_line("self access add --comment \"oops").is_err());
    }

    #[test]
    fn test_implicit_connect() {
        let registry = Registry::with_builtins();
        assert_eq!(
            implicit_connect(&registry, words(&["root@db1"])),
            words(&["connect", "--access", "root@db1"])
        );
        assert_eq!(
            implicit_connect(&registry, words(&["info"])),
            words(&["info"])
        );
        // a reserved word that names no full operation is left alone
        assert_eq!(
            implicit_connect(&registry, words(&["group", "nope"])),
            words(&["group", "nope"])
        );
    }

    #[test]
    fn test_help_lists_operations() {
        let help = help_text(&Registry::with_builtins());
        assert!(help.contains("self access add"));
        assert!(help.contains("connect"));
    }
}
