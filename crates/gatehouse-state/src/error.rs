//! error types for gatehouse-state

use thiserror::Error;

/// errors that can occur while loading or mutating principals.
#[derive(Debug, Error)]
pub enum Error {
    /// the named user, group or key does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// the named user, group or key already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// a public key line could not be parsed.
    #[error("invalid public key: {0}")]
    InvalidKey(String),

    /// a system command failed.
    #[error("system command `{command}` failed: {output}")]
    Command {
        /// the command line that was run.
        command: String,
        /// combined stdout and stderr.
        output: String,
    },

    /// filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// access store error.
    #[error(transparent)]
    Database(#[from] gatehouse_db::Error),

    /// access parsing error.
    #[error(transparent)]
    Grants(#[from] gatehouse_grants::Error),
}
