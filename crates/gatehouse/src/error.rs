//! error taxonomy surfaced to callers of the bastion.

use thiserror::Error;

/// errors raised by dispatch, operations and the daemon.
#[derive(Debug, Error)]
pub enum Error {
    /// bad argument shape or value; the operation never started.
    #[error("{0}")]
    Validation(String),

    /// required arguments are missing, or usage was requested.
    #[error("{0}")]
    MissingArguments(String),

    /// the caller lacks the rights or role; the attempt is logged as denied.
    #[error("access denied: {0}")]
    Authorization(String),

    /// unknown group, account, key or grant.
    #[error("{0} not found")]
    NotFound(String),

    /// the request matches several destinations and no choice was made.
    #[error("ambiguous destination, candidates: {}", .0.join(", "))]
    Ambiguous(Vec<String>),

    /// no operation is registered under this name.
    #[error("unknown command: {0}")]
    UnknownOperation(String),

    /// the operation is switched off on this instance.
    #[error("command {0} is disabled on this bastion")]
    Disabled(String),

    /// the queue or blob storage is unavailable.
    #[error("transport error: {0}")]
    Transport(String),

    /// a payload could not be opened or sealed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// a local store failed.
    #[error("database error: {0}")]
    Database(String),

    /// an os account or filesystem mutation failed.
    #[error("system error: {0}")]
    System(String),
}

impl Error {
    /// process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingArguments(_) => 2,
            Error::Disabled(_) => 126,
            _ => 1,
        }
    }

    /// whether the attempt should be recorded as denied.
    pub fn is_denial(&self) -> bool {
        matches!(self, Error::Authorization(_))
    }
}

impl From<gatehouse_db::Error> for Error {
    fn from(e: gatehouse_db::Error) -> Self {
        match e {
            gatehouse_db::Error::NotFound(what) => Error::NotFound(what),
            gatehouse_db::Error::AlreadyExists(what) => {
                Error::Validation(format!("{what} already exists"))
            }
            other => Error::Database(other.to_string()),
        }
    }
}

impl From<gatehouse_grants::Error> for Error {
    fn from(e: gatehouse_grants::Error) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<gatehouse_state::Error> for Error {
    fn from(e: gatehouse_state::Error) -> Self {
        use gatehouse_state::Error as StateError;
        match e {
            StateError::NotFound(what) => Error::NotFound(what),
            StateError::AlreadyExists(what) => Error::Validation(format!("{what} already exists")),
            StateError::InvalidKey(reason) => Error::Validation(format!("invalid public key: {reason}")),
            StateError::Database(e) => e.into(),
            StateError::Grants(e) => e.into(),
            other => Error::System(other.to_string()),
        }
    }
}

impl From<gatehouse_replication::Error> for Error {
    fn from(e: gatehouse_replication::Error) -> Self {
        use gatehouse_replication::Error as ReplicationError;
        match e {
            ReplicationError::Crypto(reason) | ReplicationError::Encoding(reason) => {
                Error::Crypto(reason)
            }
            ReplicationError::Transport(reason) | ReplicationError::Storage(reason) => {
                Error::Transport(reason)
            }
            ReplicationError::Database(e) => e.into(),
        }
    }
}

impl From<gatehouse_types::Error> for Error {
    fn from(e: gatehouse_types::Error) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<gatehouse_types::NameError> for Error {
    fn from(e: gatehouse_types::NameError) -> Self {
        Error::Validation(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::System(e.to_string())
    }
}
