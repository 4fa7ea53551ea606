//! error types for gatehouse-grants.

use gatehouse_types::AccessError;
use thiserror::Error;

/// errors that can occur while parsing or building accesses.
#[derive(Debug, Error)]
pub enum Error {
    /// the port fragment is not a number in `0..=65535`.
    #[error("port is not a valid integer: {0:?}")]
    InvalidPort(String),

    /// no host fragment was supplied.
    #[error("host is missing")]
    MissingHost,

    /// strict parsing needs `user@host`.
    #[error("unable to parse access from user input {0:?}: no @ separator found")]
    MissingSeparator(String),

    /// strict parsing could not turn the host into an address.
    #[error("host {0:?} is neither an IP, a prefix nor a resolvable host")]
    Unresolvable(String),

    /// the built access violates a structural invariant.
    #[error(transparent)]
    InvalidAccess(#[from] AccessError),
}

/// result type for gatehouse-grants operations.
pub type Result<T> = std::result::Result<T, Error>;
