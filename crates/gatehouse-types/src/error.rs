//! error types for gatehouse-types

use thiserror::Error;

/// errors that can occur in gatehouse-types
#[derive(Debug, Error)]
pub enum Error {
    /// a replication payload is missing a field the replay needs
    #[error("replication payload is missing field {0:?}")]
    MissingField(String),

    /// a replication payload field has an unusable value
    #[error("replication payload field {field:?} is invalid: {reason}")]
    InvalidField {
        /// the offending key
        field: String,
        /// why the value was rejected
        reason: String,
    },

    /// configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
