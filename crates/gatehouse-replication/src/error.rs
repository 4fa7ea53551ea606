//! error types for gatehouse-replication

use thiserror::Error;

/// errors raised while framing, queueing or transporting entries.
#[derive(Debug, Error)]
pub enum Error {
    /// malformed ciphertext, wrong key or unsupported key length.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// payload was not valid json or base64.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// the queue transport could not push or deliver.
    #[error("transport error: {0}")]
    Transport(String),

    /// the blob storage could not store or fetch.
    #[error("storage error: {0}")]
    Storage(String),

    /// outbox database error.
    #[error(transparent)]
    Database(#[from] gatehouse_db::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Encoding(e.to_string())
    }
}
