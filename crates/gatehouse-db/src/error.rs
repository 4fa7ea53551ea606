//! errors raised by the embedded stores.

use std::path::PathBuf;

use thiserror::Error;

/// errors that can occur in the access, outbox and log stores.
#[derive(Debug, Error)]
pub enum Error {
    /// no row has the requested key.
    #[error("{0} not found")]
    NotFound(String),

    /// a row with the same unique key is already stored.
    #[error("{0} already exists")]
    AlreadyExists(String),

    /// a stored row no longer converts into its domain value.
    #[error("corrupt {table} row: {detail}")]
    Corrupt {
        /// table the row was read from.
        table: &'static str,
        /// what did not convert.
        detail: String,
    },

    /// the sqlite file could not be created or opened.
    #[error("cannot open {}: {reason}", path.display())]
    Open {
        /// the database file, or `:memory:`.
        path: PathBuf,
        /// underlying failure.
        reason: String,
    },

    /// the schema of a store could not be brought up to date.
    #[error("migrating the {store} store failed: {reason}")]
    Migration {
        /// which store.
        store: &'static str,
        /// underlying failure.
        reason: String,
    },

    /// any other sqlite failure.
    #[error("sqlite error: {0}")]
    Sqlite(String),
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(msg)) => Error::AlreadyExists(msg),
            _ => Error::Sqlite(err.to_string()),
        }
    }
}
