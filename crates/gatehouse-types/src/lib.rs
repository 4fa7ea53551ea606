//! core types for gatehouse - an ssh bastion with replicated authorization state.
//!
//! this crate provides the data structures shared by every other crate:
//! - [`Access`]: one stored grant linking a principal to a destination pattern
//! - [`Rights`]: the static authorization tier attached to an operation
//! - [`ReplicationEntry`] / [`ReplicationData`]: the replication envelope and payload
//! - [`SessionLog`]: one audit record per invocation
//! - [`Config`]: application configuration

#![warn(missing_docs)]

mod access;
mod config;
mod error;
mod names;
mod replication;
mod rights;
mod session;

pub use access::{Access, AccessError};
pub use config::{
    AccessConfig, AmbiguityPolicy, Config, GeneralConfig, OffloadingConfig, QueueConfig,
    ReplicationConfig, StorageConfig,
};
pub use error::Error;
pub use names::{AccountName, GroupName, NameError};
pub use replication::{LOG_ACTION, NEW_LOG_ACTION, ReplicationData, ReplicationEntry};
pub use rights::Rights;
pub use session::SessionLog;

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
