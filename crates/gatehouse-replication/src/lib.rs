//! replication plumbing for gatehouse.
//!
//! a mutation is captured as a [`ReplicationData`] payload, sealed by the
//! [`PayloadCipher`], wrapped in a [`ReplicationEntry`] and appended to the
//! local [`Outbox`]. a forwarder pushes outbox entries through a
//! [`QueueTransport`]; siblings receive them through an [`EntryHandler`] and
//! use the [`IdempotencyCache`] to apply each entry at most once.
//!
//! [`ReplicationData`]: gatehouse_types::ReplicationData
//! [`ReplicationEntry`]: gatehouse_types::ReplicationEntry

#![warn(missing_docs)]

pub mod cipher;
pub mod dedup;
pub mod error;
pub mod outbox;
pub mod queue;
pub mod storage;

pub use cipher::PayloadCipher;
pub use dedup::{Claim, IdempotencyCache};
pub use error::Error;
pub use outbox::{LOG_FIELD, Outbox, decode_log};
pub use queue::{EntryHandler, MemoryQueue, QueueTransport, queue_from_config};
pub use storage::{BlobStorage, LocalStorage, storage_from_config};

/// result type for replication operations.
pub type Result<T> = std::result::Result<T, Error>;
