//! database entity models for sea-orm.
//!
//! optional values are stored as empty strings so the composite unique
//! index on accesses compares them like any other value.

pub mod access;
pub mod replication;
pub mod session_log;
