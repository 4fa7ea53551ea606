//! principal model for gatehouse.
//!
//! users and groups, their four-role memberships, key material and totp
//! state. all os account data flows through the [`SystemAccounts`] seam,
//! and the os group suffix convention is only parsed in [`membership`].

#![warn(missing_docs)]

pub mod accounts;
pub mod directory;
pub mod error;
pub mod keys;
pub mod membership;
pub mod principal;
pub mod totp;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use accounts::{EtcSystemAccounts, SystemAccounts, SystemGroup, SystemUser};
pub use directory::{Directory, NOLOGIN_SHELL, OWNERS_GROUP, open_accesses};
pub use error::Error;
pub use keys::{KeyPair, PublicKey, forget_known_host, list_key_pairs, read_authorized_keys};
pub use membership::{GroupNaming, Membership, Role};
pub use principal::{Group, Home, User};
pub use totp::TotpState;

/// result type for principal operations.
pub type Result<T> = std::result::Result<T, Error>;
