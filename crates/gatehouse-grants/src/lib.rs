//! access resolution engine for gatehouse.
//!
//! this crate turns user supplied connection text into canonical [`Access`]
//! patterns and decides whether stored grants cover a connection request.
//! evaluation is deny-by-default with union composition: a request is
//! authorized as soon as one source (personal or group) yields a match.
//!
//! [`Access`]: gatehouse_types::Access

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod resolution;
pub mod resolver;
pub mod target;

pub use engine::{AccessEngine, matches};
pub use error::{Error, Result};
pub use resolution::{AccessResolution, AccessSet, Selection, Source};
pub use resolver::{HostResolver, StaticResolver, SystemResolver};
pub use target::{AccessRequest, ConnectionTarget, split_user_input};
