//! gatehouse: an ssh bastion whose authorization state replicates between
//! instances.
//!
//! every command goes through the [`Dispatcher`]: it is looked up in the
//! [`Registry`], gated by its rights level, checked, executed and recorded
//! in a session log. mutating commands reduce their effect to a payload that
//! the [`Daemon`] forwards to sibling instances, where the same operation's
//! `replicate` applies it again.

#![warn(missing_docs)]

pub mod args;
pub mod cli;
pub mod context;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod operation;
pub mod operations;
pub mod registry;
pub mod session;

pub use args::{ArgSpec, Arguments};
pub use context::{Bastion, BastionBuilder};
pub use daemon::{Consumer, Daemon, ForwardStep};
pub use dispatch::{Dispatcher, Response};
pub use error::Error;
pub use gate::Gate;
pub use operation::{GrantedAccess, Invocation, Operation, OperationSpec, Outcome};
pub use registry::Registry;
pub use session::{NoPrompt, Prompt, SessionLauncher, SessionRequest, SshLauncher, TerminalPrompt};

/// result type for bastion operations.
pub type Result<T> = std::result::Result<T, Error>;
