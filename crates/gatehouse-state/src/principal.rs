//! users and groups, the units that own accesses and keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::membership::{Membership, Role};

/// name of the per-principal access store.
pub const ACCESSES_DB: &str = "accesses.db";
/// name of the per-user session log store.
pub const LOGS_DB: &str = "logs.db";
/// name of the per-user totp state file.
pub const TOTP_FILE: &str = ".google_authenticator";
/// name of the per-user recordings directory.
pub const TTYREC_DIR: &str = "ttyrecs";

/// paths every principal home shares.
pub trait Home {
    /// the principal's home directory.
    fn home(&self) -> &Path;

    /// the principal's access store.
    fn accesses_db_path(&self) -> PathBuf {
        self.home().join(ACCESSES_DB)
    }

    /// the principal's key directory.
    fn ssh_dir(&self) -> PathBuf {
        self.home().join(".ssh")
    }
}

/// one bastion account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// account name.
    pub name: String,
    /// numeric user id.
    pub uid: u32,
    /// home directory.
    pub home: PathBuf,
    /// roles held in each bastion group, keyed by group name.
    pub groups: BTreeMap<String, Membership>,
}

impl User {
    /// whether this is the superuser.
    pub fn is_root(&self) -> bool {
        self.uid == 0
    }

    /// roles held in `group` (none when not in it).
    pub fn membership(&self, group: &str) -> Membership {
        self.groups.get(group).copied().unwrap_or_default()
    }

    /// whether the user holds `role` in `group`.
    pub fn has_role(&self, group: &str, role: Role) -> bool {
        self.membership(group).has(role)
    }

    /// the user's own session log store.
    pub fn logs_db_path(&self) -> PathBuf {
        self.home.join(LOGS_DB)
    }

    /// the user's ingress keys.
    pub fn authorized_keys_path(&self) -> PathBuf {
        self.ssh_dir().join("authorized_keys")
    }

    /// hosts the user's ssh client has accepted.
    pub fn known_hosts_path(&self) -> PathBuf {
        self.ssh_dir().join("known_hosts")
    }

    /// the user's totp state.
    pub fn totp_path(&self) -> PathBuf {
        self.home.join(TOTP_FILE)
    }

    /// where the user's session recordings land.
    pub fn ttyrec_dir(&self) -> PathBuf {
        self.home.join(TTYREC_DIR)
    }
}

impl Home for User {
    fn home(&self) -> &Path {
        &self.home
    }
}

/// one bastion group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// bastion name, without the os prefix.
    pub name: String,
    /// os name of the group and of its service account.
    pub system_name: String,
    /// home of the service account, holding the shared accesses and keys.
    pub home: PathBuf,
}

impl Home for Group {
    fn home(&self) -> &Path {
        &self.home
    }
}
