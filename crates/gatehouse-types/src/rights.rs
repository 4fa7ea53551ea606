//! rights levels attached to operations at registration time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// the static authorization tier an operation requires.
///
/// variants are ordered from least to most restrictive gate. the order is
/// not an authority order: `GroupOwner` is evaluated against the group named
/// in the request, not globally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rights {
    /// anyone may run the operation.
    Public,
    /// the caller must be granted the `--access` destination.
    HasAccess,
    /// the caller must be a member of the `--group` group.
    GroupMember,
    /// the caller must be an acl-keeper of the `--group` group.
    GroupAclKeeper,
    /// the caller must be a gate-keeper of the `--group` group.
    GroupGateKeeper,
    /// the caller must own the `--group` group (bastion owners always do).
    GroupOwner,
    /// the caller must own the bastion itself.
    BastionOwner,
    /// only the superuser may run the operation.
    Private,
}

impl Rights {
    /// whether this level needs a `--group` argument to be evaluated.
    pub fn requires_group(self) -> bool {
        matches!(
            self,
            Rights::GroupMember
                | Rights::GroupAclKeeper
                | Rights::GroupGateKeeper
                | Rights::GroupOwner
        )
    }

    /// stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Rights::Public => "public",
            Rights::HasAccess => "has-access",
            Rights::GroupMember => "group-member",
            Rights::GroupAclKeeper => "group-acl-keeper",
            Rights::GroupGateKeeper => "group-gate-keeper",
            Rights::GroupOwner => "group-owner",
            Rights::BastionOwner => "bastion-owner",
            Rights::Private => "private",
        }
    }
}

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
