//! the fixed four-role group membership model.
//!
//! on the host each role is an os group named `<prefix><group>` for plain
//! members and `<prefix><group>-<suffix>` for the other roles. that spelling
//! is only parsed here, everything else works with [`Role`] and
//! [`Membership`].

use std::fmt;

/// a role an account can hold in a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// may use the group's accesses.
    Member,
    /// may change the group's accesses.
    AclKeeper,
    /// may change the group's members.
    GateKeeper,
    /// may change the group's keepers and owners.
    Owner,
}

impl Role {
    /// every role, members first.
    pub const ALL: [Role; 4] = [Role::Member, Role::AclKeeper, Role::GateKeeper, Role::Owner];

    /// the os group suffix carrying this role.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Role::Member => None,
            Role::AclKeeper => Some("aclk"),
            Role::GateKeeper => Some("gk"),
            Role::Owner => Some("o"),
        }
    }

    /// parse a suffix; the empty suffix is plain membership.
    pub fn from_suffix(suffix: &str) -> Option<Role> {
        match suffix {
            "" => Some(Role::Member),
            "aclk" => Some(Role::AclKeeper),
            "gk" => Some(Role::GateKeeper),
            "o" => Some(Role::Owner),
            _ => None,
        }
    }

    /// human name used in listings and arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::AclKeeper => "aclkeeper",
            Role::GateKeeper => "gatekeeper",
            Role::Owner => "owner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// the roles one account holds in one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Membership {
    /// plain member.
    pub member: bool,
    /// acl keeper.
    pub acl_keeper: bool,
    /// gate keeper.
    pub gate_keeper: bool,
    /// owner.
    pub owner: bool,
}

impl Membership {
    /// whether the role is held.
    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Member => self.member,
            Role::AclKeeper => self.acl_keeper,
            Role::GateKeeper => self.gate_keeper,
            Role::Owner => self.owner,
        }
    }

    /// grant a role.
    pub fn set(&mut self, role: Role) {
        match role {
            Role::Member => self.member = true,
            Role::AclKeeper => self.acl_keeper = true,
            Role::GateKeeper => self.gate_keeper = true,
            Role::Owner => self.owner = true,
        }
    }

    /// whether the group's accesses apply to the account.
    pub fn uses_accesses(&self) -> bool {
        self.member || self.owner
    }

    /// the held roles, members first.
    pub fn roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|r| self.has(*r)).collect()
    }
}

/// maps between bastion group names and os group names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNaming {
    prefix: String,
}

impl GroupNaming {
    /// naming with the given os prefix (`bg_` by default).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// the os prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// the os name of the group itself, which is also its service account.
    pub fn system_name(&self, group: &str) -> String {
        format!("{}{}", self.prefix, group)
    }

    /// the os group carrying `role` in `group`.
    pub fn os_group(&self, group: &str, role: Role) -> String {
        match role.suffix() {
            Some(suffix) => format!("{}{}-{}", self.prefix, group, suffix),
            None => self.system_name(group),
        }
    }

    /// every os group backing `group`.
    pub fn os_groups(&self, group: &str) -> Vec<String> {
        Role::ALL.iter().map(|r| self.os_group(group, *r)).collect()
    }

    /// split an os group name into the bastion group and role.
    ///
    /// returns `None` for os groups outside the prefix. an unknown suffix
    /// still names the group but carries no role.
    pub fn parse(&self, os_name: &str) -> Option<(String, Option<Role>)> {
        let rest = os_name.strip_prefix(&self.prefix)?;
        let (group, suffix) = match rest.split_once('-') {
            Some((group, suffix)) => (group, suffix),
            None => (rest, ""),
        };
        Some((group.to_string(), Role::from_suffix(suffix)))
    }
}

impl Default for GroupNaming {
    fn default() -> Self {
        Self::new("bg_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_os_group_names() {
        let naming = GroupNaming::default();
        assert_eq!(naming.parse("bg_ops"), Some(("ops".into(), Some(Role::Member))));
        assert_eq!(naming.parse("bg_ops-o"), Some(("ops".into(), Some(Role::Owner))));
        assert_eq!(naming.parse("bg_ops-gk"), Some(("ops".into(), Some(Role::GateKeeper))));
        assert_eq!(naming.parse("bg_ops-aclk"), Some(("ops".into(), Some(Role::AclKeeper))));
        assert_eq!(naming.parse("bg_ops-what"), Some(("ops".into(), None)));
        assert_eq!(naming.parse("sudo"), None);
    }

    #[test]
    fn test_os_group_names() {
        let naming = GroupNaming::new("bh_");
        assert_eq!(
            naming.os_groups("db"),
            vec!["bh_db", "bh_db-aclk", "bh_db-gk", "bh_db-o"]
        );
        assert_eq!(naming.system_name("db"), "bh_db");
    }

    #[test]
    fn test_membership_roles() {
        let mut m = Membership::default();
        assert!(!m.uses_accesses());
        m.set(Role::Owner);
        assert!(m.uses_accesses());
        assert!(!m.has(Role::Member));
        m.set(Role::GateKeeper);
        assert_eq!(m.roles(), vec![Role::GateKeeper, Role::Owner]);
    }
}
