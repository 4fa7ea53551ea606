//! principal lookup and provisioning on top of [`SystemAccounts`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gatehouse_db::{AccessDb, AccessStore};
use gatehouse_grants::{AccessSet, Source};
use gatehouse_types::GeneralConfig;
use tracing::debug;

use crate::Result;
use crate::accounts::{SystemAccounts, SystemUser};
use crate::error::Error;
use crate::keys::{PublicKey, forget_known_host, list_key_pairs, render_authorized_keys};
use crate::membership::{GroupNaming, Membership, Role};
use crate::principal::{Group, Home, User};
use crate::totp::TotpState;

/// the reserved group whose owners own the bastion.
pub const OWNERS_GROUP: &str = "owners";

/// login shell of group service accounts.
pub const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

/// resolves and provisions users and groups.
#[derive(Clone)]
pub struct Directory {
    accounts: Arc<dyn SystemAccounts>,
    naming: GroupNaming,
    home_root: PathBuf,
    binary_path: PathBuf,
}

impl Directory {
    /// a directory over `accounts` laid out as `general` describes.
    pub fn new(accounts: Arc<dyn SystemAccounts>, general: &GeneralConfig) -> Self {
        Self {
            accounts,
            naming: GroupNaming::new(general.group_prefix.clone()),
            home_root: general.home_root.clone(),
            binary_path: general.binary_path.clone(),
        }
    }

    /// the group name mapping in use.
    pub fn naming(&self) -> &GroupNaming {
        &self.naming
    }

    /// the underlying account seam.
    pub fn accounts(&self) -> &Arc<dyn SystemAccounts> {
        &self.accounts
    }

    /// where a new account's home goes.
    pub fn home_of(&self, name: &str) -> PathBuf {
        self.home_root.join(name)
    }

    /// load an account with its group memberships.
    pub async fn load_user(&self, name: &str) -> Result<User> {
        let system = self
            .accounts
            .user(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("account {name}")))?;

        let mut groups: BTreeMap<String, Membership> = BTreeMap::new();
        for os_group in self.accounts.groups().await? {
            let in_group = os_group.gid == system.gid || os_group.members.iter().any(|m| m == name);
            if !in_group {
                continue;
            }
            if let Some((group, Some(role))) = self.naming.parse(&os_group.name) {
                groups.entry(group).or_default().set(role);
            }
        }

        Ok(User {
            name: system.name,
            uid: system.uid,
            home: system.home,
            groups,
        })
    }

    /// accounts managed by the bastion, i.e. whose shell is the bastion.
    pub async fn managed_users(&self) -> Result<Vec<SystemUser>> {
        let mut users: Vec<SystemUser> = self
            .accounts
            .users()
            .await?
            .into_iter()
            .filter(|u| u.shell == self.binary_path)
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    /// whether `name` is an account managed by the bastion.
    pub async fn is_managed_user(&self, name: &str) -> Result<bool> {
        Ok(self
            .accounts
            .user(name)
            .await?
            .is_some_and(|u| u.shell == self.binary_path))
    }

    /// every bastion group, sorted.
    pub async fn all_groups(&self) -> Result<Vec<String>> {
        let names: BTreeSet<String> = self
            .accounts
            .groups()
            .await?
            .into_iter()
            .filter_map(|g| match self.naming.parse(&g.name) {
                Some((group, Some(Role::Member))) => Some(group),
                _ => None,
            })
            .collect();
        Ok(names.into_iter().collect())
    }

    /// look a group up.
    pub async fn group(&self, name: &str) -> Result<Group> {
        self.find_group(name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("group {name}")))
    }

    /// look a group up, `None` when it does not exist.
    pub async fn find_group(&self, name: &str) -> Result<Option<Group>> {
        let system_name = self.naming.system_name(name);
        let exists = self
            .accounts
            .groups()
            .await?
            .iter()
            .any(|g| g.name == system_name);
        if !exists {
            return Ok(None);
        }
        let home = match self.accounts.user(&system_name).await? {
            Some(account) => account.home,
            None => self.home_of(&system_name),
        };
        Ok(Some(Group {
            name: name.to_string(),
            system_name,
            home,
        }))
    }

    /// accounts holding `role` in `group`, sorted.
    pub async fn group_members(&self, group: &str, role: Role) -> Result<Vec<String>> {
        let os_name = self.naming.os_group(group, role);
        let mut members = self
            .accounts
            .groups()
            .await?
            .into_iter()
            .find(|g| g.name == os_name)
            .map(|g| g.members)
            .unwrap_or_default();
        members.sort();
        members.dedup();
        Ok(members)
    }

    /// whether the user owns the bastion.
    pub fn is_bastion_owner(&self, user: &User) -> bool {
        user.is_root() || user.has_role(OWNERS_GROUP, Role::Owner)
    }

    /// the access sets a user draws on: personal first, then every group
    /// the user is a member or owner of.
    pub async fn access_sets(&self, user: &User) -> Result<Vec<AccessSet>> {
        let mut sets = vec![principal_access_set(user, Source::Personal).await?];
        for (name, membership) in &user.groups {
            if !membership.uses_accesses() {
                continue;
            }
            match self.find_group(name).await? {
                Some(group) => {
                    sets.push(principal_access_set(&group, Source::Group(name.clone())).await?)
                }
                None => debug!(group = %name, "skipping group without system entry"),
            }
        }
        Ok(sets)
    }

    /// create a managed account with its home skeleton and first ingress key.
    pub async fn provision_user(&self, name: &str, key: &PublicKey) -> Result<User> {
        let home = self.home_of(name);
        self.accounts
            .create_user(name, &home, &self.binary_path)
            .await?;
        self.accounts.create_dir(name, &home.join(".ssh")).await?;
        self.accounts
            .create_dir(name, &home.join(crate::principal::TTYREC_DIR))
            .await?;

        let user = self.load_user(name).await?;
        self.write_authorized_keys(&user, std::slice::from_ref(key))
            .await?;
        Ok(user)
    }

    /// archive an account and its primary group under `suffix`.
    pub async fn archive_user(&self, name: &str, suffix: &str) -> Result<()> {
        self.accounts.archive_user(name, suffix).await?;
        self.accounts.archive_group(name, suffix).await
    }

    /// create a group, its service account, its role groups and make
    /// `owner` hold every role.
    pub async fn provision_group(&self, name: &str, owner: &str) -> Result<Group> {
        let system_name = self.naming.system_name(name);
        let home = self.home_of(&system_name);

        self.accounts
            .create_user(&system_name, &home, Path::new(NOLOGIN_SHELL))
            .await?;
        for role in [Role::AclKeeper, Role::GateKeeper, Role::Owner] {
            self.accounts
                .create_group(&self.naming.os_group(name, role))
                .await?;
        }
        self.accounts
            .create_dir(&system_name, &home.join(".ssh"))
            .await?;
        for role in Role::ALL {
            self.grant_role(name, owner, role).await?;
        }
        self.group(name).await
    }

    /// archive a group, its role groups and its service account under
    /// `suffix`.
    pub async fn archive_group(&self, name: &str, suffix: &str) -> Result<()> {
        for os_group in self.naming.os_groups(name) {
            self.accounts.archive_group(&os_group, suffix).await?;
        }
        self.accounts
            .archive_user(&self.naming.system_name(name), suffix)
            .await
    }

    /// give `account` `role` in `group`.
    pub async fn grant_role(&self, group: &str, account: &str, role: Role) -> Result<()> {
        self.accounts
            .add_to_group(account, &self.naming.os_group(group, role))
            .await
    }

    /// take `role` in `group` away from `account`.
    pub async fn revoke_role(&self, group: &str, account: &str, role: Role) -> Result<()> {
        self.accounts
            .remove_from_group(account, &self.naming.os_group(group, role))
            .await
    }

    /// replace the user's ingress keys.
    pub async fn write_authorized_keys(&self, user: &User, keys: &[PublicKey]) -> Result<()> {
        self.accounts
            .write_file(
                &user.name,
                &user.authorized_keys_path(),
                &render_authorized_keys(keys),
                0o600,
            )
            .await
    }

    /// remove `host` from the user's known_hosts, returning how many
    /// entries went away.
    pub async fn forget_host_key(&self, user: &User, host: &str) -> Result<usize> {
        let path = user.known_hosts_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let (kept, removed) = forget_known_host(&content, host);
        if removed > 0 {
            self.accounts
                .write_file(&user.name, &path, &kept, 0o644)
                .await?;
        }
        Ok(removed)
    }

    /// the user's totp state, `None` when totp is disabled.
    pub async fn read_totp(&self, user: &User) -> Result<Option<TotpState>> {
        match tokio::fs::read_to_string(user.totp_path()).await {
            Ok(content) => Ok(TotpState::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// store or, with `None`, remove the user's totp state.
    pub async fn write_totp(&self, user: &User, state: Option<&TotpState>) -> Result<()> {
        match state {
            Some(state) => {
                self.accounts
                    .write_file(&user.name, &user.totp_path(), &state.render(), 0o400)
                    .await
            }
            None => self.accounts.remove_file(&user.name, &user.totp_path()).await,
        }
    }
}

/// open the access store of a principal. the file is created on demand.
pub async fn open_accesses(principal: &impl Home) -> Result<AccessDb> {
    Ok(AccessDb::open(&principal.accesses_db_path()).await?)
}

async fn principal_access_set(principal: &impl Home, source: Source) -> Result<AccessSet> {
    let path = principal.accesses_db_path();
    let accesses = if tokio::fs::try_exists(&path).await? {
        AccessDb::open(&path).await?.list_accesses().await?
    } else {
        Vec::new()
    };
    let key_paths = list_key_pairs(&principal.ssh_dir())
        .await?
        .into_iter()
        .map(|pair| pair.private_path)
        .collect();
    Ok(AccessSet {
        source,
        accesses,
        key_paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ed25519_key_line as ed25519_line;
    use crate::test_utils::MemorySystemAccounts;
    use gatehouse_types::Access;

    fn directory(root: &Path) -> (Directory, Arc<MemorySystemAccounts>) {
        let accounts = Arc::new(MemorySystemAccounts::new());
        let general = GeneralConfig {
            home_root: root.to_path_buf(),
            ..GeneralConfig::default()
        };
        (Directory::new(accounts.clone(), &general), accounts)
    }

    #[tokio::test]
    async fn test_provision_user_and_group() {
        let root = tempfile::tempdir().unwrap();
        let (dir, _) = directory(root.path());
        let key = PublicKey::parse(&ed25519_line(1, "alice")).unwrap();

        let alice = dir.provision_user("alice", &key).await.unwrap();
        assert!(alice.groups.is_empty());
        assert!(dir.is_managed_user("alice").await.unwrap());
        let written = std::fs::read_to_string(alice.authorized_keys_path()).unwrap();
        assert!(written.contains(&key.blob));

        let group = dir.provision_group("ops", "alice").await.unwrap();
        assert_eq!(group.system_name, "bg_ops");
        assert_eq!(dir.all_groups().await.unwrap(), vec!["ops"]);

        let alice = dir.load_user("alice").await.unwrap();
        assert_eq!(alice.membership("ops").roles(), Role::ALL.to_vec());
        assert_eq!(dir.group_members("ops", Role::Owner).await.unwrap(), vec!["alice"]);

        // service accounts are not managed users
        let managed: Vec<_> = dir.managed_users().await.unwrap().into_iter().map(|u| u.name).collect();
        assert_eq!(managed, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_roles_grant_and_revoke() {
        let root = tempfile::tempdir().unwrap();
        let (dir, _) = directory(root.path());
        let key = PublicKey::parse(&ed25519_line(1, "")).unwrap();
        dir.provision_user("alice", &key).await.unwrap();
        dir.provision_user("bob", &key).await.unwrap();
        dir.provision_group("ops", "alice").await.unwrap();

        dir.grant_role("ops", "bob", Role::Member).await.unwrap();
        assert!(dir.load_user("bob").await.unwrap().membership("ops").uses_accesses());

        dir.revoke_role("ops", "bob", Role::Member).await.unwrap();
        assert!(!dir.load_user("bob").await.unwrap().groups.contains_key("ops"));
    }

    #[tokio::test]
    async fn test_bastion_owner() {
        let root = tempfile::tempdir().unwrap();
        let (dir, accounts) = directory(root.path());
        let key = PublicKey::parse(&ed25519_line(1, "")).unwrap();
        dir.provision_user("alice", &key).await.unwrap();
        dir.provision_user("bob", &key).await.unwrap();
        dir.provision_group(OWNERS_GROUP, "alice").await.unwrap();
        accounts.add_root(root.path().join("root"));

        assert!(dir.is_bastion_owner(&dir.load_user("alice").await.unwrap()));
        assert!(!dir.is_bastion_owner(&dir.load_user("bob").await.unwrap()));
        assert!(dir.is_bastion_owner(&dir.load_user("root").await.unwrap()));
    }

    #[tokio::test]
    async fn test_access_sets_collect_personal_and_group() {
        let root = tempfile::tempdir().unwrap();
        let (dir, _) = directory(root.path());
        let key = PublicKey::parse(&ed25519_line(1, "")).unwrap();
        dir.provision_user("alice", &key).await.unwrap();
        dir.provision_user("bob", &key).await.unwrap();
        let ops = dir.provision_group("ops", "bob").await.unwrap();
        dir.grant_role("ops", "alice", Role::Member).await.unwrap();

        let grant = Access {
            host: "db.example.com".into(),
            user: "postgres".into(),
            port: 22,
            ..Access::default()
        };
        open_accesses(&ops).await.unwrap().insert_access(&grant).await.unwrap();
        std::fs::write(ops.ssh_dir().join("id_ed25519"), "private").unwrap();
        std::fs::write(ops.ssh_dir().join("id_ed25519.pub"), ed25519_line(9, "ops")).unwrap();

        let alice = dir.load_user("alice").await.unwrap();
        let sets = dir.access_sets(&alice).await.unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].source, Source::Personal);
        assert!(sets[0].accesses.is_empty());
        assert_eq!(sets[1].source, Source::Group("ops".into()));
        assert_eq!(sets[1].accesses.len(), 1);
        assert_eq!(sets[1].key_paths, vec![ops.ssh_dir().join("id_ed25519")]);
    }

    #[tokio::test]
    async fn test_archive_group_hides_it() {
        let root = tempfile::tempdir().unwrap();
        let (dir, _) = directory(root.path());
        let key = PublicKey::parse(&ed25519_line(1, "")).unwrap();
        dir.provision_user("alice", &key).await.unwrap();
        dir.provision_group("ops", "alice").await.unwrap();

        dir.archive_group("ops", "20260101").await.unwrap();
        assert!(dir.all_groups().await.unwrap().is_empty());
        assert!(dir.find_group("ops").await.unwrap().is_none());
        assert!(dir.load_user("alice").await.unwrap().groups.is_empty());
    }
}
