//! in-memory account data for tests.
//!
//! accounts and groups live in memory. files and directories are still
//! written to the real filesystem so homes can point at a tempdir.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::Result;
use crate::accounts::{SystemAccounts, SystemGroup, SystemUser};
use crate::error::Error;

/// a syntactically valid ed25519 public key line, distinct per `seed`.
pub fn ed25519_key_line(seed: u8, comment: &str) -> String {
    let mut blob = Vec::new();
    blob.extend_from_slice(&11u32.to_be_bytes());
    blob.extend_from_slice(b"ssh-ed25519");
    blob.extend_from_slice(&32u32.to_be_bytes());
    blob.extend_from_slice(&[seed; 32]);
    format!("ssh-ed25519 {} {}", STANDARD.encode(blob), comment)
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<SystemUser>,
    groups: Vec<SystemGroup>,
    next_id: u32,
}

impl Inner {
    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        1000 + self.next_id
    }

    fn group_mut(&mut self, name: &str) -> Result<&mut SystemGroup> {
        self.groups
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| Error::NotFound(format!("os group {name}")))
    }
}

/// [`SystemAccounts`] backed by in-memory passwd and group tables.
#[derive(Debug, Default)]
pub struct MemorySystemAccounts {
    inner: Mutex<Inner>,
}

impl MemorySystemAccounts {
    /// empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// add the superuser with `home`.
    pub fn add_root(&self, home: PathBuf) {
        let mut inner = self.lock();
        inner.users.push(SystemUser {
            name: "root".into(),
            uid: 0,
            gid: 0,
            home,
            shell: PathBuf::from("/bin/bash"),
        });
        inner.groups.push(SystemGroup {
            name: "root".into(),
            gid: 0,
            members: Vec::new(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SystemAccounts for MemorySystemAccounts {
    async fn users(&self) -> Result<Vec<SystemUser>> {
        Ok(self.lock().users.clone())
    }

    async fn groups(&self) -> Result<Vec<SystemGroup>> {
        Ok(self.lock().groups.clone())
    }

    async fn create_user(&self, name: &str, home: &Path, shell: &Path) -> Result<()> {
        {
            let mut inner = self.lock();
            if inner.users.iter().any(|u| u.name == name) {
                return Err(Error::AlreadyExists(format!("account {name}")));
            }
            let id = inner.allocate_id();
            inner.users.push(SystemUser {
                name: name.to_string(),
                uid: id,
                gid: id,
                home: home.to_path_buf(),
                shell: shell.to_path_buf(),
            });
            inner.groups.push(SystemGroup {
                name: name.to_string(),
                gid: id,
                members: Vec::new(),
            });
        }
        tokio::fs::create_dir_all(home).await?;
        Ok(())
    }

    async fn archive_user(&self, name: &str, suffix: &str) -> Result<()> {
        let (from, to) = {
            let mut inner = self.lock();
            let user = inner
                .users
                .iter_mut()
                .find(|u| u.name == name)
                .ok_or_else(|| Error::NotFound(format!("account {name}")))?;
            let from = user.home.clone();
            let to = PathBuf::from(format!("{}.{}", from.display(), suffix));
            user.name = format!("{name}.{suffix}");
            user.shell = PathBuf::from("/usr/sbin/nologin");
            user.home = to.clone();
            (from, to)
        };
        if tokio::fs::try_exists(&from).await? {
            tokio::fs::rename(&from, &to).await?;
        }
        Ok(())
    }

    async fn create_group(&self, name: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.groups.iter().any(|g| g.name == name) {
            return Err(Error::AlreadyExists(format!("os group {name}")));
        }
        let gid = inner.allocate_id();
        inner.groups.push(SystemGroup {
            name: name.to_string(),
            gid,
            members: Vec::new(),
        });
        Ok(())
    }

    async fn archive_group(&self, name: &str, suffix: &str) -> Result<()> {
        let mut inner = self.lock();
        let group = inner.group_mut(name)?;
        group.name = format!("a_{name}.{suffix}");
        Ok(())
    }

    async fn add_to_group(&self, account: &str, group: &str) -> Result<()> {
        let mut inner = self.lock();
        let group = inner.group_mut(group)?;
        if !group.members.iter().any(|m| m == account) {
            group.members.push(account.to_string());
        }
        Ok(())
    }

    async fn remove_from_group(&self, account: &str, group: &str) -> Result<()> {
        let mut inner = self.lock();
        let group = inner.group_mut(group)?;
        group.members.retain(|m| m != account);
        Ok(())
    }

    async fn create_dir(&self, _owner: &str, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn write_file(&self, _owner: &str, path: &Path, contents: &str, _mode: u32) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    async fn remove_file(&self, _owner: &str, path: &Path) -> Result<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
