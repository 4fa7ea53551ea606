//! the seam onto operating system accounts and groups.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::Error;
use crate::Result;

/// one `/etc/passwd` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemUser {
    /// login name.
    pub name: String,
    /// numeric user id.
    pub uid: u32,
    /// primary group id.
    pub gid: u32,
    /// home directory.
    pub home: PathBuf,
    /// login shell.
    pub shell: PathBuf,
}

/// one `/etc/group` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemGroup {
    /// os group name.
    pub name: String,
    /// numeric group id.
    pub gid: u32,
    /// supplementary members.
    pub members: Vec<String>,
}

/// read and mutate os accounts.
///
/// mutations are expressed as whole, replayable steps so an instance
/// applying a replicated payload performs exactly what the origin did.
#[async_trait]
pub trait SystemAccounts: Send + Sync {
    /// every account.
    async fn users(&self) -> Result<Vec<SystemUser>>;

    /// every os group.
    async fn groups(&self) -> Result<Vec<SystemGroup>>;

    /// look one account up by name.
    async fn user(&self, name: &str) -> Result<Option<SystemUser>> {
        Ok(self.users().await?.into_iter().find(|u| u.name == name))
    }

    /// create an account with its own primary group.
    async fn create_user(&self, name: &str, home: &Path, shell: &Path) -> Result<()>;

    /// disable an account, rename it and move its home aside under `suffix`.
    /// the account's primary group is left alone.
    async fn archive_user(&self, name: &str, suffix: &str) -> Result<()>;

    /// create an os group.
    async fn create_group(&self, name: &str) -> Result<()>;

    /// move an os group aside under `suffix`.
    async fn archive_group(&self, name: &str, suffix: &str) -> Result<()>;

    /// add an account to an os group.
    async fn add_to_group(&self, account: &str, group: &str) -> Result<()>;

    /// remove an account from an os group.
    async fn remove_from_group(&self, account: &str, group: &str) -> Result<()>;

    /// create `path` (and parents) as a directory owned by `owner`.
    async fn create_dir(&self, owner: &str, path: &Path) -> Result<()>;

    /// write `contents` to `path` as `owner` with permission `mode`.
    async fn write_file(&self, owner: &str, path: &Path, contents: &str, mode: u32) -> Result<()>;

    /// remove `path` as `owner`; a missing file is not an error.
    async fn remove_file(&self, owner: &str, path: &Path) -> Result<()>;
}

/// parse `/etc/passwd` content, skipping comments and malformed lines.
pub fn parse_passwd(content: &str) -> Vec<SystemUser> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(SystemUser {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok()?,
                gid: fields[3].parse().ok()?,
                home: PathBuf::from(fields[5]),
                shell: PathBuf::from(fields[6]),
            })
        })
        .collect()
}

/// parse `/etc/group` content, skipping comments and malformed lines.
pub fn parse_group(content: &str) -> Vec<SystemGroup> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 4 {
                return None;
            }
            Some(SystemGroup {
                name: fields[0].to_string(),
                gid: fields[2].parse().ok()?,
                members: fields[3]
                    .split(',')
                    .filter(|m| !m.is_empty())
                    .map(str::to_string)
                    .collect(),
            })
        })
        .collect()
}

/// [`SystemAccounts`] over the host's account databases and `sudo`.
#[derive(Debug, Clone)]
pub struct EtcSystemAccounts {
    passwd_path: PathBuf,
    group_path: PathBuf,
}

impl EtcSystemAccounts {
    /// read accounts from `passwd_path` and groups from `group_path`.
    pub fn new(passwd_path: impl Into<PathBuf>, group_path: impl Into<PathBuf>) -> Self {
        Self {
            passwd_path: passwd_path.into(),
            group_path: group_path.into(),
        }
    }

    async fn sudo(&self, args: &[&str]) -> Result<()> {
        self.sudo_with_input(args, None).await
    }

    async fn sudo_with_input(&self, args: &[&str], input: Option<&str>) -> Result<()> {
        let command_line = format!("sudo {}", args.join(" "));
        debug!(command = %command_line, "running system command");

        let mut child = Command::new("/usr/bin/sudo")
            .args(args)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(Error::Command {
                command: command_line,
                output: text.trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EtcSystemAccounts {
    fn default() -> Self {
        Self::new("/etc/passwd", "/etc/group")
    }
}

#[async_trait]
impl SystemAccounts for EtcSystemAccounts {
    async fn users(&self) -> Result<Vec<SystemUser>> {
        Ok(parse_passwd(&tokio::fs::read_to_string(&self.passwd_path).await?))
    }

    async fn groups(&self) -> Result<Vec<SystemGroup>> {
        Ok(parse_group(&tokio::fs::read_to_string(&self.group_path).await?))
    }

    async fn create_user(&self, name: &str, home: &Path, shell: &Path) -> Result<()> {
        let home = home.to_string_lossy();
        let shell = shell.to_string_lossy();
        self.sudo(&[
            "/usr/sbin/adduser",
            "--home",
            &home,
            "--shell",
            &shell,
            "--disabled-password",
            "--gecos",
            "",
            name,
        ])
        .await
    }

    async fn archive_user(&self, name: &str, suffix: &str) -> Result<()> {
        let archived = format!("{name}.{suffix}");
        let home = self
            .user(name)
            .await?
            .map(|u| u.home)
            .ok_or_else(|| Error::NotFound(format!("account {name}")))?;
        let archived_home = format!("{}.{}", home.display(), suffix);

        self.sudo(&["/usr/sbin/usermod", "-s", "/usr/sbin/nologin", name]).await?;
        self.sudo(&["/usr/sbin/usermod", "-l", &archived, name]).await?;
        self.sudo(&["/bin/mv", &home.to_string_lossy(), &archived_home]).await
    }

    async fn create_group(&self, name: &str) -> Result<()> {
        self.sudo(&["/usr/sbin/addgroup", name]).await
    }

    async fn archive_group(&self, name: &str, suffix: &str) -> Result<()> {
        let archived = format!("a_{name}.{suffix}");
        self.sudo(&["/usr/sbin/groupmod", "-n", &archived, name]).await
    }

    async fn add_to_group(&self, account: &str, group: &str) -> Result<()> {
        self.sudo(&["/usr/sbin/usermod", "-a", "-G", group, account]).await
    }

    async fn remove_from_group(&self, account: &str, group: &str) -> Result<()> {
        self.sudo(&["/usr/sbin/deluser", account, group]).await
    }

    async fn create_dir(&self, owner: &str, path: &Path) -> Result<()> {
        self.sudo(&["-u", owner, "/bin/mkdir", "-p", &path.to_string_lossy()]).await
    }

    async fn write_file(&self, owner: &str, path: &Path, contents: &str, mode: u32) -> Result<()> {
        let path = path.to_string_lossy();
        self.sudo_with_input(&["-u", owner, "/usr/bin/tee", &path], Some(contents))
            .await?;
        self.sudo(&["-u", owner, "/bin/chmod", &format!("{mode:o}"), &path]).await
    }

    async fn remove_file(&self, owner: &str, path: &Path) -> Result<()> {
        self.sudo(&["-u", owner, "/bin/rm", "-f", &path.to_string_lossy()]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
# a comment
alice:x:1001:1001:,,,:/home/alice:/usr/local/bin/gatehouse
bg_ops:x:1002:1002:,,,:/home/bg_ops:/usr/sbin/nologin
broken:line
";

    const GROUP: &str = "\
root:x:0:
alice:x:1001:
bg_ops:x:1002:alice,bob
bg_ops-o:x:1003:alice
";

    #[test]
    fn test_parse_passwd() {
        let users = parse_passwd(PASSWD);
        assert_eq!(users.len(), 3);
        assert_eq!(users[1].name, "alice");
        assert_eq!(users[1].uid, 1001);
        assert_eq!(users[1].home, PathBuf::from("/home/alice"));
        assert_eq!(users[1].shell, PathBuf::from("/usr/local/bin/gatehouse"));
    }

    #[test]
    fn test_parse_group() {
        let groups = parse_group(GROUP);
        assert_eq!(groups.len(), 4);
        assert!(groups[1].members.is_empty());
        assert_eq!(groups[2].members, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_etc_accounts_read_files() {
        let dir = tempfile::tempdir().unwrap();
        let passwd = dir.path().join("passwd");
        let group = dir.path().join("group");
        std::fs::write(&passwd, PASSWD).unwrap();
        std::fs::write(&group, GROUP).unwrap();

        let accounts = EtcSystemAccounts::new(&passwd, &group);
        let alice = accounts.user("alice").await.unwrap().unwrap();
        assert_eq!(alice.gid, 1001);
        assert!(accounts.user("mallory").await.unwrap().is_none());
        assert_eq!(accounts.groups().await.unwrap().len(), 4);
    }
}
