//! configuration types for gatehouse

use std::path::PathBuf;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// main configuration for gatehouse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// general settings.
    pub general: GeneralConfig,

    /// replication transport settings.
    pub replication: ReplicationConfig,

    /// session recording off-load settings.
    pub offloading: OffloadingConfig,

    /// access resolution policy.
    pub access: AccessConfig,
}

impl Config {
    /// check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), Error> {
        let key_len = self.general.encryption_key.expose_secret().len();
        if key_len != 0 && ![8, 16, 24, 32].contains(&key_len) {
            return Err(Error::Config(format!(
                "encryption_key must be 8, 16, 24 or 32 bytes long, got {key_len}"
            )));
        }
        if self.general.instance.is_empty() {
            return Err(Error::Config("general.instance must not be empty".into()));
        }
        if self.general.group_prefix.is_empty() {
            return Err(Error::Config("general.group_prefix must not be empty".into()));
        }
        if self.replication.retry_delay_secs == 0 {
            return Err(Error::Config(
                "replication.retry_delay_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// whether the replication daemon has anything to do.
    pub fn daemon_enabled(&self) -> bool {
        self.replication.enabled || self.offloading.enabled
    }

    /// path of the instance-wide journal holding the outbox.
    pub fn journal_path(&self) -> PathBuf {
        self.general.data_dir.join("replication.db")
    }

    /// path of the instance-wide session log store.
    pub fn global_logs_path(&self) -> PathBuf {
        self.general.data_dir.join("logs.db")
    }
}

/// general settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// display name of the bastion.
    pub name: String,

    /// identity of this instance in replication entries.
    pub instance: String,

    /// login shell installed for managed accounts.
    pub binary_path: PathBuf,

    /// parent directory of account and group homes.
    pub home_root: PathBuf,

    /// instance-wide data directory.
    pub data_dir: PathBuf,

    /// prefix distinguishing managed os groups.
    pub group_prefix: String,

    /// passwd database to read accounts from.
    pub etc_passwd_path: PathBuf,

    /// group database to read groups from.
    pub etc_group_path: PathBuf,

    /// shared symmetric key for replication payloads and recordings.
    /// empty disables encryption.
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub encryption_key: SecretString,

    /// default log level.
    pub log_level: String,

    /// operations an administrator switched off on this instance.
    pub disabled_operations: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: "gatehouse".to_string(),
            instance: "localhost".to_string(),
            binary_path: PathBuf::from("/usr/local/bin/gatehouse"),
            home_root: PathBuf::from("/home"),
            data_dir: PathBuf::from("/home/gatehouse"),
            group_prefix: "bg_".to_string(),
            etc_passwd_path: PathBuf::from("/etc/passwd"),
            etc_group_path: PathBuf::from("/etc/group"),
            encryption_key: SecretString::from(String::new()),
            log_level: "info".to_string(),
            disabled_operations: Vec::new(),
        }
    }
}

/// replication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// push mutations to sibling instances.
    pub enabled: bool,

    /// queue transport.
    pub queue: QueueConfig,

    /// fixed delay before retrying the head of the outbox.
    pub retry_delay_secs: u64,

    /// how long a consumed entry id is remembered.
    pub dedup_ttl_secs: u64,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            queue: QueueConfig::default(),
            retry_delay_secs: 5,
            dedup_ttl_secs: 300,
        }
    }
}

/// queue transport selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QueueConfig {
    /// in-process broadcast queue, for single host setups and tests.
    #[default]
    Memory,
}

/// session recording off-load settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadingConfig {
    /// push recordings to blob storage after a session ends.
    pub enabled: bool,

    /// blob storage backend.
    pub storage: StorageConfig,
}

/// blob storage selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// a directory on the local filesystem.
    Local {
        /// root directory for stored blobs.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            path: PathBuf::from("/home/gatehouse/offload"),
        }
    }
}

/// access resolution settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// what to do when a request matches several distinct destinations.
    pub ambiguity: AmbiguityPolicy,
}

/// policy for requests that match several distinct destinations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// fail with an ambiguity error listing the candidates.
    #[default]
    Reject,
    /// ask the caller to pick one of the candidates.
    Prompt,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::from(raw))
}
