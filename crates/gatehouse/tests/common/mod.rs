//! shared fixtures for dispatcher and daemon tests

#![allow(dead_code)] // not every test file uses every helper

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gatehouse::{Bastion, Dispatcher, NoPrompt, Registry, Response, SessionLauncher, SessionRequest};
use gatehouse_grants::StaticResolver;
use gatehouse_replication::LocalStorage;
use gatehouse_state::test_utils::{MemorySystemAccounts, ed25519_key_line};
use gatehouse_state::{PublicKey, User};
use gatehouse_types::{Config, StorageConfig};
use secrecy::SecretString;
use tempfile::TempDir;

/// content every fake session writes to its recording.
pub const RECORDING: &[u8] = b"\x1b[1mwelcome to db1\x1b[0m\r\n$ exit\r\n";

/// shared replication key of the sibling fixtures.
pub const SHARED_KEY: &str = "0123456789abcdef";

/// a launcher that records requests and writes a fake recording.
#[derive(Default)]
pub struct FakeLauncher {
    pub requests: Mutex<Vec<SessionRequest>>,
}

impl FakeLauncher {
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    async fn launch(&self, request: &SessionRequest) -> gatehouse::Result<i32> {
        tokio::fs::write(&request.recording, RECORDING).await?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(0)
    }
}

/// resolver knowing the documentation hosts used across the tests.
pub fn resolver() -> StaticResolver {
    let ip = |s: &str| s.parse::<IpAddr>().unwrap();
    StaticResolver::new()
        .with_host("example.com", &[ip("93.184.216.34")])
        .with_host("test.com", &[ip("198.51.100.20")])
        .with_host("db1.example.net", &[ip("192.0.2.10")])
}

/// a config whose paths all live under `dir`.
pub fn config_in(dir: &TempDir, instance: &str) -> Config {
    let mut config = Config::default();
    config.general.instance = instance.to_string();
    config.general.home_root = dir.path().join("home");
    config.general.data_dir = dir.path().join("data");
    config.offloading.storage = StorageConfig::Local {
        path: dir.path().join("offload"),
    };
    config
}

/// a config for an instance taking part in replication.
pub fn replicated_config(dir: &TempDir, instance: &str, key: &str) -> Config {
    let mut config = config_in(dir, instance);
    config.general.encryption_key = SecretString::from(key.to_string());
    config.replication.enabled = true;
    config.replication.retry_delay_secs = 1;
    config
}

/// one bastion instance over in-memory accounts and a temp home root.
pub struct TestBastion {
    pub dir: TempDir,
    pub accounts: Arc<MemorySystemAccounts>,
    pub launcher: Arc<FakeLauncher>,
    pub bastion: Arc<Bastion>,
    pub registry: Arc<Registry>,
}

impl TestBastion {
    /// a standalone instance with default settings.
    pub async fn new() -> Self {
        Self::with_config(|dir| config_in(dir, "bastion-test")).await
    }

    /// an instance whose config is built from its temp directory.
    pub async fn with_config(make: impl FnOnce(&TempDir) -> Config) -> Self {
        Self::with_registry(make, Registry::with_builtins()).await
    }

    /// an instance with a custom operation table.
    pub async fn with_registry(make: impl FnOnce(&TempDir) -> Config, registry: Registry) -> Self {
        let dir = TempDir::new().unwrap();
        let config = make(&dir);

        let accounts = Arc::new(MemorySystemAccounts::new());
        let root_home = dir.path().join("root");
        std::fs::create_dir_all(&root_home).unwrap();
        accounts.add_root(root_home);

        let launcher = Arc::new(FakeLauncher::default());
        let storage = match &config.offloading.storage {
            StorageConfig::Local { path } => LocalStorage::new(path.clone()),
        };
        let bastion = Bastion::builder(config)
            .accounts(accounts.clone())
            .resolver(Arc::new(resolver()))
            .storage(Arc::new(storage))
            .launcher(launcher.clone())
            .in_memory()
            .await
            .unwrap();

        Self {
            dir,
            accounts,
            launcher,
            bastion: Arc::new(bastion),
            registry: Arc::new(registry),
        }
    }

    /// provision a managed account with one ingress key.
    pub async fn add_user(&self, name: &str) -> User {
        let seed = name.bytes().fold(0u8, |acc, b| acc.wrapping_add(b));
        let key = PublicKey::parse(&ed25519_key_line(seed, name)).unwrap();
        self.bastion
            .directory()
            .provision_user(name, &key)
            .await
            .unwrap()
    }

    /// the current state of an account.
    pub async fn user(&self, name: &str) -> User {
        self.bastion.directory().load_user(name).await.unwrap()
    }

    /// run a command line as `account`.
    pub async fn run(&self, account: &str, line: &str) -> gatehouse::Result<Response> {
        self.dispatcher().dispatch(account, &words(line), None).await
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.bastion.clone(), self.registry.clone(), Arc::new(NoPrompt))
    }

    pub fn home(&self, name: &str) -> PathBuf {
        self.dir.path().join("home").join(name)
    }
}

/// split a command line on whitespace.
pub fn words(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}
