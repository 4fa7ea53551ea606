//! the shared handles every operation and the daemon work with.

use std::sync::Arc;

use gatehouse_db::{LogDb, LogStore, OutboxDb};
use gatehouse_grants::{AccessEngine, HostResolver, SystemResolver};
use gatehouse_replication::{
    BlobStorage, Outbox, PayloadCipher, storage_from_config,
};
use gatehouse_state::{Directory, EtcSystemAccounts, SystemAccounts, User};
use gatehouse_types::{Config, SessionLog};
use tracing::warn;

use crate::Result;
use crate::session::{SessionLauncher, SshLauncher};

/// one bastion instance: configuration plus every store and seam.
pub struct Bastion {
    config: Config,
    directory: Directory,
    engine: AccessEngine,
    outbox: Outbox,
    logs: LogDb,
    storage: Arc<dyn BlobStorage>,
    launcher: Arc<dyn SessionLauncher>,
}

impl Bastion {
    /// start building an instance for `config`.
    pub fn builder(config: Config) -> BastionBuilder {
        BastionBuilder {
            config,
            accounts: None,
            resolver: None,
            storage: None,
            launcher: None,
        }
    }

    /// the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// this instance's replication identity.
    pub fn instance(&self) -> &str {
        &self.config.general.instance
    }

    /// users and groups.
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// access resolution.
    pub fn engine(&self) -> &AccessEngine {
        &self.engine
    }

    /// the replication outbox.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// the shared payload and recording cipher.
    pub fn cipher(&self) -> &PayloadCipher {
        self.outbox.cipher()
    }

    /// the instance-wide session log store.
    pub fn logs(&self) -> &LogDb {
        &self.logs
    }

    /// off-load storage for session recordings.
    pub fn storage(&self) -> &Arc<dyn BlobStorage> {
        &self.storage
    }

    /// remote session launcher.
    pub fn launcher(&self) -> &Arc<dyn SessionLauncher> {
        &self.launcher
    }

    /// write a session log to the instance-wide store and the account's
    /// own store. the account copy is best effort.
    pub async fn save_log(&self, user: Option<&User>, log: &SessionLog) -> Result<()> {
        self.logs.save_log(log).await?;
        if let Some(user) = user {
            let saved = match LogDb::open(&user.logs_db_path()).await {
                Ok(db) => db.save_log(log).await,
                Err(e) => Err(e),
            };
            if let Err(e) = saved {
                warn!(account = %user.name, error = %e, "could not write account session log");
            }
        }
        Ok(())
    }
}

/// assembles a [`Bastion`], defaulting every seam to the real system.
pub struct BastionBuilder {
    config: Config,
    accounts: Option<Arc<dyn SystemAccounts>>,
    resolver: Option<Arc<dyn HostResolver>>,
    storage: Option<Arc<dyn BlobStorage>>,
    launcher: Option<Arc<dyn SessionLauncher>>,
}

impl BastionBuilder {
    /// use `accounts` instead of the passwd and group files.
    pub fn accounts(mut self, accounts: Arc<dyn SystemAccounts>) -> Self {
        self.accounts = Some(accounts);
        self
    }

    /// use `resolver` instead of the system resolver.
    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// use `storage` instead of the configured blob storage.
    pub fn storage(mut self, storage: Arc<dyn BlobStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// use `launcher` instead of the ssh client.
    pub fn launcher(mut self, launcher: Arc<dyn SessionLauncher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// open the journal and log store under the configured data directory.
    pub async fn open(self) -> Result<Bastion> {
        let outbox = OutboxDb::open(&self.config.journal_path()).await?;
        let logs = LogDb::open(&self.config.global_logs_path()).await?;
        self.finish(outbox, logs)
    }

    /// keep the journal and log store in memory.
    pub async fn in_memory(self) -> Result<Bastion> {
        let outbox = OutboxDb::new_in_memory().await?;
        let logs = LogDb::new_in_memory().await?;
        self.finish(outbox, logs)
    }

    fn finish(self, outbox: OutboxDb, logs: LogDb) -> Result<Bastion> {
        self.config.validate()?;
        let general = &self.config.general;

        let accounts = self.accounts.unwrap_or_else(|| {
            Arc::new(EtcSystemAccounts::new(
                &general.etc_passwd_path,
                &general.etc_group_path,
            ))
        });
        let resolver = self.resolver.unwrap_or_else(|| Arc::new(SystemResolver));
        let storage = self
            .storage
            .unwrap_or_else(|| storage_from_config(&self.config.offloading.storage));
        let launcher = self
            .launcher
            .unwrap_or_else(|| Arc::new(SshLauncher::default()));
        let cipher = PayloadCipher::from_secret(&general.encryption_key)?;

        Ok(Bastion {
            directory: Directory::new(accounts, general),
            engine: AccessEngine::new(resolver),
            outbox: Outbox::new(outbox, cipher, general.instance.clone()),
            logs,
            storage,
            launcher,
            config: self.config,
        })
    }
}
