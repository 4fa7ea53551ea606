//! the replication daemon: forwarder and consumer loops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_replication::{EntryHandler, IdempotencyCache, QueueTransport, decode_log};
use gatehouse_types::ReplicationEntry;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::context::Bastion;
use crate::error::Error;
use crate::registry::Registry;

/// how long the forwarder sleeps when the outbox is empty.
const IDLE_POLL: Duration = Duration::from_secs(1);

/// what one forwarder step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStep {
    /// the outbox was empty.
    Idle,
    /// the head entry was processed and removed.
    Forwarded,
}

/// owns the forwarder and consumer loops of one instance.
pub struct Daemon {
    bastion: Arc<Bastion>,
    registry: Arc<Registry>,
    queue: Arc<dyn QueueTransport>,
    cache: IdempotencyCache,
    retry_delay: Duration,
}

impl Daemon {
    /// a daemon pushing to and consuming from `queue`.
    pub fn new(bastion: Arc<Bastion>, registry: Arc<Registry>, queue: Arc<dyn QueueTransport>) -> Self {
        let replication = &bastion.config().replication;
        let cache = IdempotencyCache::new(Duration::from_secs(replication.dedup_ttl_secs));
        let retry_delay = Duration::from_secs(replication.retry_delay_secs);
        Self {
            bastion,
            registry,
            queue,
            cache,
            retry_delay,
        }
    }

    /// override the fixed retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// the consumer-side dedup cache.
    pub fn cache(&self) -> &IdempotencyCache {
        &self.cache
    }

    /// run until the process is stopped.
    ///
    /// the forwarder runs whenever replication or off-loading is on, the
    /// consumer only with replication.
    pub async fn run(&self) -> Result<()> {
        let config = self.bastion.config();
        if !config.daemon_enabled() {
            info!("replication and off-loading are disabled, nothing to do");
            return Ok(());
        }
        info!(
            instance = %self.bastion.instance(),
            replication = config.replication.enabled,
            offloading = config.offloading.enabled,
            "starting replication daemon"
        );

        if config.replication.enabled {
            let consumer = self.consumer();
            let queue = self.queue.clone();
            tokio::try_join!(self.run_forwarder(), async move {
                queue.consume(consumer).await.map_err(Error::from)
            })?;
        } else {
            self.run_forwarder().await?;
        }
        Ok(())
    }

    /// drain the outbox forever, retrying the head after a fixed delay.
    pub async fn run_forwarder(&self) -> Result<()> {
        loop {
            match self.forward_once().await {
                Ok(ForwardStep::Forwarded) => {}
                Ok(ForwardStep::Idle) => tokio::time::sleep(IDLE_POLL).await,
                Err(e) => {
                    warn!(error = %e, delay = ?self.retry_delay, "forwarding failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// process the head of the outbox once.
    ///
    /// the post-execute hook runs first, then the queue push; the entry is
    /// removed only when both succeeded.
    pub async fn forward_once(&self) -> Result<ForwardStep> {
        let outbox = self.bastion.outbox();
        let Some(entry) = outbox.next().await? else {
            return Ok(ForwardStep::Idle);
        };

        if !entry.is_log() {
            let operation = self
                .registry
                .get(&entry.action)
                .ok_or_else(|| Error::UnknownOperation(entry.action.clone()))?;
            let payload = self.bastion.cipher().decrypt_payload(&entry.data)?;
            operation.post_execute(&self.bastion, &payload).await?;
        }

        if self.bastion.config().replication.enabled {
            self.queue.push(&entry).await?;
        }
        outbox.remove(entry.uniq_id).await?;
        debug!(action = %entry.action, id = %entry.uniq_id, "forwarded entry");
        Ok(ForwardStep::Forwarded)
    }

    /// the handler siblings' entries are delivered to.
    pub fn consumer(&self) -> Arc<Consumer> {
        Arc::new(Consumer {
            bastion: self.bastion.clone(),
            registry: self.registry.clone(),
            cache: self.cache.clone(),
        })
    }
}

/// applies entries produced by sibling instances.
pub struct Consumer {
    bastion: Arc<Bastion>,
    registry: Arc<Registry>,
    cache: IdempotencyCache,
}

impl Consumer {
    async fn apply(&self, entry: &ReplicationEntry) -> Result<()> {
        let payload = self.bastion.cipher().decrypt_payload(&entry.data)?;

        if entry.is_log() {
            let log = decode_log(&payload)?;
            let user = self
                .bastion
                .directory()
                .load_user(&log.local_username)
                .await
                .ok();
            return self.bastion.save_log(user.as_ref(), &log).await;
        }

        let operation = self
            .registry
            .get(&entry.action)
            .ok_or_else(|| Error::UnknownOperation(entry.action.clone()))?;
        operation.replicate(&self.bastion, &payload).await
    }
}

#[async_trait]
impl EntryHandler for Consumer {
    async fn handle(&self, entry: ReplicationEntry) -> gatehouse_replication::Result<()> {
        let Some(claim) = self.cache.try_claim(entry.uniq_id) else {
            debug!(action = %entry.action, id = %entry.uniq_id, "discarding duplicate entry");
            return Ok(());
        };

        if entry.instance == self.bastion.instance() {
            debug!(action = %entry.action, id = %entry.uniq_id, "skipping own entry");
            claim.commit();
            return Ok(());
        }

        match self.apply(&entry).await {
            Ok(()) => {
                info!(action = %entry.action, id = %entry.uniq_id, origin = %entry.instance, "applied entry");
                claim.commit();
                Ok(())
            }
            Err(Error::Crypto(reason)) => {
                error!(action = %entry.action, id = %entry.uniq_id, %reason, "dropping unreadable entry");
                claim.commit();
                Ok(())
            }
            Err(e) => {
                error!(action = %entry.action, id = %entry.uniq_id, error = %e, "failed to apply entry");
                Err(gatehouse_replication::Error::Transport(e.to_string()))
            }
        }
    }
}
