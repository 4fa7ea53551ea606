//! the queue transport contract and the in-process queue.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gatehouse_types::{QueueConfig, ReplicationEntry};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::Result;
use crate::error::Error;

/// handles one delivered entry. returning `Ok` acknowledges it.
#[async_trait]
pub trait EntryHandler: Send + Sync {
    /// process a delivered entry.
    async fn handle(&self, entry: ReplicationEntry) -> Result<()>;
}

/// pushes entries to sibling instances and delivers theirs.
///
/// delivery is at-least-once: an entry whose handler fails is delivered
/// again later.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// publish an entry to every subscribed instance.
    async fn push(&self, entry: &ReplicationEntry) -> Result<()>;

    /// deliver entries to `handler` until the transport closes.
    async fn consume(&self, handler: Arc<dyn EntryHandler>) -> Result<()>;
}

/// build the transport named in the configuration.
pub fn queue_from_config(config: &QueueConfig) -> Arc<dyn QueueTransport> {
    match config {
        QueueConfig::Memory => Arc::new(MemoryQueue::new()),
    }
}

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<ReplicationEntry>>>>;

/// in-process broadcast queue.
///
/// every handle [`join`](MemoryQueue::join)ed to the same queue receives
/// every pushed entry, its own pushes included.
pub struct MemoryQueue {
    subscribers: Subscribers,
    sender: mpsc::UnboundedSender<ReplicationEntry>,
    receiver: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<ReplicationEntry>>>,
    redelivery_delay: Duration,
}

impl MemoryQueue {
    /// a fresh queue with a single subscriber.
    pub fn new() -> Self {
        Self::subscribe(Arc::new(Mutex::new(Vec::new())))
    }

    /// another subscriber on the same queue.
    pub fn join(&self) -> Self {
        let mut joined = Self::subscribe(self.subscribers.clone());
        joined.redelivery_delay = self.redelivery_delay;
        joined
    }

    /// wait `delay` before redelivering a rejected entry.
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }

    fn subscribe(subscribers: Subscribers) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sender.clone());
        Self {
            subscribers,
            sender,
            receiver: tokio::sync::Mutex::new(Some(receiver)),
            redelivery_delay: Duration::from_secs(1),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueTransport for MemoryQueue {
    async fn push(&self, entry: &ReplicationEntry) -> Result<()> {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|s| !s.is_closed());
        for subscriber in subscribers.iter() {
            subscriber
                .send(entry.clone())
                .map_err(|e| Error::Transport(e.to_string()))?;
        }
        Ok(())
    }

    async fn consume(&self, handler: Arc<dyn EntryHandler>) -> Result<()> {
        let mut receiver = self
            .receiver
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Transport("queue is already being consumed".to_string()))?;

        while let Some(entry) = receiver.recv().await {
            let id = entry.uniq_id;
            let handler = handler.clone();
            let sender = self.sender.clone();
            let delay = self.redelivery_delay;
            tokio::spawn(async move {
                if let Err(e) = handler.handle(entry.clone()).await {
                    warn!(%id, error = %e, "entry not acknowledged, redelivering");
                    tokio::time::sleep(delay).await;
                    if sender.send(entry).is_err() {
                        debug!(%id, "queue closed before redelivery");
                    }
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
        done: mpsc::UnboundedSender<ReplicationEntry>,
    }

    #[async_trait]
    impl EntryHandler for Flaky {
        async fn handle(&self, entry: ReplicationEntry) -> Result<()> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::Transport("first delivery fails".into()));
            }
            let _ = self.done.send(entry);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_push_reaches_every_subscriber() {
        let a = MemoryQueue::new();
        let b = a.join();
        let entry = ReplicationEntry::new("a", "group create", String::new());
        a.push(&entry).await.unwrap();

        for queue in [&a, &b] {
            let mut receiver = queue.receiver.lock().await.take().unwrap();
            assert_eq!(receiver.recv().await.unwrap().uniq_id, entry.uniq_id);
        }
    }

    #[tokio::test]
    async fn test_failed_handler_gets_redelivery() {
        let queue = Arc::new(MemoryQueue::new().with_redelivery_delay(Duration::from_millis(10)));
        let (done, mut delivered) = mpsc::unbounded_channel();
        let handler = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            done,
        });

        let consumer = queue.clone();
        tokio::spawn(async move { consumer.consume(handler).await });

        let entry = ReplicationEntry::new("a", "account create", String::new());
        queue.push(&entry).await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(5), delivered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.uniq_id, entry.uniq_id);
    }

    #[tokio::test]
    async fn test_single_consumer() {
        let queue = Arc::new(MemoryQueue::new());
        queue.receiver.lock().await.take();
        let (done, _rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            done,
        });
        assert!(matches!(queue.consume(handler).await, Err(Error::Transport(_))));
    }
}
