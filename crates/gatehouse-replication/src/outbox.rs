//! capture side of replication: framing payloads into queued entries.

use gatehouse_db::{OutboxDb, OutboxStore};
use gatehouse_types::{LOG_ACTION, NEW_LOG_ACTION, ReplicationData, ReplicationEntry, SessionLog};
use tracing::debug;
use uuid::Uuid;

use crate::Result;
use crate::cipher::PayloadCipher;
use crate::error::Error;

/// payload key carrying a serialized session log.
pub const LOG_FIELD: &str = "log";

/// the local outbox of one instance.
#[derive(Debug)]
pub struct Outbox {
    db: OutboxDb,
    cipher: PayloadCipher,
    instance: String,
}

impl Outbox {
    /// an outbox stamping entries with `instance` and sealing with `cipher`.
    pub fn new(db: OutboxDb, cipher: PayloadCipher, instance: impl Into<String>) -> Self {
        Self {
            db,
            cipher,
            instance: instance.into(),
        }
    }

    /// the identity stamped on produced entries.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// the payload cipher.
    pub fn cipher(&self) -> &PayloadCipher {
        &self.cipher
    }

    /// frame `data` as an `action` entry and append it.
    pub async fn enqueue(&self, action: &str, data: &ReplicationData) -> Result<ReplicationEntry> {
        let entry = ReplicationEntry::new(
            self.instance.clone(),
            action,
            self.cipher.encrypt_payload(data)?,
        );
        self.db.push_entry(&entry).await?;
        debug!(action, id = %entry.uniq_id, "queued replication entry");
        Ok(entry)
    }

    /// append a session log, as `new-log` when it was just opened.
    pub async fn enqueue_log(&self, log: &SessionLog, is_new: bool) -> Result<ReplicationEntry> {
        let action = if is_new { NEW_LOG_ACTION } else { LOG_ACTION };
        let data = ReplicationData::new().with(LOG_FIELD, serde_json::to_string(log)?);
        self.enqueue(action, &data).await
    }

    /// the oldest queued entry.
    pub async fn next(&self) -> Result<Option<ReplicationEntry>> {
        Ok(self.db.next_entry().await?)
    }

    /// drop a forwarded entry.
    pub async fn remove(&self, id: Uuid) -> Result<()> {
        Ok(self.db.remove_entry(id).await?)
    }

    /// number of queued entries.
    pub async fn len(&self) -> Result<u64> {
        Ok(self.db.count_entries().await?)
    }
}

/// read the session log out of a `log`/`new-log` payload.
pub fn decode_log(data: &ReplicationData) -> Result<SessionLog> {
    let raw = data
        .require(LOG_FIELD)
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn outbox() -> Outbox {
        let db = OutboxDb::new_in_memory().await.unwrap();
        Outbox::new(db, PayloadCipher::new(b"01234567").unwrap(), "bastion-a")
    }

    #[tokio::test]
    async fn test_enqueue_frames_payload() {
        let outbox = outbox().await;
        let data = ReplicationData::new().with("group", "ops");
        let entry = outbox.enqueue("group create", &data).await.unwrap();

        assert_eq!(entry.instance, "bastion-a");
        assert!(PayloadCipher::disabled().decrypt_payload(&entry.data).is_err());
        assert_eq!(outbox.cipher().decrypt_payload(&entry.data).unwrap(), data);

        let head = outbox.next().await.unwrap().unwrap();
        assert_eq!(head.uniq_id, entry.uniq_id);
        outbox.remove(entry.uniq_id).await.unwrap();
        assert_eq!(outbox.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_log_entries() {
        let outbox = outbox().await;
        let log = SessionLog::open("alice", &["info".to_string()], None);

        let opened = outbox.enqueue_log(&log, true).await.unwrap();
        assert_eq!(opened.action, NEW_LOG_ACTION);
        let updated = outbox.enqueue_log(&log, false).await.unwrap();
        assert_eq!(updated.action, LOG_ACTION);
        assert!(updated.is_log());

        let data = outbox.cipher().decrypt_payload(&updated.data).unwrap();
        assert_eq!(decode_log(&data).unwrap().uniq_id, log.uniq_id);
        assert!(decode_log(&ReplicationData::new()).is_err());
    }
}
