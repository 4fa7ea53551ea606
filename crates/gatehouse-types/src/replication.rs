//! replication envelope and the flat payload captured from a mutation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// action name of a session log update.
pub const LOG_ACTION: &str = "log";

/// action name of a freshly opened session log.
pub const NEW_LOG_ACTION: &str = "new-log";

/// the minimal facts needed to redo a mutation on another instance.
///
/// keys are ordered so the json encoding is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicationData(BTreeMap<String, String>);

impl ReplicationData {
    /// an empty payload, produced by read-only operations.
    pub fn new() -> Self {
        Self::default()
    }

    /// builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// set a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// look up a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// look up a field that the replay cannot do without.
    pub fn require(&self, key: &str) -> Result<&str, Error> {
        self.get(key).ok_or_else(|| Error::MissingField(key.to_string()))
    }

    /// look up a numeric field; a missing or empty value reads as zero.
    pub fn port(&self, key: &str) -> Result<u16, Error> {
        match self.get(key) {
            None | Some("") => Ok(0),
            Some(raw) => raw.parse().map_err(|_| Error::InvalidField {
                field: key.to_string(),
                reason: format!("{raw:?} is not a port number"),
            }),
        }
    }

    /// whether the payload carries nothing to replay.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// iterate over the fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ReplicationData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// the durable, uniquely identified envelope around an encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationEntry {
    /// globally unique id assigned at creation.
    pub uniq_id: Uuid,

    /// when the mutation happened on the origin.
    pub creation_date: DateTime<Utc>,

    /// identity of the origin instance.
    pub instance: String,

    /// name of the operation to replay.
    pub action: String,

    /// `base64(nonce || seal(json(payload)))`, or `base64(json(payload))` without a key.
    pub data: String,
}

impl ReplicationEntry {
    /// wrap an already encoded payload in a fresh envelope.
    pub fn new(instance: impl Into<String>, action: impl Into<String>, data: String) -> Self {
        Self {
            uniq_id: Uuid::new_v4(),
            creation_date: Utc::now(),
            instance: instance.into(),
            action: action.into(),
            data,
        }
    }

    /// whether this entry carries a session log rather than an operation.
    pub fn is_log(&self) -> bool {
        self.action == LOG_ACTION || self.action == NEW_LOG_ACTION
    }
}
