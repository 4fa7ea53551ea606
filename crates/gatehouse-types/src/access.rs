//! access type: one stored grant linking a principal to a destination.

use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// a single grant record.
///
/// uniqueness is over `(host, prefix, alias, user, port)`. records are never
/// mutated in place: a revoke deletes the row and a new grant inserts a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Access {
    /// storage identifier, empty until persisted.
    #[serde(default)]
    pub uniq_id: String,

    /// resolved hostname, empty for a pure ip range grant.
    pub host: String,

    /// canonical network prefix, `None` for alias-only or unresolved grants.
    pub prefix: Option<IpNet>,

    /// optional short name for the destination.
    pub alias: Option<String>,

    /// remote login name, empty meaning "whatever the caller supplies".
    pub user: String,

    /// remote port, 0 meaning "whatever the caller supplies".
    pub port: u16,

    /// free text audit note.
    #[serde(default)]
    pub comment: String,

    /// concrete address when host/prefix originate from a single address.
    #[serde(skip)]
    pub ip: Option<IpAddr>,
}

/// structural violations of the access invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// no host, no prefix and no alias: nothing to match against.
    #[error("an access needs at least a host, a prefix or an alias")]
    Empty,

    /// an alias would point at a range wider than one address.
    #[error("you cannot add an alias to an IP range")]
    AliasOnRange,
}

impl Access {
    /// check the structural invariants of the record.
    pub fn validate(&self) -> Result<(), AccessError> {
        if self.host.is_empty() && self.prefix.is_none() && self.alias.is_none() {
            return Err(AccessError::Empty);
        }
        if self.alias.is_some() && self.prefix.is_some_and(|net| !is_single_address(&net)) {
            return Err(AccessError::AliasOnRange);
        }
        Ok(())
    }

    /// whether the prefix denotes exactly one address (a /32 or /128).
    pub fn is_single_address(&self) -> bool {
        self.prefix.as_ref().is_some_and(is_single_address)
    }

    /// the host part to display: hostname when known, the prefix otherwise.
    pub fn display_host(&self) -> String {
        if !self.host.is_empty() {
            return self.host.clone();
        }
        match (&self.prefix, &self.alias) {
            (Some(net), _) => net.to_string(),
            (None, Some(alias)) => alias.clone(),
            (None, None) => String::new(),
        }
    }

    /// compact `user@host:port (alias)` rendering.
    pub fn short_string(&self) -> String {
        let mut out = format!("{}@{}", self.user, self.display_host());
        if self.port != 0 {
            out.push_str(&format!(":{}", self.port));
        }
        if let Some(alias) = &self.alias {
            out.push_str(&format!(" ({})", alias));
        }
        out
    }

    /// whether two records designate the same `(host, user, port)` destination.
    pub fn same_destination(&self, other: &Access) -> bool {
        self.host == other.host && self.user == other.user && self.port == other.port
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prefix: {:<20} | Host: {:<20} | Alias: {:<20} | User: {:<10} | Port: {:<5}",
            self.prefix.map(|p| p.to_string()).unwrap_or_default(),
            self.host,
            self.alias.as_deref().unwrap_or(""),
            self.user,
            self.port
        )
    }
}

fn is_single_address(net: &IpNet) -> bool {
    net.prefix_len() == net.max_prefix_len()
}
