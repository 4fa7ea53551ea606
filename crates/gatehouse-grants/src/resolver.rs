//! host name resolution seam.

use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use tokio::net::lookup_host;

/// forward and reverse name resolution.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// resolve a hostname to every address it carries.
    async fn lookup_ip(&self, host: &str) -> io::Result<Vec<IpAddr>>;

    /// find a display name for an address.
    async fn lookup_addr(&self, ip: IpAddr) -> io::Result<String>;
}

/// resolver backed by the operating system's resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn lookup_ip(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in lookup_host(format!("{host}:0")).await? {
            if !ips.contains(&addr.ip()) {
                ips.push(addr.ip());
            }
        }
        if ips.is_empty() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no address for host"));
        }
        Ok(ips)
    }

    async fn lookup_addr(&self, ip: IpAddr) -> io::Result<String> {
        let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip))
            .await
            .map_err(io::Error::other)??;
        Ok(name.trim_end_matches('.').to_string())
    }
}

/// resolver answering from a fixed table, for hosts without dns and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    forward: HashMap<String, Vec<IpAddr>>,
    reverse: HashMap<IpAddr, String>,
}

impl StaticResolver {
    /// an empty table: every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// register `host` with `ips`; the first address also answers reverse lookups.
    pub fn with_host(mut self, host: &str, ips: &[IpAddr]) -> Self {
        if let Some(first) = ips.first() {
            self.reverse.entry(*first).or_insert_with(|| host.to_string());
        }
        self.forward.insert(host.to_string(), ips.to_vec());
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn lookup_ip(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.forward
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {host}")))
    }

    async fn lookup_addr(&self, ip: IpAddr) -> io::Result<String> {
        self.reverse
            .get(&ip)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no name for {ip}")))
    }
}
