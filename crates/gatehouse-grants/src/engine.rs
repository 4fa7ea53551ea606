//! the access evaluation engine.

use std::net::IpAddr;
use std::sync::Arc;

use gatehouse_types::{Access, AccessError};
use ipnet::IpNet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::resolution::{AccessResolution, AccessSet};
use crate::resolver::HostResolver;
use crate::target::{AccessRequest, split_user_input};

/// thread-safe access evaluation engine.
///
/// wraps a host resolver in an arc for cheap cloning. all methods take
/// `&self`, so one engine can serve the gate and every operation.
#[derive(Clone)]
pub struct AccessEngine {
    resolver: Arc<dyn HostResolver>,
}

impl AccessEngine {
    /// create an engine resolving names through `resolver`.
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self { resolver }
    }

    /// build the canonical access for a grant or lookup.
    ///
    /// ip literals become single address prefixes and get a reverse-resolved
    /// display host when one exists. cidrs are canonicalised and lose their
    /// host when wider than one address. hostnames are forward resolved;
    /// when that fails the host is kept as an opaque alias unless `strict`.
    pub async fn build_access(
        &self,
        host: &str,
        user: &str,
        port: u16,
        alias: Option<&str>,
        strict: bool,
    ) -> Result<(Access, Vec<IpAddr>)> {
        if host.is_empty() {
            return Err(Error::MissingHost);
        }
        let alias = alias.filter(|a| !a.is_empty()).map(str::to_string);

        let (display_host, prefix, ips) = if let Ok(ip) = host.parse::<IpAddr>() {
            let net = IpNet::from(ip);
            (self.reverse_name(ip).await, Some(net), vec![ip])
        } else if let Ok(net) = host.parse::<IpNet>() {
            let net = net.trunc();
            if net.prefix_len() == net.max_prefix_len() {
                let ip = net.addr();
                (self.reverse_name(ip).await, Some(net), vec![ip])
            } else {
                if alias.is_some() {
                    return Err(AccessError::AliasOnRange.into());
                }
                (String::new(), Some(net), vec![net.network()])
            }
        } else {
            match self.resolver.lookup_ip(host).await {
                Ok(ips) if !ips.is_empty() => {
                    (host.to_string(), Some(IpNet::from(ips[0])), ips)
                }
                Ok(_) | Err(_) if strict => return Err(Error::Unresolvable(host.to_string())),
                Ok(_) => (host.to_string(), None, Vec::new()),
                Err(e) => {
                    debug!(host, error = %e, "host did not resolve, treating it as an alias");
                    (host.to_string(), None, Vec::new())
                }
            }
        };

        let access = Access {
            uniq_id: String::new(),
            host: display_host,
            prefix,
            alias,
            user: user.to_string(),
            port,
            comment: String::new(),
            ip: (ips.len() == 1 && prefix.is_some_and(|p| p.prefix_len() == p.max_prefix_len()))
                .then(|| ips[0]),
        };
        access.validate()?;
        Ok((access, ips))
    }

    /// parse `[user@]host[:port]` typed by a caller into a request.
    pub async fn parse_request(&self, input: &str) -> Result<AccessRequest> {
        let target = split_user_input(input, false)?;
        let (access, ips) = self
            .build_access(&target.host, &target.user, target.port, None, false)
            .await?;
        Ok(AccessRequest {
            host: if ips.is_empty() { target.host } else { access.host },
            user: access.user,
            port: access.port,
            ips,
        })
    }

    /// evaluate `request` against each source's grants.
    pub fn resolve(&self, sets: &[AccessSet], request: &AccessRequest) -> AccessResolution {
        AccessResolution::evaluate(sets, request)
    }

    async fn reverse_name(&self, ip: IpAddr) -> String {
        match self.resolver.lookup_addr(ip).await {
            Ok(name) if !name.is_empty() => name,
            _ => ip.to_string(),
        }
    }
}

/// whether a stored grant covers a request.
///
/// a resolved request matches on prefix containment, an unresolved one on
/// host or alias equality. user and port only constrain when the request
/// sets them.
pub fn matches(grant: &Access, request: &AccessRequest) -> bool {
    let destination_matches = if request.is_resolved() {
        grant
            .prefix
            .is_some_and(|net| request.ips.iter().any(|ip| net.contains(ip)))
    } else {
        grant.host == request.host || grant.alias.as_deref() == Some(request.host.as_str())
    };

    destination_matches
        && (request.user.is_empty() || request.user == grant.user)
        && (request.port == 0 || request.port == grant.port)
}
