//! connection target parsing.
//!
//! user input has the shape `[user@]host[:port]` where `host` may be an ip
//! literal (ipv6 in brackets when a port follows), a cidr, a hostname or an
//! alias.

use std::net::IpAddr;

use crate::error::{Error, Result};

/// the raw fragments of a `[user@]host[:port]` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// login fragment, empty when absent.
    pub user: String,
    /// host, address, prefix or alias fragment.
    pub host: String,
    /// port fragment, 0 when absent.
    pub port: u16,
}

/// a parsed connection request, ready for matching against grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    /// hostname, display address or alias token.
    pub host: String,
    /// requested login, empty meaning any.
    pub user: String,
    /// requested port, 0 meaning any.
    pub port: u16,
    /// resolved addresses; empty when the host is an opaque alias.
    pub ips: Vec<IpAddr>,
}

impl AccessRequest {
    /// whether the request is matched by address rather than by name.
    pub fn is_resolved(&self) -> bool {
        !self.ips.is_empty()
    }
}

/// split `[user@]host[:port]` into its fragments.
///
/// with `strict` the `user@` part is mandatory. without it, input lacking
/// `@` is taken as a bare host or alias.
pub fn split_user_input(input: &str, strict: bool) -> Result<ConnectionTarget> {
    let input = input.trim();
    let (user, host_port) = match input.split_once('@') {
        Some((user, rest)) => (user, rest),
        None if strict => return Err(Error::MissingSeparator(input.to_string())),
        None => ("", input),
    };

    let (host, port) = split_port(host_port)?;
    if host.is_empty() {
        return Err(Error::MissingHost);
    }

    Ok(ConnectionTarget {
        user: user.to_string(),
        host: host.to_string(),
        port,
    })
}

/// parse a port fragment; empty means unspecified.
pub fn parse_port(raw: &str) -> Result<u16> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse().map_err(|_| Error::InvalidPort(raw.to_string()))
}

fn split_port(host_port: &str) -> Result<(&str, u16)> {
    if let Some(rest) = host_port.strip_prefix('[') {
        let Some((host, after)) = rest.split_once(']') else {
            return Err(Error::MissingHost);
        };
        return match after.strip_prefix(':') {
            Some(port) => Ok((host, parse_port_required(port)?)),
            None if after.is_empty() => Ok((host, 0)),
            None => Err(Error::InvalidPort(after.to_string())),
        };
    }

    // more than one colon is a bare ipv6 literal or prefix without a port
    if host_port.matches(':').count() > 1 {
        return Ok((host_port, 0));
    }

    match host_port.rsplit_once(':') {
        Some((host, port)) => Ok((host, parse_port_required(port)?)),
        None => Ok((host_port, 0)),
    }
}

fn parse_port_required(raw: &str) -> Result<u16> {
    raw.parse().map_err(|_| Error::InvalidPort(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(user: &str, host: &str, port: u16) -> ConnectionTarget {
        ConnectionTarget {
            user: user.into(),
            host: host.into(),
            port,
        }
    }

    #[test]
    fn test_full_target() {
        assert_eq!(
            split_user_input("root@example.com:2222", false).unwrap(),
            target("root", "example.com", 2222)
        );
    }

    #[test]
    fn test_bare_alias() {
        assert_eq!(split_user_input("web", false).unwrap(), target("", "web", 0));
        assert_eq!(split_user_input("web:22", false).unwrap(), target("", "web", 22));
    }

    #[test]
    fn test_strict_needs_separator() {
        assert!(matches!(
            split_user_input("web", true),
            Err(Error::MissingSeparator(_))
        ));
        assert!(split_user_input("root@web", true).is_ok());
    }

    #[test]
    fn test_ipv6_forms() {
        assert_eq!(
            split_user_input("root@[2001:db8::1]:22", false).unwrap(),
            target("root", "2001:db8::1", 22)
        );
        assert_eq!(
            split_user_input("root@2001:db8::1", false).unwrap(),
            target("root", "2001:db8::1", 0)
        );
        assert_eq!(
            split_user_input("root@2001:db8::/32", false).unwrap(),
            target("root", "2001:db8::/32", 0)
        );
    }

    #[test]
    fn test_cidr_with_port() {
        assert_eq!(
            split_user_input("root@10.0.0.0/8:22", false).unwrap(),
            target("root", "10.0.0.0/8", 22)
        );
    }

    #[test]
    fn test_bad_port() {
        assert!(matches!(
            split_user_input("root@host:ssh", false),
            Err(Error::InvalidPort(_))
        ));
        assert!(matches!(
            split_user_input("root@host:", false),
            Err(Error::InvalidPort(_))
        ));
        assert!(matches!(
            split_user_input("root@host:70000", false),
            Err(Error::InvalidPort(_))
        ));
    }

    #[test]
    fn test_missing_host() {
        assert!(matches!(split_user_input("root@", false), Err(Error::MissingHost)));
        assert!(matches!(split_user_input("root@:22", false), Err(Error::MissingHost)));
    }
}
