//! per-principal access resolution.

use std::fmt;
use std::path::PathBuf;

use gatehouse_types::Access;

use crate::engine::matches;
use crate::target::AccessRequest;

/// where a grant came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// the principal's own accesses.
    Personal,
    /// accesses of the named group.
    Group(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Personal => write!(f, "personal access"),
            Source::Group(name) => write!(f, "group access from group {name}"),
        }
    }
}

/// the grants of one source together with the key material it brings.
#[derive(Debug, Clone)]
pub struct AccessSet {
    /// who granted these accesses.
    pub source: Source,
    /// the stored grants.
    pub accesses: Vec<Access>,
    /// private key files usable for destinations of this source.
    pub key_paths: Vec<PathBuf>,
}

/// outcome of checking a request against every source of a principal.
#[derive(Debug, Clone, Default)]
pub struct AccessResolution {
    /// at least one source yielded a match.
    pub authorized: bool,
    /// every matching grant, in source order.
    pub accesses: Vec<Access>,
    /// key files of the sources that matched.
    pub key_paths: Vec<PathBuf>,
    /// sources that granted the request.
    pub sources: Vec<Source>,
    destinations: Vec<Access>,
}

/// what a resolution designates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// nothing matched.
    Denied,
    /// exactly one `(host, user, port)` destination matched.
    Unique(Access),
    /// several distinct destinations matched; the caller must choose.
    Ambiguous(Vec<Access>),
}

impl AccessResolution {
    /// evaluate `request` against each set in turn.
    pub fn evaluate(sets: &[AccessSet], request: &AccessRequest) -> Self {
        let mut resolution = Self::default();

        for set in sets {
            let matched: Vec<&Access> = set
                .accesses
                .iter()
                .filter(|grant| matches(grant, request))
                .collect();
            if matched.is_empty() {
                continue;
            }

            resolution.authorized = true;
            resolution.sources.push(set.source.clone());
            for path in &set.key_paths {
                if !resolution.key_paths.contains(path) {
                    resolution.key_paths.push(path.clone());
                }
            }
            for grant in matched {
                let destination = effective_destination(grant, request);
                if !resolution
                    .destinations
                    .iter()
                    .any(|d| d.same_destination(&destination))
                {
                    resolution.destinations.push(destination);
                }
                resolution.accesses.push(grant.clone());
            }
        }

        resolution
    }

    /// the distinct destinations the request may be forwarded to.
    ///
    /// a grant without a host adopts the requested host, an empty user or
    /// zero port adopts the requested one.
    pub fn destinations(&self) -> &[Access] {
        &self.destinations
    }

    /// narrow the resolution to a single destination if possible.
    pub fn select(&self) -> Selection {
        match self.destinations.as_slice() {
            [] => Selection::Denied,
            [only] => Selection::Unique(only.clone()),
            many => Selection::Ambiguous(many.to_vec()),
        }
    }
}

fn effective_destination(grant: &Access, request: &AccessRequest) -> Access {
    let mut destination = grant.clone();
    if destination.host.is_empty() {
        destination.host = request.host.clone();
    }
    if destination.user.is_empty() {
        destination.user = request.user.clone();
    }
    if destination.port == 0 {
        destination.port = request.port;
    }
    destination
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::AccessEngine;
    use crate::resolver::StaticResolver;

    fn engine() -> AccessEngine {
        let resolver = StaticResolver::new()
            .with_host("example.com", &["93.184.216.34".parse().unwrap()])
            .with_host("test.com", &["198.51.100.20".parse().unwrap()]);
        AccessEngine::new(Arc::new(resolver))
    }

    async fn grant(engine: &AccessEngine, host: &str, user: &str, port: u16, alias: Option<&str>) -> Access {
        engine.build_access(host, user, port, alias, false).await.unwrap().0
    }

    fn personal(accesses: Vec<Access>) -> AccessSet {
        AccessSet {
            source: Source::Personal,
            accesses,
            key_paths: vec![PathBuf::from("/home/alice/.ssh/id_ed25519")],
        }
    }

    #[tokio::test]
    async fn test_range_grant_covers_address() {
        let engine = engine();
        let wide = grant(&engine, "10.0.0.0/8", "root", 22, None).await;
        let request = engine.parse_request("root@10.1.2.3:22").await.unwrap();

        let resolution = engine.resolve(&[personal(vec![wide.clone()])], &request);
        assert!(resolution.authorized);
        assert_eq!(resolution.accesses, vec![wide]);
        match resolution.select() {
            Selection::Unique(dest) => {
                assert_eq!(dest.host, "10.1.2.3");
                assert_eq!(dest.user, "root");
                assert_eq!(dest.port, 22);
            }
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_alias_resolves_to_stored_destination() {
        let engine = engine();
        let web = grant(&engine, "example.com", "root", 22, Some("web")).await;
        let request = engine.parse_request("web").await.unwrap();

        let resolution = engine.resolve(&[personal(vec![web])], &request);
        assert!(resolution.authorized);
        match resolution.select() {
            Selection::Unique(dest) => assert_eq!(dest.short_string(), "root@example.com:22 (web)"),
            other => panic!("unexpected selection {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_alias_with_two_ports_is_ambiguous() {
        let engine = engine();
        let a = grant(&engine, "db", "user", 5432, Some("db")).await;
        let b = grant(&engine, "db", "user", 2222, Some("db")).await;
        let request = engine.parse_request("user@db").await.unwrap();

        let resolution = engine.resolve(&[personal(vec![a, b])], &request);
        assert!(resolution.authorized);
        match resolution.select() {
            Selection::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_same_destination_from_two_sources_is_unique() {
        let engine = engine();
        let mine = grant(&engine, "example.com", "root", 22, None).await;
        let group = AccessSet {
            source: Source::Group("ops".into()),
            accesses: vec![mine.clone()],
            key_paths: vec![PathBuf::from("/home/bg_ops/.ssh/id_ed25519")],
        };
        let request = engine.parse_request("root@example.com:22").await.unwrap();

        let resolution = engine.resolve(&[personal(vec![mine]), group], &request);
        assert_eq!(resolution.sources, vec![Source::Personal, Source::Group("ops".into())]);
        assert_eq!(resolution.key_paths.len(), 2);
        assert!(matches!(resolution.select(), Selection::Unique(_)));
    }

    #[tokio::test]
    async fn test_no_match_is_denied() {
        let engine = engine();
        let other = grant(&engine, "test.com", "root", 22, None).await;
        let request = engine.parse_request("root@example.com:22").await.unwrap();

        let resolution = engine.resolve(&[personal(vec![other])], &request);
        assert!(!resolution.authorized);
        assert!(resolution.sources.is_empty());
        assert!(resolution.key_paths.is_empty());
        assert_eq!(resolution.select(), Selection::Denied);
    }

    #[test]
    fn test_source_display() {
        assert_eq!(Source::Personal.to_string(), "personal access");
        assert_eq!(Source::Group("ops".into()).to_string(), "group access from group ops");
    }
}
