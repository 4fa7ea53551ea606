//! ssh key material: egress key pairs and ingress authorized keys.
//!
//! key generation happens elsewhere. this module only enumerates, validates
//! and rewrites what is already on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::Error;
use crate::Result;

const KEY_TYPES: &[&str] = &[
    "ssh-ed25519",
    "ssh-rsa",
    "ssh-dss",
    "ecdsa-sha2-nistp256",
    "ecdsa-sha2-nistp384",
    "ecdsa-sha2-nistp521",
    "sk-ssh-ed25519@openssh.com",
    "sk-ecdsa-sha2-nistp256@openssh.com",
];

/// one public key line, `[options] <algo> <base64> [comment]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// authorized_keys options such as `from="10.0.0.0/8"`.
    pub options: Option<String>,
    /// key algorithm.
    pub algorithm: String,
    /// base64 key blob.
    pub blob: String,
    /// trailing comment.
    pub comment: String,
}

impl PublicKey {
    /// parse and validate one line.
    ///
    /// the blob must decode and carry the same algorithm name as the line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::InvalidKey("empty key".to_string()));
        }

        let tokens = split_quoted(line);
        let algo_index = tokens
            .iter()
            .position(|t| KEY_TYPES.contains(&t.as_str()))
            .ok_or_else(|| Error::InvalidKey("unknown key type".to_string()))?;

        let options = match algo_index {
            0 => None,
            1 => Some(tokens[0].clone()),
            _ => return Err(Error::InvalidKey("unexpected text before key type".to_string())),
        };
        let algorithm = tokens[algo_index].clone();
        let blob = tokens
            .get(algo_index + 1)
            .ok_or_else(|| Error::InvalidKey("missing key data".to_string()))?
            .clone();
        let comment = tokens[algo_index + 2..].join(" ");

        let decoded = STANDARD
            .decode(&blob)
            .map_err(|e| Error::InvalidKey(format!("bad base64: {e}")))?;
        if blob_algorithm(&decoded) != Some(algorithm.as_bytes()) {
            return Err(Error::InvalidKey(format!(
                "key data does not match type {algorithm}"
            )));
        }

        Ok(Self {
            options,
            algorithm,
            blob,
            comment,
        })
    }

    /// whether both lines carry the same key, ignoring options and comment.
    pub fn same_key(&self, other: &PublicKey) -> bool {
        self.algorithm == other.algorithm && self.blob == other.blob
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(options) = &self.options {
            write!(f, "{options} ")?;
        }
        write!(f, "{} {}", self.algorithm, self.blob)?;
        if !self.comment.is_empty() {
            write!(f, " {}", self.comment)?;
        }
        Ok(())
    }
}

// the wire blob starts with a length prefixed algorithm name
fn blob_algorithm(decoded: &[u8]) -> Option<&[u8]> {
    let len_bytes: [u8; 4] = decoded.get(..4)?.try_into().ok()?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    decoded.get(4..4 + len)
}

// whitespace split that keeps double quoted runs together
fn split_quoted(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// an egress key pair found in a principal's `.ssh` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    /// the private key file handed to ssh.
    pub private_path: PathBuf,
    /// the matching `.pub` file.
    pub public_path: PathBuf,
    /// the parsed public half.
    pub public: PublicKey,
}

/// list the key pairs in `ssh_dir`, sorted by path.
///
/// a `.pub` file counts only when its private half sits next to it and it
/// parses. a missing directory yields no pairs.
pub async fn list_key_pairs(ssh_dir: &Path) -> Result<Vec<KeyPair>> {
    let mut entries = match tokio::fs::read_dir(ssh_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut pairs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let public_path = entry.path();
        if public_path.extension().and_then(|e| e.to_str()) != Some("pub") {
            continue;
        }
        let private_path = public_path.with_extension("");
        if !tokio::fs::try_exists(&private_path).await? {
            continue;
        }
        let content = tokio::fs::read_to_string(&public_path).await?;
        match PublicKey::parse(&content) {
            Ok(public) => pairs.push(KeyPair {
                private_path,
                public_path,
                public,
            }),
            Err(e) => {
                tracing::debug!(path = %public_path.display(), error = %e, "skipping public key");
            }
        }
    }
    pairs.sort_by(|a, b| a.private_path.cmp(&b.private_path));
    Ok(pairs)
}

/// the valid keys of an authorized_keys file, in file order.
pub fn parse_authorized_keys(content: &str) -> Vec<PublicKey> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| PublicKey::parse(line).ok())
        .collect()
}

/// render keys back into authorized_keys form.
pub fn render_authorized_keys(keys: &[PublicKey]) -> String {
    keys.iter().map(|k| format!("{k}\n")).collect()
}

/// read an authorized_keys file; a missing file has no keys.
pub async fn read_authorized_keys(path: &Path) -> Result<Vec<PublicKey>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(parse_authorized_keys(&content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// drop every known_hosts line naming `host`.
///
/// a line matches when one of its comma separated host patterns equals
/// `host`, or is `[host]:port`. hashed entries never match. returns the new
/// content and the number of lines removed.
pub fn forget_known_host(content: &str, host: &str) -> (String, usize) {
    let mut kept = String::with_capacity(content.len());
    let mut removed = 0;
    for line in content.lines() {
        if known_host_matches(line, host) {
            removed += 1;
        } else {
            kept.push_str(line);
            kept.push('\n');
        }
    }
    (kept, removed)
}

fn known_host_matches(line: &str, host: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return false;
    }
    let mut fields = line.split_whitespace();
    let mut patterns = fields.next().unwrap_or_default();
    if patterns.starts_with('@') {
        patterns = fields.next().unwrap_or_default();
    }
    patterns.split(',').any(|pattern| {
        pattern == host
            || pattern
                .strip_prefix('[')
                .and_then(|rest| rest.split_once("]:"))
                .is_some_and(|(name, _)| name == host)
    })
}
