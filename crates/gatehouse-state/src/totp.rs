//! per-user totp state stored in `~/.google_authenticator`.
//!
//! the file holds the shared secret on its first line, a few `"` directive
//! lines, then one unused emergency code per line. the pam module verifying
//! logins deletes a code from the file when it is used; the bastion only
//! ever replaces the whole set through regeneration.

use rand::Rng;

/// number of emergency codes handed out at once.
pub const EMERGENCY_CODE_COUNT: usize = 5;

const SECRET_LEN: usize = 16;
const BASE32_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const DIRECTIVES: &[&str] = &["\" RATE_LIMIT 3 30", "\" WINDOW_SIZE 17", "\" TOTP_AUTH"];

/// the enabled totp state of one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotpState {
    /// base32 shared secret.
    pub secret: String,
    /// unused single-use emergency codes.
    pub codes: Vec<String>,
}

impl TotpState {
    /// fresh state with a random secret and a full set of codes.
    pub fn generate() -> Self {
        Self {
            secret: generate_secret(),
            codes: generate_codes(),
        }
    }

    /// parse the file content; `None` when it carries no secret.
    pub fn parse(content: &str) -> Option<Self> {
        let mut lines = content.lines().map(str::trim).filter(|l| !l.is_empty());
        let secret = lines.next().filter(|l| !l.starts_with('"'))?.to_string();
        let codes = lines
            .filter(|l| !l.starts_with('"'))
            .map(str::to_string)
            .collect();
        Some(Self { secret, codes })
    }

    /// render the file content.
    pub fn render(&self) -> String {
        let mut out = format!("{}\n", self.secret);
        for directive in DIRECTIVES {
            out.push_str(directive);
            out.push('\n');
        }
        for code in &self.codes {
            out.push_str(code);
            out.push('\n');
        }
        out
    }

    /// replace every emergency code with a fresh set.
    pub fn regenerate_codes(&mut self) {
        self.codes = generate_codes();
    }
}

/// a random base32 secret.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    (0..SECRET_LEN)
        .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
        .collect()
}

/// a fresh set of eight digit emergency codes.
pub fn generate_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..EMERGENCY_CODE_COUNT)
        .map(|_| format!("{:08}", rng.gen_range(0..100_000_000u32)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_shape() {
        let state = TotpState::generate();
        assert_eq!(state.secret.len(), 16);
        assert!(state.secret.bytes().all(|b| BASE32_ALPHABET.contains(&b)));
        assert_eq!(state.codes.len(), EMERGENCY_CODE_COUNT);
        assert!(state.codes.iter().all(|c| c.len() == 8 && c.bytes().all(|b| b.is_ascii_digit())));
    }

    #[test]
    fn test_parse_render() {
        let state = TotpState {
            secret: "JBSWY3DPEHPK3PXP".into(),
            codes: vec!["12345678".into(), "87654321".into()],
        };
        let rendered = state.render();
        assert!(rendered.contains("\" TOTP_AUTH"));
        assert_eq!(TotpState::parse(&rendered), Some(state));
        assert_eq!(TotpState::parse(""), None);
        assert_eq!(TotpState::parse("\" TOTP_AUTH\n"), None);
    }

    #[test]
    fn test_regeneration_replaces_remaining_codes() {
        // pam already removed the first code of this file
        let content = "JBSWY3DPEHPK3PXP\n\" RATE_LIMIT 3 30\n\" TOTP_AUTH\n22222222\n";
        let mut state = TotpState::parse(content).unwrap();
        assert_eq!(state.codes, vec!["22222222"]);

        state.regenerate_codes();
        assert_eq!(state.codes.len(), EMERGENCY_CODE_COUNT);
        assert_eq!(state.secret, "JBSWY3DPEHPK3PXP");
    }
}
