//! payload framing: json, then optional aes-gcm sealing, then base64.
//!
//! a sealed payload is `base64(nonce || ciphertext)`. without a key the
//! payload is just `base64(json)`.

use std::fmt;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::aes::Aes192;
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use gatehouse_types::ReplicationData;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::Error;
use crate::Result;

/// length of the nonce prefixed to every sealed payload.
pub const NONCE_LEN: usize = 12;

type Aes192Gcm = AesGcm<Aes192, U12>;

enum Cipher {
    Aes128(Aes128Gcm),
    Aes192(Aes192Gcm),
    Aes256(Aes256Gcm),
}

/// seals and opens replication payloads with the shared instance key.
pub struct PayloadCipher {
    cipher: Option<Cipher>,
}

impl PayloadCipher {
    /// a cipher for `key`.
    ///
    /// an empty key disables sealing. 16, 24 and 32 byte keys select
    /// aes-128, aes-192 and aes-256. an 8 byte key is stretched with sha-256
    /// into an aes-256 key. any other length is rejected.
    pub fn new(key: &[u8]) -> Result<Self> {
        let cipher = match key.len() {
            0 => None,
            8 => {
                let stretched = Zeroizing::new(<[u8; 32]>::from(Sha256::digest(key)));
                Some(Cipher::Aes256(new_cipher(stretched.as_slice())?))
            }
            16 => Some(Cipher::Aes128(new_cipher(key)?)),
            24 => Some(Cipher::Aes192(new_cipher(key)?)),
            32 => Some(Cipher::Aes256(new_cipher(key)?)),
            n => return Err(Error::Crypto(format!("unsupported key length {n}"))),
        };
        Ok(Self { cipher })
    }

    /// a cipher for the configured secret.
    pub fn from_secret(key: &SecretString) -> Result<Self> {
        Self::new(key.expose_secret().as_bytes())
    }

    /// a cipher that leaves payloads unsealed.
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// whether payloads are sealed.
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// seal raw bytes, returning `nonce || ciphertext`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        match &self.cipher {
            None => Ok(plaintext.to_vec()),
            Some(Cipher::Aes128(c)) => seal_with(c, plaintext),
            Some(Cipher::Aes192(c)) => seal_with(c, plaintext),
            Some(Cipher::Aes256(c)) => seal_with(c, plaintext),
        }
    }

    /// open bytes produced by [`seal`](Self::seal).
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        match &self.cipher {
            None => Ok(sealed.to_vec()),
            Some(Cipher::Aes128(c)) => open_with(c, sealed),
            Some(Cipher::Aes192(c)) => open_with(c, sealed),
            Some(Cipher::Aes256(c)) => open_with(c, sealed),
        }
    }

    /// frame a payload for a replication entry.
    pub fn encrypt_payload(&self, data: &ReplicationData) -> Result<String> {
        let json = serde_json::to_vec(data)?;
        Ok(STANDARD.encode(self.seal(&json)?))
    }

    /// unframe a payload from a replication entry.
    pub fn decrypt_payload(&self, framed: &str) -> Result<ReplicationData> {
        let sealed = STANDARD.decode(framed)?;
        let json = self.open(&sealed)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

impl fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCipher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

fn new_cipher<C: KeyInit>(key: &[u8]) -> Result<C> {
    C::new_from_slice(key).map_err(|e| Error::Crypto(format!("failed to create cipher: {e}")))
}

fn seal_with<C: Aead + AeadCore<NonceSize = U12>>(cipher: &C, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = C::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open_with<C: Aead + AeadCore<NonceSize = U12>>(cipher: &C, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(Error::Crypto("ciphertext too short".to_string()));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::<U12>::from_slice(nonce), ciphertext)
        .map_err(|e| Error::Crypto(format!("decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ReplicationData {
        ReplicationData::new()
            .with("username", "alice")
            .with("public-key", "ssh-ed25519 AAAA alice")
    }

    #[test]
    fn test_supported_key_lengths() {
        for len in [8, 16, 24, 32] {
            let cipher = PayloadCipher::new(&vec![7u8; len]).unwrap();
            assert!(cipher.is_enabled());
            let framed = cipher.encrypt_payload(&payload()).unwrap();
            assert_eq!(cipher.decrypt_payload(&framed).unwrap(), payload());
        }
        assert!(PayloadCipher::new(&[1u8; 12]).is_err());
    }

    #[test]
    fn test_empty_key_is_plain_base64_json() {
        let cipher = PayloadCipher::new(b"").unwrap();
        assert!(!cipher.is_enabled());
        let framed = cipher.encrypt_payload(&payload()).unwrap();
        let json = STANDARD.decode(&framed).unwrap();
        let parsed: ReplicationData = serde_json::from_slice(&json).unwrap();
        assert_eq!(parsed, payload());
    }

    #[test]
    fn test_wrong_key_is_crypto_error() {
        let k1 = PayloadCipher::new(b"0123456789abcdef").unwrap();
        let k2 = PayloadCipher::new(b"fedcba9876543210").unwrap();
        let framed = k1.encrypt_payload(&payload()).unwrap();
        assert!(matches!(k2.decrypt_payload(&framed), Err(Error::Crypto(_))));
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let cipher = PayloadCipher::new(b"0123456789abcdef").unwrap();
        let framed = STANDARD.encode([1u8, 2, 3]);
        match cipher.decrypt_payload(&framed) {
            Err(Error::Crypto(msg)) => assert!(msg.contains("too short")),
            other => panic!("expected crypto error, got {other:?}"),
        }
    }

    #[test]
    fn test_nonce_is_fresh() {
        let cipher = PayloadCipher::new(b"01234567").unwrap();
        let a = cipher.encrypt_payload(&payload()).unwrap();
        let b = cipher.encrypt_payload(&payload()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_hides_key() {
        let cipher = PayloadCipher::new(b"01234567").unwrap();
        assert_eq!(format!("{cipher:?}"), "PayloadCipher { enabled: true }");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn payload_round_trips(
            entries in proptest::collection::btree_map("[a-z-]{1,12}", ".{0,40}", 0..8),
            key in prop_oneof![
                proptest::collection::vec(any::<u8>(), 8),
                proptest::collection::vec(any::<u8>(), 16),
                proptest::collection::vec(any::<u8>(), 32),
            ],
        ) {
            let data: ReplicationData = entries.into_iter().collect();
            let cipher = PayloadCipher::new(&key).unwrap();
            let framed = cipher.encrypt_payload(&data).unwrap();
            prop_assert_eq!(cipher.decrypt_payload(&framed).unwrap(), data);
        }
    }
}
