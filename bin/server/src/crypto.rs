//! AES-256-GCM sealing for credential material at rest.
//!
//! Secrets are stored as two base64 columns: ciphertext and nonce. A fresh
//! random nonce is generated per seal; the master key comes from server
//! configuration and never touches the database.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use std::fmt;

/// AES-256-GCM nonce size in bytes.
const NONCE_LEN: usize = 12;

/// Errors from sealing/opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The master key is not valid base64 or not 32 bytes.
    InvalidKey { reason: String },
    /// Encryption failed.
    EncryptFailed,
    /// Decryption failed (wrong key, corrupted data, or bad nonce).
    DecryptFailed,
    /// Stored data is not valid base64.
    InvalidEncoding { reason: String },
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKey { reason } => write!(f, "invalid master key: {reason}"),
            Self::EncryptFailed => write!(f, "encryption failed"),
            Self::DecryptFailed => write!(f, "decryption failed"),
            Self::InvalidEncoding { reason } => write!(f, "invalid encoding: {reason}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Seals and opens secrets with a configured master key.
#[derive(Clone)]
pub struct Crypto {
    cipher: Aes256Gcm,
}

impl Crypto {
    /// Creates a crypto instance from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is malformed.
    pub fn new(master_key_b64: &str) -> Result<Self, CryptoError> {
        let key_bytes = BASE64
            .decode(master_key_b64)
            .map_err(|e| CryptoError::InvalidKey {
                reason: e.to_string(),
            })?;
        if key_bytes.len() != 32 {
            return Err(CryptoError::InvalidKey {
                reason: format!("expected 32 bytes, got {}", key_bytes.len()),
            });
        }

        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Encrypts plaintext, returning (ciphertext, nonce), both base64.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<(String, String), CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::EncryptFailed)?;

        Ok((BASE64.encode(ciphertext), BASE64.encode(nonce_bytes)))
    }

    /// Decrypts base64 ciphertext with its base64 nonce.
    ///
    /// # Errors
    ///
    /// Returns an error if the data cannot be decoded or authenticated.
    pub fn open(&self, ciphertext_b64: &str, nonce_b64: &str) -> Result<Vec<u8>, CryptoError> {
        let ciphertext =
            BASE64
                .decode(ciphertext_b64)
                .map_err(|e| CryptoError::InvalidEncoding {
                    reason: e.to_string(),
                })?;
        let nonce_bytes = BASE64
            .decode(nonce_b64)
            .map_err(|e| CryptoError::InvalidEncoding {
                reason: e.to_string(),
            })?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::InvalidEncoding {
                reason: format!("expected {NONCE_LEN}-byte nonce, got {}", nonce_bytes.len()),
            });
        }

        self.cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| CryptoError::DecryptFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        BASE64.encode([7u8; 32])
    }

    #[test]
    fn seal_open_roundtrip() {
        let crypto = Crypto::new(&test_key()).expect("crypto");
        let (ciphertext, nonce) = crypto.seal(b"access_token_value").expect("seal");

        assert_ne!(ciphertext, BASE64.encode(b"access_token_value"));
        let opened = crypto.open(&ciphertext, &nonce).expect("open");
        assert_eq!(opened, b"access_token_value");
    }

    #[test]
    fn nonces_are_unique_per_seal() {
        let crypto = Crypto::new(&test_key()).expect("crypto");
        let (_, nonce1) = crypto.seal(b"same").expect("seal");
        let (_, nonce2) = crypto.seal(b"same").expect("seal");
        assert_ne!(nonce1, nonce2);
    }

    #[test]
    fn wrong_key_fails_to_open() {
        let crypto = Crypto::new(&test_key()).expect("crypto");
        let (ciphertext, nonce) = crypto.seal(b"secret").expect("seal");

        let other = Crypto::new(&BASE64.encode([8u8; 32])).expect("crypto");
        assert_eq!(
            other.open(&ciphertext, &nonce),
            Err(CryptoError::DecryptFailed)
        );
    }

    #[test]
    fn rejects_short_key() {
        let result = Crypto::new(&BASE64.encode([1u8; 16]));
        assert!(matches!(result, Err(CryptoError::InvalidKey { .. })));
    }

    #[test]
    fn rejects_garbage_encoding() {
        let crypto = Crypto::new(&test_key()).expect("crypto");
        assert!(matches!(
            crypto.open("not base64!!!", "bm9uY2U="),
            Err(CryptoError::InvalidEncoding { .. })
        ));
    }
}
