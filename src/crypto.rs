//! Authenticated encryption for journal content at rest.
//!
//! AES-256-GCM with a fresh random 96-bit nonce per call. The encoded form
//! is `base64(nonce || ciphertext || tag)`; decryption authenticates and
//! decrypts in one step, so tampering with any byte of the payload fails
//! before any plaintext is produced.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fmt;
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption key is not set")]
    MissingKey,
    #[error("encryption key is not valid base64: {0}")]
    InvalidKeyEncoding(base64::DecodeError),
    #[error("encryption key must decode to exactly {KEY_LEN} bytes (got {0})")]
    InvalidKeyLength(usize),
    #[error("ciphertext is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("ciphertext is shorter than one nonce")]
    TooShort,
    #[error("ciphertext failed authentication")]
    Authentication,
    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
    #[error("encryption failed")]
    Encrypt,
}

/// Owns the validated symmetric key. Constructed once at process start from
/// the configured base64 key and shared by reference after that.
#[derive(Clone)]
pub struct Codec {
    cipher: Aes256Gcm,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").finish_non_exhaustive()
    }
}

impl Codec {
    /// Validate and install a base64-encoded 256-bit key.
    pub fn from_base64(encoded_key: &str) -> Result<Self, CryptoError> {
        let encoded_key = encoded_key.trim();
        if encoded_key.is_empty() {
            return Err(CryptoError::MissingKey);
        }
        let key_bytes = BASE64
            .decode(encoded_key)
            .map_err(CryptoError::InvalidKeyEncoding)?;
        if key_bytes.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength(key_bytes.len()));
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));
        Ok(Self { cipher })
    }

    /// Encrypt `plaintext` under a fresh random nonce. Two calls on the same
    /// input produce different output.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;
        let mut payload = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        payload.extend_from_slice(nonce.as_slice());
        payload.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(payload))
    }

    /// Authenticate and decrypt an encoded payload, returning the exact
    /// original plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let payload = BASE64.decode(encoded)?;
        if payload.len() < NONCE_LEN {
            return Err(CryptoError::TooShort);
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Authentication)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}
