// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope encryption for connection config maps.
//!
//! The passphrase is hashed once with SHA-256 into an AES-256-GCM key.
//! Each record is sealed with a fresh random 96-bit nonce and stored as
//! `nonce || ciphertext+tag`. An empty passphrase selects plaintext JSON
//! mode, which exists for development only and is announced at startup.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sky_core::ConnectionConfig;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Tag mismatch, short input, or malformed payload. Never partial.
    #[error("decryption failed")]
    Decryption,
    #[error("config serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Seals and opens connection config maps.
pub struct SecretBox {
    /// `None` selects plaintext mode.
    key: Option<[u8; 32]>,
}

impl SecretBox {
    /// Derive the sealing key from a passphrase. Empty ⇒ plaintext mode.
    pub fn new(passphrase: &str) -> Self {
        if passphrase.is_empty() {
            return Self { key: None };
        }
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key: Some(key) }
    }

    pub fn is_plaintext(&self) -> bool {
        self.key.is_none()
    }

    pub fn encrypt(&self, config: &ConnectionConfig) -> Result<Vec<u8>, CryptoError> {
        let payload = serde_json::to_vec(config)?;
        let Some(key) = &self.key else {
            return Ok(payload);
        };

        let cipher = cipher(key);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let sealed = cipher
            .encrypt(nonce, payload.as_slice())
            .map_err(|_| CryptoError::Decryption)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<ConnectionConfig, CryptoError> {
        let Some(key) = &self.key else {
            return serde_json::from_slice(data).map_err(|_| CryptoError::Decryption);
        };

        if data.len() <= NONCE_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce_bytes, sealed) = data.split_at(NONCE_LEN);
        let cipher = cipher(key);
        let payload = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CryptoError::Decryption)?;
        serde_json::from_slice(&payload).map_err(|_| CryptoError::Decryption)
    }
}

fn cipher(key: &[u8; 32]) -> Aes256Gcm {
    Aes256Gcm::new_from_slice(key).unwrap_or_else(|_| unreachable!("key is always 32 bytes"))
}

#[cfg(test)]
#[path = "crypto_tests.rs"]
mod tests;
