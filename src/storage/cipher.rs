//! AES-256-GCM encryption for values kept in the local preference store.
//!
//! Values are stored as base64 of `nonce || ciphertext || tag`, with a fresh
//! 12-byte nonce per write.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use anyhow::{anyhow, Context, Result};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const TAG_SIZE: usize = 16;

/// Symmetric cipher keyed from a passphrase
#[derive(Clone)]
pub struct StoreCipher {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for StoreCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreCipher").finish_non_exhaustive()
    }
}

impl StoreCipher {
    /// Derive a 32-byte key from the passphrase with SHA-256
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| anyhow!("Key init failed: {e}"))
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {e}"))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Stored value is not valid base64")?;

        if combined.len() < NONCE_SIZE + TAG_SIZE {
            anyhow::bail!("Stored value is too short to be encrypted");
        }

        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&combined[..NONCE_SIZE]);

        let plaintext = cipher
            .decrypt(nonce, &combined[NONCE_SIZE..])
            .map_err(|e| anyhow!("Decryption failed: {e}"))?;

        String::from_utf8(plaintext).context("Decrypted value is not UTF-8")
    }
}
