//! ChaCha20-Poly1305 sealing for the memory file
//!
//! Layout: nonce (12) || ciphertext || tag (16). The format tag is bound as
//! associated data, so a blob written by another format version fails to
//! open instead of decoding garbage.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AgentError, AgentResult};

/// Size of the memory key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the nonce in bytes
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Associated data identifying the on-disk format
pub const FORMAT_AAD: &[u8] = b"wakeline.memory.v1";

/// Symmetric key for the memory file, wiped on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MemoryKey([u8; KEY_SIZE]);

impl MemoryKey {
    /// Fresh key from the OS random source
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        MemoryKey(bytes)
    }

    /// Wrap stored key material; `None` unless exactly [`KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().ok()?;
        Some(MemoryKey(bytes))
    }

    /// Raw key material
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Encrypt under a fresh random nonce
    pub fn seal(&self, plaintext: &[u8]) -> AgentResult<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new((&self.0).into());

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: FORMAT_AAD,
                },
            )
            .map_err(|_| AgentError::Other("Memory encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    /// Decrypt and authenticate; any failure is [`AgentError::StorageCorrupted`]
    pub fn open(&self, sealed: &[u8]) -> AgentResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(AgentError::StorageCorrupted);
        }

        let cipher = ChaCha20Poly1305::new((&self.0).into());
        let (nonce, encrypted) = sealed.split_at(NONCE_SIZE);

        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: encrypted,
                    aad: FORMAT_AAD,
                },
            )
            .map_err(|_| AgentError::StorageCorrupted)
    }
}

impl std::fmt::Debug for MemoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MemoryKey(..)")
    }
}
