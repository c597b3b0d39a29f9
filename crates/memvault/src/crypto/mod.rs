//! At-rest encryption for the vault
//!
//! Records are sealed with ChaCha20-Poly1305 under a single process-wide
//! key. Each sealed buffer carries its own random nonce so the key can be
//! reused across every record in the log.

use std::fmt;
use std::path::Path;

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{MemvaultError, Result};

/// Key length in bytes (ChaCha20-Poly1305)
pub const KEY_SIZE: usize = 32;
/// Nonce length in bytes
pub const NONCE_SIZE: usize = 12;

/// Process-wide encryption key.
///
/// Read-only after initialization, zeroed on drop. The Debug impl is
/// deliberately opaque so the key material cannot end up in log output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey([u8; KEY_SIZE]);

impl VaultKey {
    /// Create a key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(MemvaultError::Key(format!(
                "expected {KEY_SIZE}-byte key, got {} bytes",
                bytes.len()
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Generate a fresh random key
    pub fn generate() -> Self {
        let generated = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(generated.as_slice());
        Self(key)
    }

    /// Load the key from `path`, or generate and persist one if the file
    /// does not exist yet. On Unix the file is created with mode 0600.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let bytes = std::fs::read(path)
                .map_err(|e| MemvaultError::Key(format!("failed to read key file: {e}")))?;
            return Self::from_bytes(&bytes);
        }

        let key = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MemvaultError::Key(format!("failed to create key directory: {e}")))?;
        }
        std::fs::write(path, key.0)
            .map_err(|e| MemvaultError::Key(format!("failed to write key file: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| MemvaultError::Key(format!("failed to restrict key file: {e}")))?;
        }

        tracing::info!("Generated new vault key at {}", path.display());
        Ok(key)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// Encrypt plaintext under `key` with a fresh random nonce.
///
/// Output layout is `nonce ‖ ciphertext` where the ciphertext includes the
/// Poly1305 authentication tag.
pub fn seal(key: &VaultKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| MemvaultError::Internal(format!("encryption failed: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(nonce.as_slice());
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt a buffer produced by [`seal`].
///
/// Authentication failure (tampered bytes, wrong key) and short buffers
/// both report `VaultCorrupt`.
pub fn open(key: &VaultKey, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_SIZE {
        return Err(MemvaultError::VaultCorrupt(format!(
            "sealed buffer too short: {} bytes",
            sealed.len()
        )));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| MemvaultError::VaultCorrupt("ciphertext failed authentication".to_string()))
}
