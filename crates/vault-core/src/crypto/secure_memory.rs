//! Secure memory handling with automatic zeroization

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Symmetric key for one authenticated session - zeroed when dropped.
///
/// Deliberately neither `Clone` nor serializable: the only way to obtain one
/// is a successful derivation, and the only way to lose it is to drop it.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    key: [u8; 32],
}

impl SessionKey {
    /// Wrap raw key bytes
    pub(crate) fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Get the key bytes (use carefully - avoid copying)
    pub(crate) fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// Output buffer for in-place derivation
    pub(crate) fn as_mut_bytes(&mut self) -> &mut [u8; 32] {
        &mut self.key
    }

    /// Explicitly wipe and discard the key
    pub fn discard(self) {
        drop(self);
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
