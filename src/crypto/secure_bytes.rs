//! Zero-on-drop container for transient secrets
//!
//! Holds passphrases and scratch copies of private key material (the 64-byte
//! ED25519 secret encoding, derived scalars) so they do not linger in freed
//! memory.

use std::ops::Deref;

use serde::{Deserialize, Deserializer};
use zeroize::Zeroize;

#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecureBytes(Vec<u8>);

impl SecureBytes {
    pub fn new(data: Vec<u8>) -> Self {
        let secure = Self(data);
        secure.lock_memory();
        secure
    }

    /// Concatenation of several secret pieces into one locked buffer
    pub fn concat(pieces: &[&[u8]]) -> Self {
        let mut data = Vec::with_capacity(pieces.iter().map(|p| p.len()).sum());
        for piece in pieces {
            data.extend_from_slice(piece);
        }
        Self::new(data)
    }

    /// Lock memory to prevent swapping (best effort, may fail without privileges)
    #[cfg(unix)]
    fn lock_memory(&self) {
        if self.0.is_empty() {
            return;
        }
        unsafe {
            libc::mlock(self.0.as_ptr() as *const libc::c_void, self.0.len());
        }
    }

    #[cfg(not(unix))]
    fn lock_memory(&self) {}

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for SecureBytes {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for SecureBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for SecureBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for SecureBytes {
    fn from(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }
}

impl From<&str> for SecureBytes {
    fn from(data: &str) -> Self {
        Self::new(data.as_bytes().to_vec())
    }
}

impl From<String> for SecureBytes {
    fn from(data: String) -> Self {
        Self::new(data.into_bytes())
    }
}

impl Default for SecureBytes {
    fn default() -> Self {
        Self(Vec::new())
    }
}

/// Passphrases arrive as strings in configuration
impl<'de> Deserialize<'de> for SecureBytes {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecureBytes::from)
    }
}

// Prevent accidental debug printing of secrets
impl std::fmt::Debug for SecureBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureBytes")
            .field("len", &self.0.len())
            .field("data", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat() {
        let secret = SecureBytes::concat(&[&[1, 2], &[3], &[]]);
        assert_eq!(&*secret, &[1, 2, 3]);
        assert_eq!(secret.len(), 3);
    }

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecureBytes::from("hunter2");
        let printed = format!("{:?}", secret);
        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_deserialize_from_string() {
        let secret: SecureBytes = serde_json::from_str("\"pass phrase\"").unwrap();
        assert_eq!(&*secret, b"pass phrase");
    }
}
