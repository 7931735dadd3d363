//! Per-call options for parsing, writing and generating keys

use serde::Deserialize;

use crate::algs::{Curve, HashAlgorithm};
use crate::crypto::SecureBytes;

/// Name reported for input that came without a filename
pub const UNNAMED: &str = "(unnamed)";

/// Options for `Key::parse` / `PrivateKey::parse`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParseOptions {
    /// Used in error messages and as the comment of keys that carry none
    #[serde(default)]
    pub filename: Option<String>,
    /// Passphrase for encrypted private keys
    #[serde(default)]
    pub passphrase: Option<SecureBytes>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<SecureBytes>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    /// The filename, or the placeholder when none was given
    pub fn name(&self) -> &str {
        self.filename.as_deref().unwrap_or(UNNAMED)
    }
}

/// A bare string is a filename
impl From<&str> for ParseOptions {
    fn from(filename: &str) -> Self {
        Self::new().with_filename(filename)
    }
}

impl From<String> for ParseOptions {
    fn from(filename: String) -> Self {
        Self::new().with_filename(filename)
    }
}

impl From<&ParseOptions> for ParseOptions {
    fn from(options: &ParseOptions) -> Self {
        options.clone()
    }
}

/// Options for `to_buffer`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WriteOptions {
    /// Encrypts the output where the format supports it
    #[serde(default)]
    pub passphrase: Option<SecureBytes>,
    /// Replaces the key's own comment in formats that carry one
    #[serde(default)]
    pub comment: Option<String>,
    /// Signature hash for formats that record one (DNSSEC RSA algorithms)
    #[serde(default)]
    pub hash_algorithm: Option<HashAlgorithm>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<SecureBytes>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_hash_algorithm(mut self, hash: HashAlgorithm) -> Self {
        self.hash_algorithm = Some(hash);
        self
    }
}

/// Options for `PrivateKey::generate`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateOptions {
    /// ECDSA curve (default nistp256)
    #[serde(default = "default_curve")]
    pub curve: Curve,
}

fn default_curve() -> Curve {
    Curve::Nistp256
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.curve = curve;
        self
    }
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            curve: default_curve(),
        }
    }
}
