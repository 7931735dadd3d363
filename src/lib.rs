//! keyforge - SSH, PKCS, PuTTY and DNSSEC key handling
//!
//! This crate provides:
//! - Parsing of public and private keys from every supported format, with
//!   content-based format detection
//! - Writing keys back out in any format that can express them
//! - Fingerprints, streaming signers and verifiers
//! - Conversion between the ED25519 and Curve25519 forms of one secret
//!
//! ```no_run
//! use keyforge::{Key, ParseOptions};
//!
//! let data = std::fs::read("id_ed25519.pub")?;
//! let key = Key::parse(&data, "auto", ParseOptions::new().with_filename("id_ed25519.pub"))?;
//! println!("{}", key.fingerprint(keyforge::HashAlgorithm::Sha256)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod algs;
pub mod config;
pub mod crypto;
pub mod error;
pub mod fingerprint;
pub mod formats;
pub mod key;
pub mod signature;
pub mod version;
pub mod wire;

pub use algs::{Algorithm, Curve, HashAlgorithm, Part};
pub use config::{GenerateOptions, ParseOptions, WriteOptions};
pub use crypto::{Signer, Verifier};
pub use error::{KeyforgeError, Result};
pub use fingerprint::{Fingerprint, FingerprintEncoding};
pub use formats::{Format, ParsedKey};
pub use key::{Key, PrivateKey};
pub use signature::{Signature, SignatureEncoding};
pub use version::{is_compatible, ApiVersion, Kind, Tagged};
pub use wire::WireBuffer;
