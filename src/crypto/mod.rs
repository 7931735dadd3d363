//! Cryptographic back ends
//!
//! This module provides:
//! - Ed25519 / X25519 primitives over raw key parts
//! - The ED25519 buffering signer and verifier
//! - Provider-backed streaming signing for RSA, DSA and ECDSA
//! - Secure memory handling with automatic zeroing

pub mod ed_compat;
pub(crate) mod keys;
pub mod provider;
mod secure_bytes;

use base64::{engine::general_purpose::STANDARD, Engine as _};

pub use keys::KeyPair;
pub use provider::{digest, resolve_digest};
pub use secure_bytes::SecureBytes;

use crate::algs::Algorithm;
use crate::error::{KeyforgeError, Result};
use crate::signature::{Signature, SignatureEncoding, SignatureInput};
use crate::version::ApiVersion;

/// Streaming signer returned by `PrivateKey::create_sign`
pub enum Signer {
    Ed25519(ed_compat::Signer),
    Provider(provider::Signer),
}

impl Signer {
    pub fn update(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        match self {
            Signer::Ed25519(s) => s.update(chunk),
            Signer::Provider(s) => s.update(chunk),
        }
        self
    }

    /// Signs everything fed so far
    pub fn sign(&mut self) -> Result<Signature> {
        match self {
            Signer::Ed25519(s) => s.sign(),
            Signer::Provider(s) => s.sign(),
        }
    }
}

/// Streaming verifier returned by `Key::create_verify`
pub enum Verifier {
    Ed25519(ed_compat::Verifier),
    Provider(provider::Verifier),
}

impl Verifier {
    pub fn update(&mut self, chunk: impl AsRef<[u8]>) -> &mut Self {
        match self {
            Verifier::Ed25519(v) => v.update(chunk),
            Verifier::Provider(v) => v.update(chunk),
        }
        self
    }

    /// Checks a signature over everything fed so far.
    ///
    /// Byte inputs are decoded with `encoding`. Text inputs are too, except
    /// for ED25519, which takes text as the raw signature. A non-matching signature is `Ok(false)`; only
    /// undecodable input is an error.
    pub fn verify<'a>(
        &self,
        signature: impl Into<SignatureInput<'a>>,
        encoding: SignatureEncoding,
    ) -> Result<bool> {
        let signature = signature.into();
        match self {
            Verifier::Ed25519(v) => v.verify(signature, encoding),
            Verifier::Provider(v) => {
                let parsed;
                let sig = match signature {
                    SignatureInput::Signature(sig) => {
                        if sig.version() < ApiVersion(2, 0) {
                            return Err(KeyforgeError::SignatureTooOld);
                        }
                        sig
                    }
                    SignatureInput::Base64(text) => {
                        let bytes = STANDARD.decode(text.trim())?;
                        parsed = Signature::parse(&bytes, v.algorithm(), encoding)?;
                        &parsed
                    }
                    SignatureInput::Bytes(bytes) => {
                        parsed = Signature::parse(bytes, v.algorithm(), encoding)?;
                        &parsed
                    }
                };
                Ok(v.verify(sig))
            }
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Verifier::Ed25519(_) => Algorithm::Ed25519,
            Verifier::Provider(v) => v.algorithm(),
        }
    }
}
