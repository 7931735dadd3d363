//! ED25519 signing outside the digest provider
//!
//! The provider streams data through a named digest and signs the result;
//! ED25519 instead signs the whole message with its own fixed SHA-512, so
//! these sinks only buffer what they are fed and hand the complete message
//! to the primitive when finalized.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::keys;
use super::SecureBytes;
use crate::algs::{Algorithm, HashAlgorithm, Part};
use crate::error::{KeyforgeError, Result};
use crate::signature::{Signature, SignatureEncoding, SignatureInput};
use crate::version::ApiVersion;

/// Oldest signature API whose values can be verified
const MIN_SIGNATURE_VERSION: ApiVersion = ApiVersion(2, 0);

fn require_sha512(hash_algo: &str) -> Result<()> {
    if hash_algo.to_lowercase() != "sha512" {
        return Err(KeyforgeError::Ed25519HashRequired(hash_algo.to_string()));
    }
    Ok(())
}

/// Buffers the message and signs it with `k || A`
pub struct Signer {
    secret: SecureBytes,
    message: Vec<u8>,
}

impl Signer {
    pub fn new(seed: &[u8], public: &[u8], hash_algo: &str) -> Result<Self> {
        require_sha512(hash_algo)?;
        Ok(Self {
            secret: SecureBytes::concat(&[seed, public]),
            message: Vec::new(),
        })
    }

    /// Strings are appended as their UTF-8 bytes, so non-ASCII text signs
    /// differently from a latin1 encoder
    pub fn update(&mut self, chunk: impl AsRef<[u8]>) {
        self.message.extend_from_slice(chunk.as_ref());
    }

    pub fn sign(&self) -> Result<Signature> {
        let sig = keys::sign_detached(&self.message, &self.secret)?;
        Signature::from_parts(Algorithm::Ed25519, vec![Part::new("sig", sig.to_vec())])
            .map(|s| s.with_hash_algorithm(HashAlgorithm::Sha512))
    }
}

/// Buffers the message and checks a detached signature over it
pub struct Verifier {
    public: Vec<u8>,
    message: Vec<u8>,
}

impl Verifier {
    pub fn new(public: &[u8], hash_algo: &str) -> Result<Self> {
        require_sha512(hash_algo)?;
        Ok(Self {
            public: public.to_vec(),
            message: Vec::new(),
        })
    }

    /// Strings are appended as their UTF-8 bytes, as in [`Signer::update`]
    pub fn update(&mut self, chunk: impl AsRef<[u8]>) {
        self.message.extend_from_slice(chunk.as_ref());
    }

    /// `Ok(false)` for a signature that does not match, or that belongs to
    /// another algorithm. Bytes are decoded with `encoding`; base64 text is
    /// always the raw 64-byte signature.
    pub fn verify(&self, signature: SignatureInput<'_>, encoding: SignatureEncoding) -> Result<bool> {
        let raw = match signature {
            SignatureInput::Signature(sig) => {
                if sig.version() < MIN_SIGNATURE_VERSION {
                    return Err(KeyforgeError::SignatureTooOld);
                }
                if sig.algorithm() != Algorithm::Ed25519 {
                    return Ok(false);
                }
                sig.to_bytes(SignatureEncoding::Raw)?
            }
            SignatureInput::Base64(text) => STANDARD.decode(text.trim())?,
            SignatureInput::Bytes(bytes) => {
                Signature::parse(bytes, Algorithm::Ed25519, encoding)?.to_bytes(SignatureEncoding::Raw)?
            }
        };
        keys::verify_detached(&self.message, &raw, &self.public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    fn pair() -> (Signer, Verifier) {
        let kp = KeyPair::generate_ed25519();
        let signer = Signer::new(kp.private_key_bytes(), kp.public_key_bytes(), "sha512").unwrap();
        let verifier = Verifier::new(kp.public_key_bytes(), "SHA512").unwrap();
        (signer, verifier)
    }

    #[test]
    fn test_sign_then_verify() {
        let (mut signer, mut verifier) = pair();
        signer.update("hello ");
        signer.update(b"world");
        let sig = signer.sign().unwrap();
        assert_eq!(sig.algorithm(), Algorithm::Ed25519);
        assert_eq!(sig.hash_algorithm(), Some(HashAlgorithm::Sha512));

        verifier.update(b"hello world");
        assert!(verifier.verify(SignatureInput::Signature(&sig), SignatureEncoding::Raw).unwrap());

        let text = STANDARD.encode(sig.to_bytes(SignatureEncoding::Raw).unwrap());
        assert!(verifier.verify(SignatureInput::Base64(&text), SignatureEncoding::Raw).unwrap());
    }

    #[test]
    fn test_flipped_bit_is_false() {
        let (mut signer, mut verifier) = pair();
        signer.update(b"payload");
        let mut raw = signer.sign().unwrap().to_bytes(SignatureEncoding::Raw).unwrap();
        raw[10] ^= 0x01;

        verifier.update(b"payload");
        assert!(!verifier.verify(SignatureInput::Bytes(&raw), SignatureEncoding::Raw).unwrap());
    }

    #[test]
    fn test_other_message_is_false() {
        let (mut signer, mut verifier) = pair();
        signer.update(b"payload");
        let sig = signer.sign().unwrap();

        verifier.update(b"paylaod");
        assert!(!verifier.verify(SignatureInput::Signature(&sig), SignatureEncoding::Raw).unwrap());
    }

    #[test]
    fn test_other_algorithm_is_false() {
        let (_, verifier) = pair();
        let sig = Signature::from_parts(Algorithm::Rsa, vec![Part::new("sig", vec![1u8; 64])]).unwrap();
        assert!(!verifier.verify(SignatureInput::Signature(&sig), SignatureEncoding::Raw).unwrap());
    }

    #[test]
    fn test_wrong_hash_rejected() {
        let kp = KeyPair::generate_ed25519();
        for hash in ["sha256", "SHA1", "sha-512"] {
            assert!(matches!(
                Signer::new(kp.private_key_bytes(), kp.public_key_bytes(), hash),
                Err(KeyforgeError::Ed25519HashRequired(_))
            ));
            assert!(Verifier::new(kp.public_key_bytes(), hash).is_err());
        }
    }

    #[test]
    fn test_old_signature_refused() {
        let (mut signer, verifier) = pair();
        signer.update(b"m");
        let sig = signer.sign().unwrap();
        let mut value = serde_json::to_value(&sig).unwrap();
        value["version"] = serde_json::json!([1, 4]);
        let old: Signature = serde_json::from_value(value).unwrap();

        assert!(matches!(
            verifier.verify(SignatureInput::Signature(&old), SignatureEncoding::Raw),
            Err(KeyforgeError::SignatureTooOld)
        ));
    }

    #[test]
    fn test_text_is_signed_as_utf8() {
        let kp = KeyPair::generate_ed25519();
        let mut text = Signer::new(kp.private_key_bytes(), kp.public_key_bytes(), "sha512").unwrap();
        text.update("h\u{e9}llo");
        let mut bytes = Signer::new(kp.private_key_bytes(), kp.public_key_bytes(), "sha512").unwrap();
        bytes.update([0x68, 0xc3, 0xa9, 0x6c, 0x6c, 0x6f]);
        assert_eq!(text.sign().unwrap(), bytes.sign().unwrap());
    }

    #[test]
    fn test_bytes_follow_encoding() {
        let (mut signer, mut verifier) = pair();
        signer.update(b"payload");
        let sig = signer.sign().unwrap();
        verifier.update(b"payload");

        for encoding in [SignatureEncoding::Ssh, SignatureEncoding::Asn1, SignatureEncoding::Raw] {
            let bytes = sig.to_bytes(encoding).unwrap();
            assert!(verifier.verify(SignatureInput::Bytes(&bytes), encoding).unwrap(), "{encoding}");
        }

        let ssh = sig.to_bytes(SignatureEncoding::Ssh).unwrap();
        assert!(matches!(
            verifier.verify(SignatureInput::Bytes(&ssh), SignatureEncoding::Raw),
            Err(KeyforgeError::SignatureParse { .. })
        ));
    }

    #[test]
    fn test_short_signature_is_an_error() {
        let (_, verifier) = pair();
        assert!(verifier.verify(SignatureInput::Bytes(&[0u8; 10]), SignatureEncoding::Raw).is_err());
    }
}
