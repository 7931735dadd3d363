//! Edwards and Montgomery curve primitives
//!
//! Thin wrappers over `ed25519-dalek` and `x25519-dalek` that speak in the
//! raw byte strings stored in key parts:
//! - Ed25519 keypair from a 32-byte seed, or freshly generated
//! - X25519 keypair from a 32-byte scalar
//! - detached ED25519 sign/verify over the NaCl 64-byte secret encoding
//! - NIST curve public points from their private scalar

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroize;

use super::SecureBytes;
use crate::algs::{mp_pad, Curve};
use crate::error::{KeyforgeError, Result};

pub const SEED_LEN: usize = 32;
pub const PUBLIC_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// A raw curve keypair: 32-byte public point and 32-byte secret
pub struct KeyPair {
    /// Seed (ed25519) or scalar (curve25519)
    private_key: SecureBytes,
    public_key: Vec<u8>,
}

impl KeyPair {
    /// Generate a new random Ed25519 keypair
    pub fn generate_ed25519() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key: VerifyingKey = (&signing_key).into();

        Self {
            private_key: SecureBytes::new(signing_key.to_bytes().to_vec()),
            public_key: verifying_key.to_bytes().to_vec(),
        }
    }

    /// Ed25519 keypair from its seed
    pub fn ed25519_from_seed(seed: &[u8]) -> Result<Self> {
        let mut seed_bytes = fixed::<SEED_LEN>(seed, "Ed25519 seed")?;
        let signing_key = SigningKey::from_bytes(&seed_bytes);
        seed_bytes.zeroize();

        Ok(Self {
            private_key: SecureBytes::new(signing_key.to_bytes().to_vec()),
            public_key: signing_key.verifying_key().to_bytes().to_vec(),
        })
    }

    /// X25519 keypair from a secret scalar (clamped by the primitive)
    pub fn x25519_from_scalar(scalar: &[u8]) -> Result<Self> {
        let scalar_bytes = fixed::<SEED_LEN>(scalar, "Curve25519 scalar")?;
        let secret = StaticSecret::from(scalar_bytes);
        let public = X25519PublicKey::from(&secret);

        Ok(Self {
            private_key: SecureBytes::new(scalar_bytes.to_vec()),
            public_key: public.as_bytes().to_vec(),
        })
    }

    pub fn private_key_bytes(&self) -> &[u8] {
        &self.private_key
    }

    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key
    }
}

impl Zeroize for KeyPair {
    fn zeroize(&mut self) {
        self.private_key.zeroize();
        self.public_key.zeroize();
    }
}

impl Drop for KeyPair {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Detached signature using the NaCl secret encoding `seed || public`
pub fn sign_detached(message: &[u8], secret: &[u8]) -> Result<[u8; SIGNATURE_LEN]> {
    let mut keypair = [0u8; 64];
    if secret.len() != keypair.len() {
        return Err(KeyforgeError::InvalidKey(format!(
            "Ed25519 secret key must be 64 bytes, got {}",
            secret.len()
        )));
    }
    keypair.copy_from_slice(secret);
    let signing_key = SigningKey::from_keypair_bytes(&keypair)
        .map_err(|_| KeyforgeError::InvalidKey("Ed25519 seed does not match public key".into()));
    keypair.zeroize();

    Ok(signing_key?.sign(message).to_bytes())
}

/// Returns `Ok(false)` for a well-formed signature that does not verify
pub fn verify_detached(message: &[u8], signature: &[u8], public: &[u8]) -> Result<bool> {
    let public = fixed::<PUBLIC_LEN>(public, "Ed25519 public key")?;
    let verifying_key = VerifyingKey::from_bytes(&public)
        .map_err(|_| KeyforgeError::InvalidKey("invalid Ed25519 public point".into()))?;

    let sig_bytes: [u8; SIGNATURE_LEN] = signature.try_into().map_err(|_| {
        KeyforgeError::malformed(
            "ed25519 signature",
            format!("expected {} bytes, got {}", SIGNATURE_LEN, signature.len()),
        )
    })?;
    let signature = Signature::from_bytes(&sig_bytes);

    Ok(verifying_key.verify(message, &signature).is_ok())
}

/// Uncompressed SEC1 point `d * G` on `curve`
pub fn ec_public_from_scalar(curve: Curve, d: &[u8]) -> Result<Vec<u8>> {
    let mut scalar = mp_pad(d, curve.field_size())?;
    let point = match curve {
        Curve::Nistp256 => p256::SecretKey::from_slice(&scalar)
            .map(|sk| sk.public_key().to_encoded_point(false).as_bytes().to_vec()),
        Curve::Nistp384 => p384::SecretKey::from_slice(&scalar)
            .map(|sk| sk.public_key().to_encoded_point(false).as_bytes().to_vec()),
        Curve::Nistp521 => {
            scalar.zeroize();
            return Err(KeyforgeError::UnsupportedCurve(curve.name().to_string()));
        }
    };
    scalar.zeroize();
    point.map_err(|_| KeyforgeError::InvalidKey(format!("scalar is not valid on {}", curve)))
}

/// Fresh random `(Q, d)` on `curve`
pub fn ec_generate(curve: Curve) -> Result<(Vec<u8>, Vec<u8>)> {
    match curve {
        Curve::Nistp256 => {
            let sk = p256::SecretKey::random(&mut OsRng);
            let q = sk.public_key().to_encoded_point(false).as_bytes().to_vec();
            Ok((q, sk.to_bytes().to_vec()))
        }
        Curve::Nistp384 => {
            let sk = p384::SecretKey::random(&mut OsRng);
            let q = sk.public_key().to_encoded_point(false).as_bytes().to_vec();
            Ok((q, sk.to_bytes().to_vec()))
        }
        Curve::Nistp521 => Err(KeyforgeError::UnsupportedCurve(curve.name().to_string())),
    }
}

fn fixed<const N: usize>(data: &[u8], what: &str) -> Result<[u8; N]> {
    data.try_into().map_err(|_| {
        KeyforgeError::InvalidKey(format!(
            "Invalid {} length: expected {}, got {}",
            what,
            N,
            data.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keypair() {
        let keypair = KeyPair::generate_ed25519();

        assert_eq!(keypair.private_key_bytes().len(), SEED_LEN);
        assert_eq!(keypair.public_key_bytes().len(), PUBLIC_LEN);
    }

    #[test]
    fn test_keypair_from_seed() {
        let original = KeyPair::generate_ed25519();
        let restored = KeyPair::ed25519_from_seed(original.private_key_bytes()).unwrap();

        assert_eq!(restored.public_key_bytes(), original.public_key_bytes());
    }

    #[test]
    fn test_x25519_is_deterministic() {
        let a = KeyPair::x25519_from_scalar(&[7u8; 32]).unwrap();
        let b = KeyPair::x25519_from_scalar(&[7u8; 32]).unwrap();
        assert_eq!(a.public_key_bytes(), b.public_key_bytes());
        assert_eq!(a.private_key_bytes(), &[7u8; 32]);
    }

    #[test]
    fn test_bad_seed_length() {
        assert!(KeyPair::ed25519_from_seed(&[1u8; 31]).is_err());
    }

    #[test]
    fn test_sign_verify_detached() {
        let keypair = KeyPair::generate_ed25519();
        let secret = SecureBytes::concat(&[keypair.private_key_bytes(), keypair.public_key_bytes()]);

        let sig = sign_detached(b"message", &secret).unwrap();
        assert!(verify_detached(b"message", &sig, keypair.public_key_bytes()).unwrap());
        assert!(!verify_detached(b"massage", &sig, keypair.public_key_bytes()).unwrap());
    }

    #[test]
    fn test_ec_public_matches_generated() {
        for curve in [Curve::Nistp256, Curve::Nistp384] {
            let (q, d) = ec_generate(curve).unwrap();
            assert_eq!(q.len(), 1 + 2 * curve.field_size());
            assert_eq!(ec_public_from_scalar(curve, &d).unwrap(), q);
        }
        assert!(ec_generate(Curve::Nistp521).is_err());
    }

    #[test]
    fn test_mismatched_secret_rejected() {
        let a = KeyPair::generate_ed25519();
        let b = KeyPair::generate_ed25519();
        let secret = SecureBytes::concat(&[a.private_key_bytes(), b.public_key_bytes()]);
        assert!(sign_detached(b"m", &secret).is_err());
    }
}
