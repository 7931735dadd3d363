//! Provider-backed signing for RSA, DSA and ECDSA
//!
//! Digests are requested by name the way a platform crypto library names
//! them (`SHA256`, `RSA-SHA256`, ...). Data is hashed incrementally as it
//! arrives; the raw primitive then signs or verifies the prehash.

use dsa::signature::hazmat::{PrehashSigner as _, PrehashVerifier as _};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use tracing::{debug, trace};

use crate::algs::{mp_pad, mp_strip, Algorithm, Curve, HashAlgorithm, Part};
use crate::error::{KeyforgeError, Result};
use crate::signature::Signature;

/// Names the provider knows, as a platform library would register them
const DIGEST_NAMES: &[(&str, HashAlgorithm)] = &[
    ("SHA1", HashAlgorithm::Sha1),
    ("SHA256", HashAlgorithm::Sha256),
    ("SHA384", HashAlgorithm::Sha384),
    ("SHA512", HashAlgorithm::Sha512),
    ("RSA-SHA1", HashAlgorithm::Sha1),
    ("RSA-SHA1-2", HashAlgorithm::Sha1),
    ("RSA-SHA256", HashAlgorithm::Sha256),
    ("RSA-SHA384", HashAlgorithm::Sha384),
    ("RSA-SHA512", HashAlgorithm::Sha512),
];

fn lookup_digest(name: &str) -> Option<HashAlgorithm> {
    DIGEST_NAMES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, h)| *h)
}

/// Resolves a caller's hash name, retrying once with the combined
/// `RSA-` digest+signature name when the plain digest is unknown.
pub fn resolve_digest(hash_algo: &str) -> Result<HashAlgorithm> {
    let name = hash_algo.to_uppercase();
    if let Some(hash) = lookup_digest(&name) {
        return Ok(hash);
    }
    let combined = format!("RSA-{}", name);
    debug!(digest = %name, retry = %combined, "unknown message digest, retrying");
    lookup_digest(&combined).ok_or_else(|| KeyforgeError::InvalidAlgorithm {
        algorithm: hash_algo.to_string(),
    })
}

/// Incremental hash state for one of the supported digests
#[derive(Clone)]
pub(crate) enum DigestState {
    Sha1(Sha1),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl DigestState {
    pub(crate) fn new(hash: HashAlgorithm) -> Self {
        match hash {
            HashAlgorithm::Sha1 => DigestState::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => DigestState::Sha384(Sha384::new()),
            HashAlgorithm::Sha512 => DigestState::Sha512(Sha512::new()),
        }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Sha1(h) => h.update(data),
            DigestState::Sha256(h) => h.update(data),
            DigestState::Sha384(h) => h.update(data),
            DigestState::Sha512(h) => h.update(data),
        }
    }

    /// Digest of everything fed so far; the state keeps accumulating
    pub(crate) fn snapshot(&self) -> Vec<u8> {
        match self.clone() {
            DigestState::Sha1(h) => h.finalize().to_vec(),
            DigestState::Sha256(h) => h.finalize().to_vec(),
            DigestState::Sha384(h) => h.finalize().to_vec(),
            DigestState::Sha512(h) => h.finalize().to_vec(),
        }
    }
}

/// One-shot digest
pub fn digest(hash: HashAlgorithm, data: &[u8]) -> Vec<u8> {
    let mut state = DigestState::new(hash);
    state.update(data);
    state.snapshot()
}

fn rsa_scheme(hash: HashAlgorithm) -> Pkcs1v15Sign {
    match hash {
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
    }
}

fn part<'a>(parts: &'a [Part], name: &str) -> Result<&'a [u8]> {
    parts
        .iter()
        .find(|p| p.name() == name)
        .map(|p| p.data())
        .ok_or_else(|| KeyforgeError::InvalidKey(format!("missing part \"{}\"", name)))
}

fn rsa_uint(parts: &[Part], name: &str) -> Result<rsa::BigUint> {
    Ok(rsa::BigUint::from_bytes_be(part(parts, name)?))
}

fn dsa_uint(parts: &[Part], name: &str) -> Result<dsa::BigUint> {
    Ok(dsa::BigUint::from_bytes_be(part(parts, name)?))
}

fn unsupported_curve(curve: Option<Curve>) -> KeyforgeError {
    KeyforgeError::InvalidAlgorithm {
        algorithm: format!("ecdsa-{}", curve.map(|c| c.name()).unwrap_or("unknown")),
    }
}

fn dsa_verifying_key(parts: &[Part]) -> Result<dsa::VerifyingKey> {
    let components = dsa::Components::from_components(
        dsa_uint(parts, "p")?,
        dsa_uint(parts, "q")?,
        dsa_uint(parts, "g")?,
    )
    .map_err(KeyforgeError::crypto)?;
    dsa::VerifyingKey::from_components(components, dsa_uint(parts, "y")?)
        .map_err(KeyforgeError::crypto)
}

enum SigningMaterial {
    Rsa(Box<RsaPrivateKey>),
    Dsa(Box<dsa::SigningKey>),
    P256(p256::ecdsa::SigningKey),
    P384(p384::ecdsa::SigningKey),
}

impl SigningMaterial {
    fn from_parts(algorithm: Algorithm, curve: Option<Curve>, parts: &[Part]) -> Result<Self> {
        match algorithm {
            Algorithm::Rsa => {
                let key = RsaPrivateKey::from_components(
                    rsa_uint(parts, "n")?,
                    rsa_uint(parts, "e")?,
                    rsa_uint(parts, "d")?,
                    vec![rsa_uint(parts, "p")?, rsa_uint(parts, "q")?],
                )
                .map_err(KeyforgeError::crypto)?;
                Ok(SigningMaterial::Rsa(Box::new(key)))
            }
            Algorithm::Dsa => {
                let key = dsa::SigningKey::from_components(dsa_verifying_key(parts)?, dsa_uint(parts, "x")?)
                    .map_err(KeyforgeError::crypto)?;
                Ok(SigningMaterial::Dsa(Box::new(key)))
            }
            Algorithm::Ecdsa => {
                let d = part(parts, "d")?;
                match curve {
                    Some(c @ Curve::Nistp256) => p256::ecdsa::SigningKey::from_slice(&mp_pad(d, c.field_size())?)
                        .map(SigningMaterial::P256)
                        .map_err(KeyforgeError::crypto),
                    Some(c @ Curve::Nistp384) => p384::ecdsa::SigningKey::from_slice(&mp_pad(d, c.field_size())?)
                        .map(SigningMaterial::P384)
                        .map_err(KeyforgeError::crypto),
                    other => Err(unsupported_curve(other)),
                }
            }
            Algorithm::Ed25519 | Algorithm::Curve25519 => Err(KeyforgeError::InvalidAlgorithm {
                algorithm: algorithm.name().to_string(),
            }),
        }
    }

    /// Signature parts for a prehash
    fn sign_prehash(&self, hash: HashAlgorithm, prehash: &[u8]) -> Result<Vec<Part>> {
        match self {
            SigningMaterial::Rsa(key) => {
                let sig = key.sign(rsa_scheme(hash), prehash).map_err(KeyforgeError::crypto)?;
                Ok(vec![Part::new("sig", sig)])
            }
            SigningMaterial::Dsa(key) => {
                let sig: dsa::Signature = key.sign_prehash(prehash).map_err(KeyforgeError::crypto)?;
                Ok(vec![
                    Part::new("r", sig.r().to_bytes_be()),
                    Part::new("s", sig.s().to_bytes_be()),
                ])
            }
            SigningMaterial::P256(key) => {
                let sig: p256::ecdsa::Signature = key.sign_prehash(prehash).map_err(KeyforgeError::crypto)?;
                Ok(split_scalars(&sig.to_bytes()))
            }
            SigningMaterial::P384(key) => {
                let sig: p384::ecdsa::Signature = key.sign_prehash(prehash).map_err(KeyforgeError::crypto)?;
                Ok(split_scalars(&sig.to_bytes()))
            }
        }
    }
}

fn split_scalars(fixed: &[u8]) -> Vec<Part> {
    let (r, s) = fixed.split_at(fixed.len() / 2);
    vec![Part::new("r", r.to_vec()), Part::new("s", s.to_vec())]
}

fn join_scalars(sig: &Signature, field_size: usize) -> Option<Vec<u8>> {
    let r = mp_pad(sig.part("r")?, field_size).ok()?;
    let s = mp_pad(sig.part("s")?, field_size).ok()?;
    Some([r, s].concat())
}

enum VerifyingMaterial {
    Rsa(Box<RsaPublicKey>),
    Dsa(Box<dsa::VerifyingKey>),
    P256(p256::ecdsa::VerifyingKey),
    P384(p384::ecdsa::VerifyingKey),
}

impl VerifyingMaterial {
    fn from_parts(algorithm: Algorithm, curve: Option<Curve>, parts: &[Part]) -> Result<Self> {
        match algorithm {
            Algorithm::Rsa => RsaPublicKey::new(rsa_uint(parts, "n")?, rsa_uint(parts, "e")?)
                .map(|k| VerifyingMaterial::Rsa(Box::new(k)))
                .map_err(KeyforgeError::crypto),
            Algorithm::Dsa => Ok(VerifyingMaterial::Dsa(Box::new(dsa_verifying_key(parts)?))),
            Algorithm::Ecdsa => {
                let q = part(parts, "Q")?;
                match curve {
                    Some(Curve::Nistp256) => p256::ecdsa::VerifyingKey::from_sec1_bytes(q)
                        .map(VerifyingMaterial::P256)
                        .map_err(KeyforgeError::crypto),
                    Some(Curve::Nistp384) => p384::ecdsa::VerifyingKey::from_sec1_bytes(q)
                        .map(VerifyingMaterial::P384)
                        .map_err(KeyforgeError::crypto),
                    other => Err(unsupported_curve(other)),
                }
            }
            Algorithm::Ed25519 | Algorithm::Curve25519 => Err(KeyforgeError::InvalidAlgorithm {
                algorithm: algorithm.name().to_string(),
            }),
        }
    }

    fn verify_prehash(&self, hash: HashAlgorithm, prehash: &[u8], sig: &Signature) -> bool {
        match self {
            VerifyingMaterial::Rsa(key) => {
                let Some(blob) = sig.part("sig") else {
                    return false;
                };
                let Ok(blob) = mp_pad(blob, key.size()) else {
                    return false;
                };
                key.verify(rsa_scheme(hash), prehash, &blob).is_ok()
            }
            VerifyingMaterial::Dsa(key) => {
                let (Some(r), Some(s)) = (sig.part("r"), sig.part("s")) else {
                    return false;
                };
                let r = dsa::BigUint::from_bytes_be(mp_strip(r));
                let s = dsa::BigUint::from_bytes_be(mp_strip(s));
                match dsa::Signature::from_components(r, s) {
                    Ok(sig) => key.verify_prehash(prehash, &sig).is_ok(),
                    Err(_) => false,
                }
            }
            VerifyingMaterial::P256(key) => join_scalars(sig, Curve::Nistp256.field_size())
                .and_then(|raw| p256::ecdsa::Signature::from_slice(&raw).ok())
                .is_some_and(|sig| key.verify_prehash(prehash, &sig).is_ok()),
            VerifyingMaterial::P384(key) => join_scalars(sig, Curve::Nistp384.field_size())
                .and_then(|raw| p384::ecdsa::Signature::from_slice(&raw).ok())
                .is_some_and(|sig| key.verify_prehash(prehash, &sig).is_ok()),
        }
    }
}

/// Streaming signer over a provider key
pub struct Signer {
    material: SigningMaterial,
    digest: DigestState,
    hash: HashAlgorithm,
    algorithm: Algorithm,
    curve: Option<Curve>,
}

impl Signer {
    pub(crate) fn new(
        algorithm: Algorithm,
        curve: Option<Curve>,
        parts: &[Part],
        hash_algo: &str,
    ) -> Result<Self> {
        let hash = resolve_digest(hash_algo)?;
        let material = SigningMaterial::from_parts(algorithm, curve, parts)?;
        trace!(%algorithm, %hash, "provider signer ready");
        Ok(Self {
            material,
            digest: DigestState::new(hash),
            hash,
            algorithm,
            curve,
        })
    }

    pub fn update(&mut self, chunk: impl AsRef<[u8]>) {
        self.digest.update(chunk.as_ref());
    }

    /// Signs everything fed so far
    pub fn sign(&mut self) -> Result<Signature> {
        let prehash = self.digest.snapshot();
        let parts = self.material.sign_prehash(self.hash, &prehash)?;
        Signature::from_parts(self.algorithm, parts)
            .map(|sig| sig.with_hash_algorithm(self.hash).with_curve(self.curve))
    }
}

/// Streaming verifier over a provider public key
pub struct Verifier {
    material: VerifyingMaterial,
    digest: DigestState,
    hash: HashAlgorithm,
    algorithm: Algorithm,
    curve: Option<Curve>,
}

impl Verifier {
    pub(crate) fn new(
        algorithm: Algorithm,
        curve: Option<Curve>,
        parts: &[Part],
        hash_algo: &str,
    ) -> Result<Self> {
        let hash = resolve_digest(hash_algo)?;
        let material = VerifyingMaterial::from_parts(algorithm, curve, parts)?;
        Ok(Self {
            material,
            digest: DigestState::new(hash),
            hash,
            algorithm,
            curve,
        })
    }

    pub fn update(&mut self, chunk: impl AsRef<[u8]>) {
        self.digest.update(chunk.as_ref());
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// False for a signature of another algorithm, hash or curve
    pub fn verify(&self, signature: &Signature) -> bool {
        if signature.algorithm() != self.algorithm {
            return false;
        }
        if signature.hash_algorithm().is_some_and(|h| h != self.hash) {
            return false;
        }
        if self.algorithm == Algorithm::Ecdsa
            && signature.curve().is_some()
            && signature.curve() != self.curve
        {
            return false;
        }
        let prehash = self.digest.snapshot();
        self.material.verify_prehash(self.hash, &prehash, signature)
    }
}
