//! Public and private keys
//!
//! A key is an algorithm tag plus the ordered parts the algorithm registry
//! declares for it. Nothing here knows any file format: reading and writing
//! go through `formats`, signing through `crypto`.

mod generate;
mod private;

use std::fmt;

use tracing::trace;
use zeroize::Zeroize;

pub use private::PrivateKey;

use crate::algs::{mp_normalize, mp_strip, unpad_32, Algorithm, Curve, HashAlgorithm, Part};
use crate::config::{ParseOptions, WriteOptions};
use crate::crypto::{digest, ed_compat, provider, Verifier};
use crate::error::{KeyforgeError, Result};
use crate::fingerprint::Fingerprint;
use crate::formats::{self, Format, KeyRef, NameContext};
use crate::version::{is_compatible, ApiVersion, Kind, Marker, Tagged};

/// Orders `parts` as `names` declares them and normalizes each value.
/// The input is zeroized once copied.
pub(crate) fn arrange_parts(
    algorithm: Algorithm,
    names: &[&str],
    mut parts: Vec<Part>,
) -> Result<(Vec<Part>, Option<Curve>)> {
    let arranged = arrange(algorithm, names, &parts);
    parts.zeroize();
    let arranged = arranged?;

    let curve = match algorithm {
        Algorithm::Ecdsa => {
            let name = arranged
                .iter()
                .find(|p| p.name() == "curve")
                .map(|p| String::from_utf8_lossy(p.data()).into_owned())
                .unwrap_or_default();
            Some(name.parse::<Curve>()?)
        }
        _ => None,
    };
    Ok((arranged, curve))
}

fn arrange(algorithm: Algorithm, names: &[&str], parts: &[Part]) -> Result<Vec<Part>> {
    if let Some(extra) = parts.iter().find(|p| !names.contains(&p.name())) {
        return Err(KeyforgeError::InvalidKey(format!(
            "{} key has unexpected part \"{}\"",
            algorithm,
            extra.name()
        )));
    }
    names
        .iter()
        .map(|name| {
            let part = parts.iter().find(|p| p.name() == *name).ok_or_else(|| {
                KeyforgeError::InvalidKey(format!("{} key is missing part \"{}\"", algorithm, name))
            })?;
            normalize_part(algorithm, part)
        })
        .collect()
}

fn normalize_part(algorithm: Algorithm, part: &Part) -> Result<Part> {
    let data = match algorithm {
        Algorithm::Ed25519 | Algorithm::Curve25519 => {
            let data = unpad_32(part.data());
            if data.len() != 32 {
                return Err(KeyforgeError::InvalidKey(format!(
                    "{} part \"{}\" must be 32 bytes, got {}",
                    algorithm,
                    part.name(),
                    data.len()
                )));
            }
            data.to_vec()
        }
        _ if algorithm.is_integer_part(part.name()) => mp_normalize(part.data()),
        _ => part.data().to_vec(),
    };
    let normalized = Part::new(part.name(), data);
    Ok(match part.tag() {
        Some(tag) => normalized.with_tag(tag),
        None => normalized,
    })
}

/// Size in bits of the algorithm's size part
pub(crate) fn key_bits(algorithm: Algorithm, curve: Option<Curve>, parts: &[Part]) -> u32 {
    match (algorithm, curve) {
        (Algorithm::Ecdsa, Some(curve)) => curve.bits(),
        (Algorithm::Ed25519 | Algorithm::Curve25519, _) => 256,
        _ => {
            let data = parts
                .iter()
                .find(|p| p.name() == algorithm.size_part())
                .map(|p| mp_strip(p.data()))
                .unwrap_or_default();
            match data.first() {
                Some(&first) => data.len() as u32 * 8 - first.leading_zeros(),
                None => 0,
            }
        }
    }
}

pub(crate) fn default_hash(algorithm: Algorithm, curve: Option<Curve>) -> HashAlgorithm {
    match (algorithm, curve) {
        (Algorithm::Dsa, _) => HashAlgorithm::Sha1,
        (Algorithm::Rsa, _) => HashAlgorithm::Sha256,
        (Algorithm::Ecdsa, Some(Curve::Nistp384)) => HashAlgorithm::Sha384,
        (Algorithm::Ecdsa, Some(Curve::Nistp521)) => HashAlgorithm::Sha512,
        (Algorithm::Ecdsa, _) => HashAlgorithm::Sha256,
        (Algorithm::Ed25519 | Algorithm::Curve25519, _) => HashAlgorithm::Sha512,
    }
}

/// Wraps a codec failure for the caller. The passphrase case stays as is.
pub(crate) fn wrap_parse_error(err: KeyforgeError, name: &str, format: &str) -> KeyforgeError {
    match err {
        KeyforgeError::KeyEncrypted { .. } => err,
        other => KeyforgeError::KeyParse {
            name: name.to_string(),
            format: format.to_string(),
            source: Box::new(other),
        },
    }
}

/// A public key
#[derive(Debug, Clone)]
pub struct Key {
    algorithm: Algorithm,
    parts: Vec<Part>,
    curve: Option<Curve>,
    comment: Option<String>,
}

impl Key {
    /// Format used when none is named
    pub const DEFAULT_FORMAT: &'static str = "ssh";

    pub fn new(algorithm: Algorithm, parts: Vec<Part>) -> Result<Self> {
        let (parts, curve) = arrange_parts(algorithm, algorithm.public_parts(), parts)?;
        Ok(Self {
            algorithm,
            parts,
            curve,
            comment: None,
        })
    }

    /// Parts already arranged and normalized
    pub(crate) fn from_arranged(
        algorithm: Algorithm,
        parts: Vec<Part>,
        curve: Option<Curve>,
        comment: Option<String>,
    ) -> Self {
        Self {
            algorithm,
            parts,
            curve,
            comment,
        }
    }

    /// True for any key (private keys included) from a build at API
    /// `version` or later
    pub fn is_key(obj: &dyn Tagged, version: ApiVersion) -> bool {
        is_compatible(obj, Kind::Key, version)
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.iter().find(|p| p.name() == name).map(|p| p.data())
    }

    pub fn curve(&self) -> Option<Curve> {
        self.curve
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    /// Key size in bits
    pub fn size(&self) -> u32 {
        key_bits(self.algorithm, self.curve, &self.parts)
    }

    pub fn default_hash_algorithm(&self) -> HashAlgorithm {
        default_hash(self.algorithm, self.curve)
    }

    /// Digest of the RFC 4253 public blob
    pub fn hash(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        let blob = formats::rfc4253::write_public(self)?;
        Ok(digest(algorithm, &blob))
    }

    pub fn fingerprint(&self, algorithm: HashAlgorithm) -> Result<Fingerprint> {
        Ok(Fingerprint::new(algorithm, self.hash(algorithm)?))
    }

    /// Encodes the key in the named format (see [`Key::DEFAULT_FORMAT`])
    pub fn to_buffer(&self, format: &str, options: &WriteOptions) -> Result<Vec<u8>> {
        let format = Format::from_name(format, NameContext::Public)?;
        formats::write(KeyRef::Public(self), format, options)
    }

    pub fn create_verify(&self, hash_algo: &str) -> Result<Verifier> {
        match self.algorithm {
            Algorithm::Ed25519 => {
                let public = self.require_part("A")?;
                Ok(Verifier::Ed25519(ed_compat::Verifier::new(public, hash_algo)?))
            }
            Algorithm::Curve25519 => Err(KeyforgeError::NotSigningKey),
            algorithm => {
                trace!(%algorithm, hash = hash_algo, "provider verifier");
                Ok(Verifier::Provider(provider::Verifier::new(
                    algorithm,
                    self.curve,
                    &self.parts,
                    hash_algo,
                )?))
            }
        }
    }

    pub(crate) fn require_part(&self, name: &str) -> Result<&[u8]> {
        self.part(name)
            .ok_or_else(|| KeyforgeError::InvalidKey(format!("missing part \"{}\"", name)))
    }

    /// Parses a public key. Private-key input yields its public half.
    ///
    /// A bare string for `options` is taken as the filename. Failures are
    /// wrapped in [`KeyforgeError::KeyParse`] except
    /// [`KeyforgeError::KeyEncrypted`], which is returned as is.
    pub fn parse(data: impl AsRef<[u8]>, format: &str, options: impl Into<ParseOptions>) -> Result<Key> {
        let options = options.into();
        let resolved = Format::from_name(format, NameContext::Public)?;
        let mut key = formats::read(data.as_ref(), resolved, &options)
            .map(formats::ParsedKey::into_public)
            .map_err(|err| wrap_parse_error(err, options.name(), format))?;
        if key.comment.is_none() {
            key.comment = Some(options.name().to_string());
        }
        Ok(key)
    }
}

/// Same algorithm and parts; comments are not compared
impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.parts == other.parts
    }
}

impl Eq for Key {}

impl Tagged for Key {
    fn marker(&self) -> Marker {
        Marker {
            kind: Kind::Key,
            version: ApiVersion::KEY,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match formats::ssh::write_line(self, self.comment.as_deref()) {
            Ok(line) => f.write_str(&line),
            Err(_) => Err(fmt::Error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ed25519_key() -> Key {
        Key::new(Algorithm::Ed25519, vec![Part::new("A", vec![9u8; 32])]).unwrap()
    }

    #[test]
    fn test_parts_reordered_and_normalized() {
        let key = Key::new(
            Algorithm::Rsa,
            vec![
                Part::new("n", vec![0, 0, 0xc1, 0x02]),
                Part::new("e", vec![0x01, 0x00, 0x01]),
            ],
        )
        .unwrap();
        let names: Vec<_> = key.parts().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["e", "n"]);
        assert_eq!(key.part("n").unwrap(), &[0, 0xc1, 0x02]);
        assert_eq!(key.size(), 16);
    }

    #[test]
    fn test_missing_and_extra_parts_rejected() {
        assert!(Key::new(Algorithm::Rsa, vec![Part::new("e", vec![3])]).is_err());
        assert!(Key::new(
            Algorithm::Ed25519,
            vec![Part::new("A", vec![1u8; 32]), Part::new("k", vec![1u8; 32])]
        )
        .is_err());
    }

    #[test]
    fn test_25519_parts_unpadded() {
        let mut padded = vec![0u8];
        padded.extend_from_slice(&[0xffu8; 32]);
        let key = Key::new(Algorithm::Curve25519, vec![Part::new("A", padded)]).unwrap();
        assert_eq!(key.part("A").unwrap().len(), 32);

        assert!(Key::new(Algorithm::Ed25519, vec![Part::new("A", vec![1u8; 31])]).is_err());
    }

    #[test]
    fn test_ecdsa_curve_from_part() {
        let mut q = vec![4u8];
        q.extend_from_slice(&[1u8; 64]);
        let key = Key::new(
            Algorithm::Ecdsa,
            vec![Part::new("curve", "nistp256"), Part::new("Q", q)],
        )
        .unwrap();
        assert_eq!(key.curve(), Some(Curve::Nistp256));
        assert_eq!(key.size(), 256);
        assert_eq!(key.default_hash_algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn test_curve25519_cannot_verify() {
        let key = Key::new(Algorithm::Curve25519, vec![Part::new("A", vec![2u8; 32])]).unwrap();
        assert!(matches!(key.create_verify("sha512"), Err(KeyforgeError::NotSigningKey)));
    }

    #[test]
    fn test_marker() {
        let key = ed25519_key();
        assert!(is_compatible(&key, Kind::Key, ApiVersion(1, 0)));
        assert!(!is_compatible(&key, Kind::PrivateKey, ApiVersion(1, 0)));
        assert!(Key::is_key(&key, ApiVersion(1, 7)));
        assert!(!Key::is_key(&key, ApiVersion(2, 0)));
    }

    #[test]
    fn test_wrap_keeps_encrypted() {
        let encrypted = KeyforgeError::KeyEncrypted {
            name: "a".into(),
            format: "pkcs8".into(),
        };
        assert!(wrap_parse_error(encrypted, "a", "auto").is_encrypted());
        assert!(matches!(
            wrap_parse_error(KeyforgeError::Detection, "a", "auto"),
            KeyforgeError::KeyParse { .. }
        ));
    }
}
