use std::sync::OnceLock;

use tracing::debug;
use zeroize::Zeroize;

use super::{arrange_parts, default_hash, key_bits, wrap_parse_error, Key};
use crate::algs::{Algorithm, Curve, HashAlgorithm, Part};
use crate::config::{ParseOptions, WriteOptions};
use crate::crypto::{ed_compat, provider, KeyPair, Signer, Verifier};
use crate::error::{KeyforgeError, Result};
use crate::fingerprint::Fingerprint;
use crate::formats::{self, Format, KeyRef, NameContext, ParsedKey};
use crate::version::{is_compatible, ApiVersion, Kind, Marker, Tagged};

/// A private key. Its parts are wiped when it is dropped.
#[derive(Debug, Clone)]
pub struct PrivateKey {
    algorithm: Algorithm,
    parts: Vec<Part>,
    curve: Option<Curve>,
    comment: Option<String>,
    public: OnceLock<Key>,
}

impl PrivateKey {
    /// Format used when none is named
    pub const DEFAULT_FORMAT: &'static str = "pkcs1";

    pub fn new(algorithm: Algorithm, parts: Vec<Part>) -> Result<Self> {
        let (parts, curve) = arrange_parts(algorithm, algorithm.private_parts(), parts)?;
        Ok(Self {
            algorithm,
            parts,
            curve,
            comment: None,
            public: OnceLock::new(),
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.set_comment(comment);
        self
    }

    /// True for any private key from a build at API `version` or later
    pub fn is_private_key(obj: &dyn Tagged, version: ApiVersion) -> bool {
        is_compatible(obj, Kind::PrivateKey, version)
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

    pub(crate) fn require_part(&self, name: &str) -> Result<&[u8]> {
        self.part(name)
            .ok_or_else(|| KeyforgeError::InvalidKey(format!("missing part \"{}\"", name)))
    }

    pub fn curve(&self) -> Option<Curve> {
        self.curve
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Also updates an already computed public half
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        if let Some(public) = self.public.get_mut() {
            public.set_comment(comment.clone());
        }
        self.comment = Some(comment);
    }

    /// The public half. Computed on first use; later calls return the same
    /// instance.
    pub fn to_public(&self) -> &Key {
        self.public.get_or_init(|| {
            let parts = self
                .algorithm
                .public_parts()
                .iter()
                .filter_map(|name| self.parts.iter().find(|p| p.name() == *name).cloned())
                .collect();
            Key::from_arranged(self.algorithm, parts, self.curve, self.comment.clone())
        })
    }

    pub fn size(&self) -> u32 {
        key_bits(self.algorithm, self.curve, &self.parts)
    }

    pub fn default_hash_algorithm(&self) -> HashAlgorithm {
        default_hash(self.algorithm, self.curve)
    }

    pub fn hash(&self, algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        self.to_public().hash(algorithm)
    }

    pub fn fingerprint(&self, algorithm: HashAlgorithm) -> Result<Fingerprint> {
        self.to_public().fingerprint(algorithm)
    }

    /// Encodes the key in the named format (see [`PrivateKey::DEFAULT_FORMAT`])
    pub fn to_buffer(&self, format: &str, options: &WriteOptions) -> Result<Vec<u8>> {
        let format = Format::from_name(format, NameContext::Private)?;
        formats::write(KeyRef::Private(self), format, options)
    }

    /// Converts between the two Curve25519 forms that share a secret.
    ///
    /// The ED25519 seed is used directly as the X25519 scalar and vice versa.
    pub fn derive(&self, to: Algorithm) -> Result<PrivateKey> {
        let pair = match (self.algorithm, to) {
            (Algorithm::Ed25519, Algorithm::Curve25519) => {
                KeyPair::x25519_from_scalar(self.require_part("k")?)?
            }
            (Algorithm::Curve25519, Algorithm::Ed25519) => {
                KeyPair::ed25519_from_seed(self.require_part("k")?)?
            }
            (from, to) => {
                return Err(KeyforgeError::UnsupportedConversion {
                    from: from.name().to_string(),
                    to: to.name().to_string(),
                })
            }
        };
        debug!(from = %self.algorithm, %to, "derived key");

        let derived = PrivateKey::new(
            to,
            vec![
                Part::new("A", pair.public_key_bytes()),
                Part::new("k", pair.private_key_bytes()),
            ],
        )?;
        Ok(match &self.comment {
            Some(comment) => derived.with_comment(comment.clone()),
            None => derived,
        })
    }

    /// Streaming signer for `hash_algo` (e.g. `"sha256"`)
    pub fn create_sign(&self, hash_algo: &str) -> Result<Signer> {
        match self.algorithm {
            Algorithm::Ed25519 => Ok(Signer::Ed25519(ed_compat::Signer::new(
                self.require_part("k")?,
                self.require_part("A")?,
                hash_algo,
            )?)),
            Algorithm::Curve25519 => Err(KeyforgeError::NotSigningKey),
            algorithm => Ok(Signer::Provider(provider::Signer::new(
                algorithm,
                self.curve,
                &self.parts,
                hash_algo,
            )?)),
        }
    }

    pub fn create_verify(&self, hash_algo: &str) -> Result<Verifier> {
        self.to_public().create_verify(hash_algo)
    }

    /// Parses a private key.
    ///
    /// A bare string for `options` is taken as the filename. Public-only
    /// input is an error. Failures are wrapped in
    /// [`KeyforgeError::KeyParse`] except [`KeyforgeError::KeyEncrypted`],
    /// which is returned as is.
    pub fn parse(
        data: impl AsRef<[u8]>,
        format: &str,
        options: impl Into<ParseOptions>,
    ) -> Result<PrivateKey> {
        let options = options.into();
        let resolved = Format::from_name(format, NameContext::Private)?;
        let mut key = formats::read(data.as_ref(), resolved, &options)
            .and_then(ParsedKey::into_private)
            .map_err(|err| wrap_parse_error(err, options.name(), format))?;
        if key.comment.is_none() {
            key.set_comment(options.name());
        }
        Ok(key)
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.parts.zeroize();
    }
}

impl Tagged for PrivateKey {
    fn marker(&self) -> Marker {
        Marker {
            kind: Kind::PrivateKey,
            version: ApiVersion::PRIVATE_KEY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerateOptions;

    #[test]
    fn test_to_public_is_cached() {
        let key = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default()).unwrap();
        let first = key.to_public();
        let second = key.to_public();
        assert!(std::ptr::eq(first, second));

        let names: Vec<_> = first.parts().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["A"]);
    }

    #[test]
    fn test_public_parts_follow_declared_order() {
        let key = PrivateKey::new(
            Algorithm::Rsa,
            ["n", "e", "d", "iqmp", "p", "q"]
                .iter()
                .map(|name| Part::new(*name, vec![0x11, 0x22]))
                .collect(),
        )
        .unwrap();
        let names: Vec<_> = key.to_public().parts().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["e", "n"]);
    }

    #[test]
    fn test_comment_propagates() {
        let mut key = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default())
            .unwrap()
            .with_comment("alice@host");
        assert_eq!(key.to_public().comment(), Some("alice@host"));

        key.set_comment("bob@host");
        assert_eq!(key.to_public().comment(), Some("bob@host"));
    }

    #[test]
    fn test_derive_round_trip_shapes() {
        let ed = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default()).unwrap();
        let x = ed.derive(Algorithm::Curve25519).unwrap();
        assert_eq!(x.algorithm(), Algorithm::Curve25519);
        for part in x.parts() {
            assert_eq!(part.data().len(), 32, "{}", part.name());
        }

        let back = x.derive(Algorithm::Ed25519).unwrap();
        assert_eq!(back.algorithm(), Algorithm::Ed25519);
        for part in back.parts() {
            assert_eq!(part.data().len(), 32, "{}", part.name());
        }
    }

    #[test]
    fn test_derive_uses_seed_as_scalar() {
        let ed = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default()).unwrap();
        let x = KeyPair::x25519_from_scalar(ed.part("k").unwrap()).unwrap();
        let derived = ed.derive(Algorithm::Curve25519).unwrap();
        assert_eq!(derived.part("A").unwrap(), x.public_key_bytes());
        assert_eq!(derived.part("k"), ed.part("k"));
    }

    #[test]
    fn test_unsupported_derive() {
        let ec = PrivateKey::generate(Algorithm::Ecdsa, &GenerateOptions::default()).unwrap();
        for to in [Algorithm::Ed25519, Algorithm::Curve25519, Algorithm::Rsa] {
            match ec.derive(to) {
                Err(KeyforgeError::UnsupportedConversion { from, to: target }) => {
                    assert_eq!(from, "ecdsa");
                    assert_eq!(target, to.name());
                }
                other => panic!("unexpected result for {to}: {other:?}"),
            }
        }

        let ed = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default()).unwrap();
        assert!(matches!(
            ed.derive(Algorithm::Ed25519),
            Err(KeyforgeError::UnsupportedConversion { .. })
        ));
    }

    #[test]
    fn test_curve25519_cannot_sign() {
        let ed = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default()).unwrap();
        let x = ed.derive(Algorithm::Curve25519).unwrap();
        assert!(matches!(x.create_sign("sha512"), Err(KeyforgeError::NotSigningKey)));
    }

    #[test]
    fn test_ecdsa_sign_verify() {
        let key = PrivateKey::generate(Algorithm::Ecdsa, &GenerateOptions::default()).unwrap();
        let mut signer = key.create_sign("sha256").unwrap();
        signer.update(b"data to sign");
        let sig = signer.sign().unwrap();
        assert_eq!(sig.curve(), Some(Curve::Nistp256));
        assert_eq!(sig.hash_algorithm(), Some(HashAlgorithm::Sha256));

        let mut verifier = key.create_verify("sha256").unwrap();
        verifier.update(b"data to sign");
        assert!(verifier
            .verify(&sig, crate::signature::SignatureEncoding::Asn1)
            .unwrap());

        let mut verifier = key.create_verify("sha256").unwrap();
        verifier.update(b"data to sigh");
        assert!(!verifier
            .verify(&sig, crate::signature::SignatureEncoding::Asn1)
            .unwrap());
    }

    #[test]
    fn test_unknown_digest() {
        let key = PrivateKey::generate(Algorithm::Ecdsa, &GenerateOptions::default()).unwrap();
        assert!(matches!(
            key.create_sign("md4"),
            Err(KeyforgeError::InvalidAlgorithm { .. })
        ));
    }

    #[test]
    fn test_marker() {
        let key = PrivateKey::generate(Algorithm::Ed25519, &GenerateOptions::default()).unwrap();
        assert!(is_compatible(&key, Kind::PrivateKey, ApiVersion(1, 2)));
        assert!(is_compatible(&key, Kind::Key, ApiVersion(1, 2)));
        assert!(PrivateKey::is_private_key(&key, ApiVersion(1, 2)));
        assert!(!PrivateKey::is_private_key(&key, ApiVersion(1, 7)));
        assert!(!PrivateKey::is_private_key(key.to_public(), ApiVersion(1, 0)));
    }
}
