//! Algorithm-tagged signatures in `asn1`, `ssh` and `raw` encodings

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::algs::{mp_normalize, mp_pad, Algorithm, Curve, HashAlgorithm, Part};
use crate::error::{KeyforgeError, Result};
use crate::formats::der::{DerReader, DerWriter};
use crate::version::{ApiVersion, Kind, Marker, Tagged};
use crate::wire::WireBuffer;

/// DSA r and s are each 160 bits in every encoding that fixes their width
const DSA_SCALAR_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureEncoding {
    Asn1,
    Ssh,
    Raw,
}

impl SignatureEncoding {
    pub fn name(self) -> &'static str {
        match self {
            SignatureEncoding::Asn1 => "asn1",
            SignatureEncoding::Ssh => "ssh",
            SignatureEncoding::Raw => "raw",
        }
    }
}

impl fmt::Display for SignatureEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SignatureEncoding {
    type Err = KeyforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asn1" => Ok(SignatureEncoding::Asn1),
            "ssh" => Ok(SignatureEncoding::Ssh),
            "raw" => Ok(SignatureEncoding::Raw),
            _ => Err(KeyforgeError::UnknownFormat(s.to_string())),
        }
    }
}

/// Values serialized before the version field existed
fn legacy_version() -> ApiVersion {
    ApiVersion(1, 0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    algorithm: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hash_algorithm: Option<HashAlgorithm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    curve: Option<Curve>,
    parts: Vec<Part>,
    #[serde(default = "legacy_version")]
    version: ApiVersion,
}

/// What a verifier accepts
#[derive(Debug, Clone, Copy)]
pub enum SignatureInput<'a> {
    Signature(&'a Signature),
    /// Base64 text of the encoded signature
    Base64(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> From<&'a Signature> for SignatureInput<'a> {
    fn from(sig: &'a Signature) -> Self {
        SignatureInput::Signature(sig)
    }
}

impl<'a> From<&'a str> for SignatureInput<'a> {
    fn from(text: &'a str) -> Self {
        SignatureInput::Base64(text)
    }
}

impl<'a> From<&'a [u8]> for SignatureInput<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        SignatureInput::Bytes(bytes)
    }
}

fn part_names(algorithm: Algorithm) -> Result<&'static [&'static str]> {
    match algorithm {
        Algorithm::Rsa | Algorithm::Ed25519 => Ok(&["sig"]),
        Algorithm::Dsa | Algorithm::Ecdsa => Ok(&["r", "s"]),
        Algorithm::Curve25519 => Err(KeyforgeError::NotSigningKey),
    }
}

impl Signature {
    /// Builds a signature from its parts (`sig`, or `r` and `s`)
    pub fn from_parts(algorithm: Algorithm, parts: Vec<Part>) -> Result<Self> {
        let names = part_names(algorithm)?;
        if parts.len() != names.len() || parts.iter().zip(names).any(|(p, n)| p.name() != *n) {
            return Err(KeyforgeError::malformed(
                "signature",
                format!("{} signatures need parts {:?}", algorithm, names),
            ));
        }
        let parts = parts
            .into_iter()
            .map(|p| match p.name() {
                "sig" => p,
                name => Part::new(name, mp_normalize(p.data())),
            })
            .collect();
        Ok(Self {
            algorithm,
            hash_algorithm: None,
            curve: None,
            parts,
            version: ApiVersion::SIGNATURE,
        })
    }

    pub fn with_hash_algorithm(mut self, hash: HashAlgorithm) -> Self {
        self.hash_algorithm = Some(hash);
        self
    }

    pub fn with_curve(mut self, curve: Option<Curve>) -> Self {
        self.curve = curve;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn hash_algorithm(&self) -> Option<HashAlgorithm> {
        self.hash_algorithm
    }

    pub fn curve(&self) -> Option<Curve> {
        self.curve
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.iter().find(|p| p.name() == name).map(|p| p.data())
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Decodes `data`; failures are reported as [`KeyforgeError::SignatureParse`]
    pub fn parse(data: &[u8], algorithm: Algorithm, encoding: SignatureEncoding) -> Result<Self> {
        parse_inner(data, algorithm, encoding).map_err(|err| KeyforgeError::SignatureParse {
            kind: algorithm.name().to_string(),
            format: encoding.name().to_string(),
            source: Box::new(err),
        })
    }

    pub fn to_bytes(&self, encoding: SignatureEncoding) -> Result<Vec<u8>> {
        match (self.algorithm, encoding) {
            (Algorithm::Rsa | Algorithm::Ed25519, SignatureEncoding::Asn1 | SignatureEncoding::Raw) => {
                Ok(self.scalar("sig")?.to_vec())
            }
            (Algorithm::Rsa | Algorithm::Ed25519, SignatureEncoding::Ssh) => {
                let mut buf = WireBuffer::new();
                buf.write_string(self.ssh_type()?);
                buf.write_buffer(self.scalar("sig")?);
                Ok(buf.to_bytes())
            }
            (_, SignatureEncoding::Asn1) => {
                let (r, s) = (self.scalar("r")?, self.scalar("s")?);
                let mut der = DerWriter::new();
                der.write_sequence(|w| {
                    w.write_integer(r);
                    w.write_integer(s);
                });
                Ok(der.into_bytes())
            }
            (_, SignatureEncoding::Raw) => self.fixed_rs(),
            (Algorithm::Dsa, SignatureEncoding::Ssh) => {
                let mut buf = WireBuffer::new();
                buf.write_string(self.ssh_type()?);
                buf.write_buffer(&self.fixed_rs()?);
                Ok(buf.to_bytes())
            }
            (_, SignatureEncoding::Ssh) => {
                let mut inner = WireBuffer::new();
                inner.write_buffer(self.scalar("r")?);
                inner.write_buffer(self.scalar("s")?);
                let mut buf = WireBuffer::new();
                buf.write_string(self.ssh_type()?);
                buf.write_buffer(&inner.to_bytes());
                Ok(buf.to_bytes())
            }
        }
    }

    fn scalar(&self, name: &str) -> Result<&[u8]> {
        self.part(name)
            .ok_or_else(|| KeyforgeError::malformed("signature", format!("missing part \"{}\"", name)))
    }

    /// r and s padded to the algorithm's fixed width and concatenated
    fn fixed_rs(&self) -> Result<Vec<u8>> {
        let (r, s) = (self.scalar("r")?, self.scalar("s")?);
        let width = match (self.algorithm, self.curve) {
            (Algorithm::Dsa, _) => DSA_SCALAR_LEN,
            (_, Some(curve)) => curve.field_size(),
            (_, None) => r.len().max(s.len()),
        };
        Ok([mp_pad(r, width)?, mp_pad(s, width)?].concat())
    }

    fn ssh_type(&self) -> Result<&'static str> {
        match self.algorithm {
            Algorithm::Rsa => match self.hash_algorithm {
                None | Some(HashAlgorithm::Sha1) => Ok("ssh-rsa"),
                Some(HashAlgorithm::Sha256) => Ok("rsa-sha2-256"),
                Some(HashAlgorithm::Sha512) => Ok("rsa-sha2-512"),
                Some(other) => Err(KeyforgeError::UnsupportedFormat {
                    format: "ssh".into(),
                    operation: format!("rsa signatures over {}", other),
                }),
            },
            other => other.ssh_type(self.curve),
        }
    }
}

impl Tagged for Signature {
    fn marker(&self) -> Marker {
        Marker {
            kind: Kind::Signature,
            version: self.version,
        }
    }
}

fn hash_for_ssh_type(name: &str) -> Option<HashAlgorithm> {
    match name {
        "ssh-rsa" | "ssh-dss" => Some(HashAlgorithm::Sha1),
        "rsa-sha2-256" | "ecdsa-sha2-nistp256" => Some(HashAlgorithm::Sha256),
        "ecdsa-sha2-nistp384" => Some(HashAlgorithm::Sha384),
        "rsa-sha2-512" | "ecdsa-sha2-nistp521" | "ssh-ed25519" => Some(HashAlgorithm::Sha512),
        _ => None,
    }
}

fn parse_inner(data: &[u8], algorithm: Algorithm, encoding: SignatureEncoding) -> Result<Signature> {
    match encoding {
        SignatureEncoding::Ssh => parse_ssh(data, algorithm),
        SignatureEncoding::Asn1 | SignatureEncoding::Raw => match algorithm {
            Algorithm::Rsa => Signature::from_parts(algorithm, vec![Part::new("sig", data)]),
            Algorithm::Ed25519 => {
                if data.len() != 64 {
                    return Err(KeyforgeError::malformed(
                        "signature",
                        format!("ed25519 signatures are 64 bytes, got {}", data.len()),
                    ));
                }
                Signature::from_parts(algorithm, vec![Part::new("sig", data)])
            }
            Algorithm::Dsa | Algorithm::Ecdsa if encoding == SignatureEncoding::Asn1 => {
                let mut outer = DerReader::new(data);
                let mut seq = outer.read_sequence()?;
                let r = seq.read_integer()?;
                let s = seq.read_integer()?;
                Signature::from_parts(algorithm, vec![Part::new("r", r), Part::new("s", s)])
            }
            Algorithm::Dsa | Algorithm::Ecdsa => split_rs(algorithm, data),
            Algorithm::Curve25519 => Err(KeyforgeError::NotSigningKey),
        },
    }
}

fn split_rs(algorithm: Algorithm, data: &[u8]) -> Result<Signature> {
    if data.is_empty() || data.len() % 2 != 0 {
        return Err(KeyforgeError::malformed(
            "signature",
            format!("r||s blob of odd length {}", data.len()),
        ));
    }
    let (r, s) = data.split_at(data.len() / 2);
    Signature::from_parts(algorithm, vec![Part::new("r", r), Part::new("s", s)])
}

fn parse_ssh(data: &[u8], algorithm: Algorithm) -> Result<Signature> {
    let mut buf = WireBuffer::from_bytes(data);
    let type_name = buf.read_string()?;
    let blob = buf.read_buffer()?;
    if !buf.at_end() {
        return Err(KeyforgeError::malformed("signature", "trailing data after ssh signature"));
    }

    let (found, curve) = Algorithm::from_ssh_type(&type_name)?;
    if found != algorithm {
        return Err(KeyforgeError::malformed(
            "signature",
            format!("expected a {} signature, found \"{}\"", algorithm, type_name),
        ));
    }

    let sig = match algorithm {
        Algorithm::Rsa => Signature::from_parts(algorithm, vec![Part::new("sig", blob)])?,
        Algorithm::Ed25519 => parse_inner(&blob, algorithm, SignatureEncoding::Raw)?,
        Algorithm::Dsa => {
            if blob.len() != 2 * DSA_SCALAR_LEN {
                return Err(KeyforgeError::malformed(
                    "signature",
                    format!("ssh-dss signature blob must be 40 bytes, got {}", blob.len()),
                ));
            }
            split_rs(algorithm, &blob)?
        }
        Algorithm::Ecdsa => {
            let mut inner = WireBuffer::from_bytes(&blob);
            let r = inner.read_buffer()?;
            let s = inner.read_buffer()?;
            Signature::from_parts(algorithm, vec![Part::new("r", r), Part::new("s", s)])?
        }
        Algorithm::Curve25519 => return Err(KeyforgeError::NotSigningKey),
    };

    let sig = sig.with_curve(curve);
    Ok(match hash_for_ssh_type(&type_name) {
        Some(hash) => sig.with_hash_algorithm(hash),
        None => sig,
    })
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::version::is_compatible;

    fn ecdsa_sig() -> Signature {
        Signature::from_parts(
            Algorithm::Ecdsa,
            vec![Part::new("r", vec![0x80; 32]), Part::new("s", vec![0x01; 31])],
        )
        .unwrap()
        .with_curve(Some(Curve::Nistp256))
        .with_hash_algorithm(HashAlgorithm::Sha256)
    }

    #[test]
    fn test_integer_parts_are_normalized() {
        let sig = ecdsa_sig();
        assert_eq!(sig.part("r").unwrap().len(), 33);
        assert_eq!(sig.part("s").unwrap().len(), 31);
    }

    #[test]
    fn test_ecdsa_encodings_agree() {
        let sig = ecdsa_sig();
        for encoding in [SignatureEncoding::Asn1, SignatureEncoding::Ssh, SignatureEncoding::Raw] {
            let bytes = sig.to_bytes(encoding).unwrap();
            let parsed = Signature::parse(&bytes, Algorithm::Ecdsa, encoding).unwrap();
            assert_eq!(parsed.parts(), sig.parts(), "{encoding}");
        }
        assert_eq!(sig.to_bytes(SignatureEncoding::Raw).unwrap().len(), 64);
    }

    #[test]
    fn test_ssh_encoding_carries_hash() {
        let sig = Signature::from_parts(Algorithm::Rsa, vec![Part::new("sig", vec![7u8; 256])])
            .unwrap()
            .with_hash_algorithm(HashAlgorithm::Sha512);
        let bytes = sig.to_bytes(SignatureEncoding::Ssh).unwrap();

        let parsed = Signature::parse(&bytes, Algorithm::Rsa, SignatureEncoding::Ssh).unwrap();
        assert_eq!(parsed.hash_algorithm(), Some(HashAlgorithm::Sha512));
        assert_eq!(parsed.part("sig").unwrap(), &[7u8; 256][..]);
    }

    #[test]
    fn test_dsa_ssh_blob_is_fixed_width() {
        let sig = Signature::from_parts(
            Algorithm::Dsa,
            vec![Part::new("r", vec![1u8; 19]), Part::new("s", vec![2u8; 20])],
        )
        .unwrap();
        let bytes = sig.to_bytes(SignatureEncoding::Ssh).unwrap();
        // string "ssh-dss" + string(40)
        assert_eq!(bytes.len(), 4 + 7 + 4 + 40);
        let parsed = Signature::parse(&bytes, Algorithm::Dsa, SignatureEncoding::Ssh).unwrap();
        assert_eq!(parsed.part("r").unwrap(), &[1u8; 19][..]);
        assert_eq!(parsed.hash_algorithm(), Some(HashAlgorithm::Sha1));
    }

    #[test]
    fn test_wrong_type_name_is_signature_parse() {
        let sig = Signature::from_parts(Algorithm::Ed25519, vec![Part::new("sig", vec![0u8; 64])]).unwrap();
        let bytes = sig.to_bytes(SignatureEncoding::Ssh).unwrap();

        let err = Signature::parse(&bytes, Algorithm::Rsa, SignatureEncoding::Ssh).unwrap_err();
        assert!(matches!(
            err,
            KeyforgeError::SignatureParse { ref kind, ref format, .. } if kind == "rsa" && format == "ssh"
        ));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_bad_der_is_signature_parse() {
        let err = Signature::parse(&[0x30, 0x10, 0x02], Algorithm::Dsa, SignatureEncoding::Asn1).unwrap_err();
        assert!(matches!(err, KeyforgeError::SignatureParse { .. }));
    }

    #[test]
    fn test_ed25519_length_checked() {
        assert!(Signature::parse(&[0u8; 63], Algorithm::Ed25519, SignatureEncoding::Raw).is_err());
    }

    #[test]
    fn test_serialized_without_version_is_legacy() {
        let sig = ecdsa_sig();
        let mut value = serde_json::to_value(&sig).unwrap();
        value.as_object_mut().unwrap().remove("version");

        let old: Signature = serde_json::from_value(value).unwrap();
        assert_eq!(old.version(), ApiVersion(1, 0));
        assert!(!is_compatible(&old, Kind::Signature, ApiVersion(2, 0)));
        assert!(is_compatible(&sig, Kind::Signature, ApiVersion(2, 0)));
    }
}
