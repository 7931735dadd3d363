//! Algorithm registry
//!
//! Every key is an algorithm tag plus an ordered list of named parts. The
//! names, order and count of those parts are fixed here per algorithm and
//! every codec builds keys in exactly this order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::{KeyforgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Dsa,
    Rsa,
    Ecdsa,
    Ed25519,
    Curve25519,
}

impl Algorithm {
    pub const ALL: [Algorithm; 5] = [
        Algorithm::Dsa,
        Algorithm::Rsa,
        Algorithm::Ecdsa,
        Algorithm::Ed25519,
        Algorithm::Curve25519,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Dsa => "dsa",
            Algorithm::Rsa => "rsa",
            Algorithm::Ecdsa => "ecdsa",
            Algorithm::Ed25519 => "ed25519",
            Algorithm::Curve25519 => "curve25519",
        }
    }

    /// Parts of the public half, in wire order
    pub fn public_parts(self) -> &'static [&'static str] {
        match self {
            Algorithm::Dsa => &["p", "q", "g", "y"],
            Algorithm::Rsa => &["e", "n"],
            Algorithm::Ecdsa => &["curve", "Q"],
            Algorithm::Ed25519 | Algorithm::Curve25519 => &["A"],
        }
    }

    /// Parts of a private key, in wire order
    pub fn private_parts(self) -> &'static [&'static str] {
        match self {
            Algorithm::Dsa => &["p", "q", "g", "y", "x"],
            Algorithm::Rsa => &["n", "e", "d", "iqmp", "p", "q"],
            Algorithm::Ecdsa => &["curve", "Q", "d"],
            Algorithm::Ed25519 | Algorithm::Curve25519 => &["A", "k"],
        }
    }

    /// The part whose length gives the key size
    pub fn size_part(self) -> &'static str {
        match self {
            Algorithm::Dsa => "p",
            Algorithm::Rsa => "n",
            Algorithm::Ecdsa => "Q",
            Algorithm::Ed25519 | Algorithm::Curve25519 => "A",
        }
    }

    /// Whether a part holds an integer kept in mpint-normalized form
    pub(crate) fn is_integer_part(self, name: &str) -> bool {
        match self {
            Algorithm::Dsa | Algorithm::Rsa => true,
            Algorithm::Ecdsa => name == "d",
            Algorithm::Ed25519 | Algorithm::Curve25519 => false,
        }
    }

    /// Name used in the RFC 4253 key blob (curve-specific for ECDSA)
    pub fn ssh_type(self, curve: Option<Curve>) -> Result<&'static str> {
        Ok(match self {
            Algorithm::Dsa => "ssh-dss",
            Algorithm::Rsa => "ssh-rsa",
            Algorithm::Ed25519 => "ssh-ed25519",
            Algorithm::Curve25519 => "curve25519-sha256@libssh.org",
            Algorithm::Ecdsa => match curve {
                Some(Curve::Nistp256) => "ecdsa-sha2-nistp256",
                Some(Curve::Nistp384) => "ecdsa-sha2-nistp384",
                Some(Curve::Nistp521) => "ecdsa-sha2-nistp521",
                None => return Err(KeyforgeError::InvalidKey("ecdsa key without a curve".into())),
            },
        })
    }

    /// Inverse of [`Algorithm::ssh_type`]
    pub fn from_ssh_type(name: &str) -> Result<(Algorithm, Option<Curve>)> {
        Ok(match name {
            "ssh-dss" => (Algorithm::Dsa, None),
            "ssh-rsa" | "rsa-sha2-256" | "rsa-sha2-512" => (Algorithm::Rsa, None),
            "ssh-ed25519" => (Algorithm::Ed25519, None),
            "curve25519-sha256@libssh.org" => (Algorithm::Curve25519, None),
            _ => match name.strip_prefix("ecdsa-sha2-") {
                Some(curve) => (Algorithm::Ecdsa, Some(curve.parse()?)),
                None => {
                    return Err(KeyforgeError::InvalidAlgorithm {
                        algorithm: name.to_string(),
                    })
                }
            },
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = KeyforgeError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| KeyforgeError::InvalidAlgorithm {
                algorithm: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Nistp256,
    Nistp384,
    Nistp521,
}

/// DER-encoded object identifiers (content octets only)
pub(crate) mod oid {
    pub const RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
    pub const DSA: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x38, 0x04, 0x01];
    pub const EC_PUBLIC_KEY: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01];
    pub const ED25519: &[u8] = &[0x2b, 0x65, 0x70];
    pub const X25519: &[u8] = &[0x2b, 0x65, 0x6e];
    pub const NISTP256: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07];
    pub const NISTP384: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x22];
    pub const NISTP521: &[u8] = &[0x2b, 0x81, 0x04, 0x00, 0x23];
}

impl Curve {
    pub fn name(self) -> &'static str {
        match self {
            Curve::Nistp256 => "nistp256",
            Curve::Nistp384 => "nistp384",
            Curve::Nistp521 => "nistp521",
        }
    }

    /// Scalar / coordinate length in bytes
    pub fn field_size(self) -> usize {
        match self {
            Curve::Nistp256 => 32,
            Curve::Nistp384 => 48,
            Curve::Nistp521 => 66,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Curve::Nistp256 => 256,
            Curve::Nistp384 => 384,
            Curve::Nistp521 => 521,
        }
    }

    pub(crate) fn oid(self) -> &'static [u8] {
        match self {
            Curve::Nistp256 => oid::NISTP256,
            Curve::Nistp384 => oid::NISTP384,
            Curve::Nistp521 => oid::NISTP521,
        }
    }

    pub(crate) fn from_oid(value: &[u8]) -> Result<Curve> {
        [Curve::Nistp256, Curve::Nistp384, Curve::Nistp521]
            .into_iter()
            .find(|c| c.oid() == value)
            .ok_or_else(|| KeyforgeError::UnsupportedCurve(hex::encode(value)))
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Curve {
    type Err = KeyforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nistp256" | "p256" | "prime256v1" | "secp256r1" => Ok(Curve::Nistp256),
            "nistp384" | "p384" | "secp384r1" => Ok(Curve::Nistp384),
            "nistp521" | "p521" | "secp521r1" => Ok(Curve::Nistp521),
            _ => Err(KeyforgeError::UnsupportedCurve(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = KeyforgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha384" => Ok(HashAlgorithm::Sha384),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(KeyforgeError::InvalidAlgorithm {
                algorithm: s.to_string(),
            }),
        }
    }
}

/// One named binary component of a key or signature
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct Part {
    name: String,
    data: Vec<u8>,
    /// DER tag the value was read from, when it came from ASN.1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tag: Option<u8>,
}

impl Part {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: u8) -> Self {
        self.tag = Some(tag);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn tag(&self) -> Option<u8> {
        self.tag
    }
}

impl fmt::Debug for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Part")
            .field("name", &self.name)
            .field("len", &self.data.len())
            .finish()
    }
}

/// Minimal big-endian form with a leading zero when the high bit is set
pub fn mp_normalize(data: &[u8]) -> Vec<u8> {
    let stripped = mp_strip(data);
    let mut out = Vec::with_capacity(stripped.len() + 1);
    if stripped.first().is_some_and(|&b| b & 0x80 != 0) {
        out.push(0);
    }
    out.extend_from_slice(stripped);
    out
}

/// Drops all leading zero bytes (the unsigned magnitude)
pub fn mp_strip(data: &[u8]) -> &[u8] {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    &data[start..]
}

/// Left-pads an unsigned magnitude to exactly `len` bytes
pub fn mp_pad(data: &[u8], len: usize) -> Result<Vec<u8>> {
    let stripped = mp_strip(data);
    if stripped.len() > len {
        return Err(KeyforgeError::InvalidKey(format!(
            "integer of {} bytes does not fit in {}",
            stripped.len(),
            len
        )));
    }
    let mut out = vec![0u8; len - stripped.len()];
    out.extend_from_slice(stripped);
    Ok(out)
}

/// Canonical 32-byte form for curve25519/ed25519 values that may carry a
/// single leading mpint padding byte.
pub(crate) fn unpad_32(data: &[u8]) -> &[u8] {
    if data.len() == 33 && data[0] == 0 {
        &data[1..]
    } else {
        data
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_public_parts_are_subset_of_private() {
        for alg in Algorithm::ALL {
            for part in alg.public_parts() {
                assert!(alg.private_parts().contains(part), "{alg}: {part}");
            }
        }
    }

    #[rstest(name, expected,
        case("ssh-rsa", (Algorithm::Rsa, None)),
        case("rsa-sha2-512", (Algorithm::Rsa, None)),
        case("ssh-dss", (Algorithm::Dsa, None)),
        case("ecdsa-sha2-nistp384", (Algorithm::Ecdsa, Some(Curve::Nistp384))),
        case("ssh-ed25519", (Algorithm::Ed25519, None)),
    )]
    fn test_from_ssh_type(name: &str, expected: (Algorithm, Option<Curve>)) {
        assert_eq!(Algorithm::from_ssh_type(name).unwrap(), expected);
    }

    #[test]
    fn test_unknown_ssh_type() {
        assert!(matches!(
            Algorithm::from_ssh_type("ssh-foo"),
            Err(KeyforgeError::InvalidAlgorithm { .. })
        ));
    }

    #[test]
    fn test_mp_normalize() {
        assert_eq!(mp_normalize(&[0, 0, 0x7f]), vec![0x7f]);
        assert_eq!(mp_normalize(&[0x80, 1]), vec![0, 0x80, 1]);
        assert_eq!(mp_normalize(&[0, 0, 0x80]), vec![0, 0x80]);
        assert_eq!(mp_normalize(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_mp_pad() {
        assert_eq!(mp_pad(&[0, 0x80, 1], 4).unwrap(), vec![0, 0, 0x80, 1]);
        assert!(mp_pad(&[1, 2, 3], 2).is_err());
    }

    #[rstest(name, expected,
        case("SHA256", HashAlgorithm::Sha256),
        case("sha-512", HashAlgorithm::Sha512),
        case("sha1", HashAlgorithm::Sha1),
    )]
    fn test_hash_names(name: &str, expected: HashAlgorithm) {
        assert_eq!(name.parse::<HashAlgorithm>().unwrap(), expected);
    }
}
