//! BIND DNSSEC key files
//!
//! Private keys are the `Private-key-format: v1.x` files written by
//! `dnssec-keygen`; public keys are single `DNSKEY` (or `KEY`) records. Key
//! data encodings follow RFC 3110 (RSA), RFC 6605 (ECDSA) and RFC 8080
//! (ED25519).

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{as_text, comment_for, pkcs1, KeyRef, ParsedKey};
use crate::algs::{mp_pad, mp_strip, Algorithm, Curve, HashAlgorithm, Part};
use crate::config::{ParseOptions, WriteOptions};
use crate::crypto::keys::ec_public_from_scalar;
use crate::crypto::KeyPair;
use crate::error::{KeyforgeError, Result};
use crate::key::{Key, PrivateKey};

const FORMAT: &str = "dnssec";
const PRIVATE_PREFIX: &str = "Private-key-format: v1";
const RSA_FIELDS: [(&str, &str); 8] = [
    ("Modulus", "n"),
    ("PublicExponent", "e"),
    ("PrivateExponent", "d"),
    ("Prime1", "p"),
    ("Prime2", "q"),
    ("Exponent1", ""),
    ("Exponent2", ""),
    ("Coefficient", "iqmp"),
];

/// DNSSEC algorithm numbers (IANA registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DnsAlgorithm {
    RsaSha1,
    RsaSha1Nsec3,
    RsaSha256,
    RsaSha512,
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl DnsAlgorithm {
    fn from_number(number: u8) -> Result<Self> {
        Ok(match number {
            5 => DnsAlgorithm::RsaSha1,
            7 => DnsAlgorithm::RsaSha1Nsec3,
            8 => DnsAlgorithm::RsaSha256,
            10 => DnsAlgorithm::RsaSha512,
            13 => DnsAlgorithm::EcdsaP256,
            14 => DnsAlgorithm::EcdsaP384,
            15 => DnsAlgorithm::Ed25519,
            other => {
                return Err(KeyforgeError::UnsupportedKeyType(format!(
                    "DNSSEC algorithm {}",
                    other
                )))
            }
        })
    }

    fn number(self) -> u8 {
        match self {
            DnsAlgorithm::RsaSha1 => 5,
            DnsAlgorithm::RsaSha1Nsec3 => 7,
            DnsAlgorithm::RsaSha256 => 8,
            DnsAlgorithm::RsaSha512 => 10,
            DnsAlgorithm::EcdsaP256 => 13,
            DnsAlgorithm::EcdsaP384 => 14,
            DnsAlgorithm::Ed25519 => 15,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            DnsAlgorithm::RsaSha1 => "RSASHA1",
            DnsAlgorithm::RsaSha1Nsec3 => "NSEC3RSASHA1",
            DnsAlgorithm::RsaSha256 => "RSASHA256",
            DnsAlgorithm::RsaSha512 => "RSASHA512",
            DnsAlgorithm::EcdsaP256 => "ECDSAP256SHA256",
            DnsAlgorithm::EcdsaP384 => "ECDSAP384SHA384",
            DnsAlgorithm::Ed25519 => "ED25519",
        }
    }

    fn curve(self) -> Option<Curve> {
        match self {
            DnsAlgorithm::EcdsaP256 => Some(Curve::Nistp256),
            DnsAlgorithm::EcdsaP384 => Some(Curve::Nistp384),
            _ => None,
        }
    }

    /// Picks the number for a key; RSA's depends on the hash
    fn for_key(algorithm: Algorithm, curve: Option<Curve>, hash: Option<HashAlgorithm>) -> Result<Self> {
        Ok(match (algorithm, curve) {
            (Algorithm::Rsa, _) => match hash {
                Some(HashAlgorithm::Sha1) => DnsAlgorithm::RsaSha1,
                Some(HashAlgorithm::Sha512) => DnsAlgorithm::RsaSha512,
                _ => DnsAlgorithm::RsaSha256,
            },
            (Algorithm::Ecdsa, Some(Curve::Nistp256)) => DnsAlgorithm::EcdsaP256,
            (Algorithm::Ecdsa, Some(Curve::Nistp384)) => DnsAlgorithm::EcdsaP384,
            (Algorithm::Ed25519, _) => DnsAlgorithm::Ed25519,
            (algorithm, curve) => {
                return Err(KeyforgeError::UnsupportedKeyType(match curve {
                    Some(curve) => format!("{} {} in DNSSEC", algorithm, curve),
                    None => format!("{} in DNSSEC", algorithm),
                }))
            }
        })
    }
}

fn field<'a>(fields: &[(&'a str, &'a str)], name: &str) -> Result<&'a str> {
    fields
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| *v)
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, format!("missing field {}", name)))
}

fn algorithm_number(value: &str) -> Result<u8> {
    value
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, format!("bad algorithm \"{}\"", value)))
}

fn read_private(text: &str) -> Result<ParsedKey> {
    let fields: Vec<(&str, &str)> = text
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();
    let dns = DnsAlgorithm::from_number(algorithm_number(field(&fields, "Algorithm")?)?)?;

    let key = match dns {
        DnsAlgorithm::EcdsaP256 | DnsAlgorithm::EcdsaP384 => {
            let curve = dns.curve().ok_or_else(|| KeyforgeError::malformed(FORMAT, "no curve"))?;
            let d = STANDARD.decode(field(&fields, "PrivateKey")?)?;
            let q = ec_public_from_scalar(curve, &mp_pad(&d, curve.field_size())?)?;
            PrivateKey::new(
                Algorithm::Ecdsa,
                vec![Part::new("curve", curve.name()), Part::new("Q", q), Part::new("d", d)],
            )?
        }
        DnsAlgorithm::Ed25519 => {
            let k = STANDARD.decode(field(&fields, "PrivateKey")?)?;
            let pair = KeyPair::ed25519_from_seed(&k)?;
            PrivateKey::new(
                Algorithm::Ed25519,
                vec![Part::new("A", pair.public_key_bytes()), Part::new("k", k)],
            )?
        }
        _ => {
            let mut parts = Vec::new();
            for (name, part) in RSA_FIELDS {
                let value = STANDARD.decode(field(&fields, name)?)?;
                if !part.is_empty() {
                    parts.push(Part::new(part, value));
                }
            }
            PrivateKey::new(Algorithm::Rsa, parts)?
        }
    };
    Ok(ParsedKey::Private(key))
}

/// RFC 3110: exponent length, exponent, modulus
fn rsa_public_data(data: &[u8]) -> Result<Vec<Part>> {
    let (len, rest) = match data {
        [0, hi, lo, rest @ ..] => (u16::from_be_bytes([*hi, *lo]) as usize, rest),
        [len, rest @ ..] => (*len as usize, rest),
        [] => return Err(KeyforgeError::malformed(FORMAT, "empty RSA key data")),
    };
    if rest.len() <= len {
        return Err(KeyforgeError::malformed(FORMAT, "RSA key data is truncated"));
    }
    let (e, n) = rest.split_at(len);
    Ok(vec![Part::new("e", e), Part::new("n", n)])
}

fn read_public(text: &str) -> Result<ParsedKey> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with(';'))
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, "no key record"))?;
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let at = tokens
        .iter()
        .position(|t| *t == "DNSKEY" || *t == "KEY")
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, "not a DNSKEY record"))?;
    let [_flags, _protocol, algorithm, data @ ..] = &tokens[at + 1..] else {
        return Err(KeyforgeError::malformed(FORMAT, "truncated DNSKEY record"));
    };
    let dns = DnsAlgorithm::from_number(algorithm_number(algorithm)?)?;
    let data = STANDARD.decode(data.concat())?;

    let key = match dns {
        DnsAlgorithm::EcdsaP256 | DnsAlgorithm::EcdsaP384 => {
            let curve = dns.curve().ok_or_else(|| KeyforgeError::malformed(FORMAT, "no curve"))?;
            let mut q = Vec::with_capacity(data.len() + 1);
            q.push(0x04);
            q.extend_from_slice(&data);
            Key::new(
                Algorithm::Ecdsa,
                vec![Part::new("curve", curve.name()), Part::new("Q", q)],
            )?
        }
        DnsAlgorithm::Ed25519 => Key::new(Algorithm::Ed25519, vec![Part::new("A", data)])?,
        _ => Key::new(Algorithm::Rsa, rsa_public_data(&data)?)?,
    };

    let owner = if at > 0 { tokens[0].trim_end_matches('.') } else { "" };
    Ok(ParsedKey::Public(if owner.is_empty() {
        key
    } else {
        key.with_comment(owner)
    }))
}

pub(super) fn read(data: &[u8], _options: &ParseOptions) -> Result<ParsedKey> {
    let text = as_text(data, FORMAT)?;
    if text.trim_start().starts_with(PRIVATE_PREFIX) {
        read_private(text)
    } else {
        read_public(text)
    }
}

fn write_private(key: &PrivateKey, dns: DnsAlgorithm) -> Result<String> {
    let mut out = format!(
        "{}.3\nAlgorithm: {} ({})\n",
        PRIVATE_PREFIX,
        dns.number(),
        dns.mnemonic()
    );
    match key.algorithm() {
        Algorithm::Rsa => {
            let (dmp1, dmq1) = pkcs1::rsa_crt_exponents(key)?;
            for (name, part) in RSA_FIELDS {
                let value = match name {
                    "Exponent1" => dmp1.as_slice(),
                    "Exponent2" => dmq1.as_slice(),
                    _ => mp_strip(key.require_part(part)?),
                };
                out.push_str(&format!("{}: {}\n", name, STANDARD.encode(value)));
            }
        }
        Algorithm::Ecdsa => {
            let curve = dns.curve().ok_or_else(|| KeyforgeError::malformed(FORMAT, "no curve"))?;
            let d = mp_pad(key.require_part("d")?, curve.field_size())?;
            out.push_str(&format!("PrivateKey: {}\n", STANDARD.encode(d)));
        }
        _ => out.push_str(&format!("PrivateKey: {}\n", STANDARD.encode(key.require_part("k")?))),
    }
    Ok(out)
}

fn public_data(key: &Key) -> Result<Vec<u8>> {
    Ok(match key.algorithm() {
        Algorithm::Rsa => {
            let e = mp_strip(key.require_part("e")?);
            let n = mp_strip(key.require_part("n")?);
            let mut out = Vec::with_capacity(3 + e.len() + n.len());
            match u8::try_from(e.len()) {
                Ok(len) if len > 0 => out.push(len),
                _ => {
                    out.push(0);
                    out.extend_from_slice(&(e.len() as u16).to_be_bytes());
                }
            }
            out.extend_from_slice(e);
            out.extend_from_slice(n);
            out
        }
        // uncompressed point without the 0x04 marker
        Algorithm::Ecdsa => key.require_part("Q")?.get(1..).unwrap_or_default().to_vec(),
        _ => key.require_part("A")?.to_vec(),
    })
}

pub(super) fn write(key: KeyRef<'_>, options: &WriteOptions) -> Result<Vec<u8>> {
    let dns = DnsAlgorithm::for_key(key.algorithm(), key.curve(), options.hash_algorithm)?;
    let text = match key {
        KeyRef::Private(private) => write_private(private, dns)?,
        KeyRef::Public(public) => {
            let owner = match comment_for(key, options) {
                "" => "unnamed",
                comment => comment,
            };
            format!(
                "{}. IN DNSKEY 257 3 {} {}\n",
                owner.trim_end_matches('.'),
                dns.number(),
                STANDARD.encode(public_data(public)?)
            )
        }
    };
    Ok(text.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerateOptions;

    // RFC 8080 section 6.1
    const ED25519_PRIVATE: &str = "Private-key-format: v1.2\nAlgorithm: 15 (ED25519)\nPrivateKey: ODIyNjAzODQ2MjgwODAxMjI2NDUxOTAyMDQxNDIyNjI=\n";
    const ED25519_DNSKEY: &str =
        "example.com. 3600 IN DNSKEY 257 3 15 l02Woi0iS8Aa25FQkUd9RMzZHJpBoRQwAQEX1SxZJA4=";

    #[test]
    fn test_rfc8080_example() {
        let private = read(ED25519_PRIVATE.as_bytes(), &ParseOptions::default())
            .unwrap()
            .into_private()
            .unwrap();
        let public = read(ED25519_DNSKEY.as_bytes(), &ParseOptions::default())
            .unwrap()
            .into_public();
        assert_eq!(private.to_public(), &public);
        assert_eq!(public.comment(), Some("example.com"));
    }

    #[test]
    fn test_ecdsa_round_trip() {
        for curve in [Curve::Nistp256, Curve::Nistp384] {
            let key = PrivateKey::generate(Algorithm::Ecdsa, &GenerateOptions::new().with_curve(curve)).unwrap();
            let out = write(KeyRef::Private(&key), &WriteOptions::default()).unwrap();
            let parsed = read(&out, &ParseOptions::default()).unwrap().into_private().unwrap();
            assert_eq!(parsed.parts(), key.parts());

            let out = write(KeyRef::Public(key.to_public()), &WriteOptions::new().with_comment("zone.test")).unwrap();
            let text = String::from_utf8(out.clone()).unwrap();
            assert!(text.starts_with("zone.test. IN DNSKEY 257 3 1"));
            let parsed = read(&out, &ParseOptions::default()).unwrap().into_public();
            assert_eq!(&parsed, key.to_public());
        }
    }

    #[test]
    fn test_rsa_public_data() {
        let parts = rsa_public_data(&[3, 1, 0, 1, 0xc5, 0x01]).unwrap();
        assert_eq!(parts[0].data(), &[1, 0, 1]);
        assert_eq!(parts[1].data(), &[0xc5, 0x01]);
        assert!(rsa_public_data(&[3, 1, 0, 1]).is_err());
    }

    #[test]
    fn test_rsa_algorithm_follows_hash() {
        let dns = DnsAlgorithm::for_key(Algorithm::Rsa, None, Some(HashAlgorithm::Sha512)).unwrap();
        assert_eq!(dns.number(), 10);
        let dns = DnsAlgorithm::for_key(Algorithm::Rsa, None, None).unwrap();
        assert_eq!(dns.number(), 8);
    }

    #[test]
    fn test_unsupported_algorithm() {
        let text = "Private-key-format: v1.3\nAlgorithm: 3 (DSA)\n";
        assert!(matches!(
            read(text.as_bytes(), &ParseOptions::default()),
            Err(KeyforgeError::UnsupportedKeyType(_))
        ));
    }
}
