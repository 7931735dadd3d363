//! Algorithm-specific DER structures
//!
//! RSA keys follow RFC 8017, DSA keys the OpenSSL layout, EC private keys
//! RFC 5915 (SEC1). ED25519 private keys use the SEC1 shape with the seed
//! in the octet string. ECDSA and 25519 public keys have no PKCS#1 form and
//! are written as SPKI.

use rsa::BigUint;

use super::der::{tag, DerReader, DerWriter};
use super::pem::{self, LINE_WIDTH};
use super::{pkcs8, Format, KeyRef, ParsedKey};
use crate::algs::{mp_pad, oid, Algorithm, Curve, Part};
use crate::config::{ParseOptions, WriteOptions};
use crate::crypto::keys::ec_public_from_scalar;
use crate::crypto::KeyPair;
use crate::error::{KeyforgeError, Result};
use crate::key::{Key, PrivateKey};

const FORMAT: &str = "pkcs1";

fn integers(seq: &mut DerReader<'_>, names: &[&str]) -> Result<Vec<Part>> {
    names
        .iter()
        .map(|name| Ok(Part::new(*name, seq.read_integer()?)))
        .collect()
}

fn check_done(seq: &DerReader<'_>, what: &str) -> Result<()> {
    if seq.is_empty() {
        Ok(())
    } else {
        Err(KeyforgeError::malformed(FORMAT, format!("trailing data in {}", what)))
    }
}

pub(crate) fn read_rsa_private(der: &[u8]) -> Result<PrivateKey> {
    let mut seq = DerReader::new(der).read_sequence()?;
    let version = seq.read_small_int()?;
    if version != 0 {
        return Err(KeyforgeError::malformed(
            FORMAT,
            format!("unsupported RSA key version {}", version),
        ));
    }
    let mut parts = integers(&mut seq, &["n", "e", "d", "p", "q"])?;
    // dmp1 and dmq1 are recomputed on write
    seq.read_integer()?;
    seq.read_integer()?;
    parts.push(Part::new("iqmp", seq.read_integer()?));
    PrivateKey::new(Algorithm::Rsa, parts)
}

pub(crate) fn read_rsa_public(der: &[u8]) -> Result<Key> {
    let mut seq = DerReader::new(der).read_sequence()?;
    let parts = integers(&mut seq, &["n", "e"])?;
    check_done(&seq, "RSAPublicKey")?;
    Key::new(Algorithm::Rsa, parts)
}

fn read_dsa_private(der: &[u8]) -> Result<PrivateKey> {
    let mut seq = DerReader::new(der).read_sequence()?;
    seq.read_small_int()?;
    let parts = integers(&mut seq, &["p", "q", "g", "y", "x"])?;
    PrivateKey::new(Algorithm::Dsa, parts)
}

fn read_dsa_public(der: &[u8]) -> Result<Key> {
    let mut seq = DerReader::new(der).read_sequence()?;
    let parts = integers(&mut seq, &["y", "p", "q", "g"])?;
    Key::new(Algorithm::Dsa, parts)
}

/// `y = g^x mod p`
pub(crate) fn dsa_public_value(p: &[u8], g: &[u8], x: &[u8]) -> Vec<u8> {
    let p = BigUint::from_bytes_be(p);
    let g = BigUint::from_bytes_be(g);
    let x = BigUint::from_bytes_be(x);
    g.modpow(&x, &p).to_bytes_be()
}

/// ECPrivateKey; `curve` comes from the enclosing AlgorithmIdentifier when
/// the structure omits its own parameters
pub(crate) fn read_ec_private(der: &[u8], curve: Option<Curve>) -> Result<PrivateKey> {
    let mut seq = DerReader::new(der).read_sequence()?;
    let version = seq.read_small_int()?;
    if version != 1 {
        return Err(KeyforgeError::malformed(
            FORMAT,
            format!("unsupported EC key version {}", version),
        ));
    }
    let d = seq.read_octet_string()?;

    let mut curve = curve;
    let mut q = None;
    while let Some(next) = seq.peek_tag() {
        match next {
            tag::CONTEXT_0 => {
                let declared = Curve::from_oid(seq.read_context(tag::CONTEXT_0)?.read_oid()?)?;
                if curve.is_some_and(|c| c != declared) {
                    return Err(KeyforgeError::malformed(FORMAT, "conflicting curve parameters"));
                }
                curve = Some(declared);
            }
            tag::CONTEXT_1 => q = Some(seq.read_context(tag::CONTEXT_1)?.read_bit_string()?.to_vec()),
            other => {
                return Err(KeyforgeError::malformed(
                    FORMAT,
                    format!("unexpected tag 0x{:02x} in ECPrivateKey", other),
                ))
            }
        }
    }

    let curve = curve.ok_or_else(|| KeyforgeError::malformed(FORMAT, "EC key without a curve"))?;
    let q = match q {
        Some(q) => q,
        None => ec_public_from_scalar(curve, &mp_pad(d, curve.field_size())?)?,
    };
    PrivateKey::new(
        Algorithm::Ecdsa,
        vec![
            Part::new("curve", curve.name()),
            Part::new("Q", q),
            Part::new("d", d),
        ],
    )
}

fn read_eddsa_private(der: &[u8]) -> Result<PrivateKey> {
    let mut seq = DerReader::new(der).read_sequence()?;
    seq.read_small_int()?;
    let k = seq.read_octet_string()?;

    let mut a = None;
    while let Some(next) = seq.peek_tag() {
        match next {
            tag::CONTEXT_0 => {
                if seq.read_context(tag::CONTEXT_0)?.read_oid()? != oid::ED25519 {
                    return Err(KeyforgeError::malformed(FORMAT, "EdDSA key is not ED25519"));
                }
            }
            tag::CONTEXT_1 => a = Some(seq.read_context(tag::CONTEXT_1)?.read_bit_string()?.to_vec()),
            other => {
                return Err(KeyforgeError::malformed(
                    FORMAT,
                    format!("unexpected tag 0x{:02x} in EdDSA key", other),
                ))
            }
        }
    }

    let a = match a {
        Some(a) => a,
        None => KeyPair::ed25519_from_seed(k)?.public_key_bytes().to_vec(),
    };
    PrivateKey::new(Algorithm::Ed25519, vec![Part::new("A", a), Part::new("k", k)])
}

pub(super) fn read_private(algorithm: Algorithm, der: &[u8]) -> Result<ParsedKey> {
    let key = match algorithm {
        Algorithm::Rsa => read_rsa_private(der)?,
        Algorithm::Dsa => read_dsa_private(der)?,
        Algorithm::Ecdsa => read_ec_private(der, None)?,
        Algorithm::Ed25519 => read_eddsa_private(der)?,
        Algorithm::Curve25519 => return Err(unsupported(algorithm)),
    };
    Ok(ParsedKey::Private(key))
}

pub(super) fn read_public(algorithm: Algorithm, der: &[u8]) -> Result<ParsedKey> {
    let key = match algorithm {
        Algorithm::Rsa => read_rsa_public(der)?,
        Algorithm::Dsa => read_dsa_public(der)?,
        _ => return Err(unsupported(algorithm)),
    };
    Ok(ParsedKey::Public(key))
}

fn unsupported(algorithm: Algorithm) -> KeyforgeError {
    KeyforgeError::UnsupportedFormat {
        format: FORMAT.to_string(),
        operation: format!("{} keys", algorithm),
    }
}

fn minus_one(value: &BigUint) -> BigUint {
    value.clone() - BigUint::from_bytes_be(&[1])
}

/// CRT exponents `d mod (p-1)` and `d mod (q-1)`
pub(crate) fn rsa_crt_exponents(key: &PrivateKey) -> Result<(Vec<u8>, Vec<u8>)> {
    let d = BigUint::from_bytes_be(key.require_part("d")?);
    let p = BigUint::from_bytes_be(key.require_part("p")?);
    let q = BigUint::from_bytes_be(key.require_part("q")?);
    Ok((
        (&d % &minus_one(&p)).to_bytes_be(),
        (&d % &minus_one(&q)).to_bytes_be(),
    ))
}

pub(crate) fn write_rsa_private(key: &PrivateKey) -> Result<Vec<u8>> {
    let (dmp1, dmq1) = rsa_crt_exponents(key)?;
    let n = key.require_part("n")?;
    let e = key.require_part("e")?;
    let d = key.require_part("d")?;
    let p = key.require_part("p")?;
    let q = key.require_part("q")?;
    let iqmp = key.require_part("iqmp")?;

    let mut w = DerWriter::new();
    w.write_sequence(|w| {
        w.write_small_int(0);
        for value in [n, e, d, p, q, dmp1.as_slice(), dmq1.as_slice(), iqmp] {
            w.write_integer(value);
        }
    });
    Ok(w.into_bytes())
}

pub(crate) fn write_rsa_public(key: &Key) -> Result<Vec<u8>> {
    let n = key.require_part("n")?;
    let e = key.require_part("e")?;
    let mut w = DerWriter::new();
    w.write_sequence(|w| {
        w.write_integer(n);
        w.write_integer(e);
    });
    Ok(w.into_bytes())
}

fn write_dsa_private(key: &PrivateKey) -> Result<Vec<u8>> {
    let values = ["p", "q", "g", "y", "x"]
        .iter()
        .map(|name| key.require_part(name))
        .collect::<Result<Vec<_>>>()?;
    let mut w = DerWriter::new();
    w.write_sequence(|w| {
        w.write_small_int(0);
        for value in values {
            w.write_integer(value);
        }
    });
    Ok(w.into_bytes())
}

fn write_dsa_public(key: &Key) -> Result<Vec<u8>> {
    let values = ["y", "p", "q", "g"]
        .iter()
        .map(|name| key.require_part(name))
        .collect::<Result<Vec<_>>>()?;
    let mut w = DerWriter::new();
    w.write_sequence(|w| {
        for value in values {
            w.write_integer(value);
        }
    });
    Ok(w.into_bytes())
}

/// ECPrivateKey, with the curve OID unless the caller carries it elsewhere
pub(crate) fn write_ec_private(key: &PrivateKey, with_curve: bool) -> Result<Vec<u8>> {
    let curve = key
        .curve()
        .ok_or_else(|| KeyforgeError::InvalidKey("ecdsa key without a curve".into()))?;
    let d = mp_pad(key.require_part("d")?, curve.field_size())?;
    let q = key.require_part("Q")?;

    let mut w = DerWriter::new();
    w.write_sequence(|w| {
        w.write_small_int(1);
        w.write_octet_string(&d);
        if with_curve {
            w.write_constructed(tag::CONTEXT_0, |w| w.write_oid(curve.oid()));
        }
        w.write_constructed(tag::CONTEXT_1, |w| w.write_bit_string(q));
    });
    Ok(w.into_bytes())
}

fn write_eddsa_private(key: &PrivateKey) -> Result<Vec<u8>> {
    let k = key.require_part("k")?;
    let a = key.require_part("A")?;
    let mut w = DerWriter::new();
    w.write_sequence(|w| {
        w.write_small_int(1);
        w.write_octet_string(k);
        w.write_constructed(tag::CONTEXT_0, |w| w.write_oid(oid::ED25519));
        w.write_constructed(tag::CONTEXT_1, |w| w.write_bit_string(a));
    });
    Ok(w.into_bytes())
}

pub(super) fn read(data: &[u8], options: &ParseOptions) -> Result<ParsedKey> {
    pem::read_as(data, options, Format::Pkcs1)
}

pub(super) fn write(key: KeyRef<'_>, options: &WriteOptions) -> Result<Vec<u8>> {
    if options.passphrase.is_some() {
        return Err(KeyforgeError::UnsupportedFormat {
            format: FORMAT.to_string(),
            operation: "writing encrypted keys".to_string(),
        });
    }
    let (label, der) = match key {
        KeyRef::Private(key) => match key.algorithm() {
            Algorithm::Rsa => ("RSA PRIVATE KEY", write_rsa_private(key)?),
            Algorithm::Dsa => ("DSA PRIVATE KEY", write_dsa_private(key)?),
            Algorithm::Ecdsa => ("EC PRIVATE KEY", write_ec_private(key, true)?),
            Algorithm::Ed25519 => ("EDDSA PRIVATE KEY", write_eddsa_private(key)?),
            other => return Err(unsupported(other)),
        },
        KeyRef::Public(key) => match key.algorithm() {
            Algorithm::Rsa => ("RSA PUBLIC KEY", write_rsa_public(key)?),
            Algorithm::Dsa => ("DSA PUBLIC KEY", write_dsa_public(key)?),
            _ => return pkcs8::write_pem(KeyRef::Public(key), options),
        },
    };
    Ok(pem::encode(label, &der, LINE_WIDTH).into_bytes())
}
