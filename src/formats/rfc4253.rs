//! RFC 4253 key blobs
//!
//! `string type` followed by one string/mpint per part in wire order. A
//! blob with the algorithm's private part count is a private key (the
//! layout OpenSSH uses inside its private container). ED25519 private
//! blobs carry `k` as the 64-byte `seed || A`.

use zeroize::Zeroize;

use super::{KeyRef, ParsedKey};
use crate::algs::{Algorithm, Part};
use crate::config::{ParseOptions, WriteOptions};
use crate::error::{KeyforgeError, Result};
use crate::key::{Key, PrivateKey};
use crate::wire::WireBuffer;

const FORMAT: &str = "rfc4253";

fn read_fields(buf: &mut WireBuffer, count: usize) -> Result<Vec<Vec<u8>>> {
    (0..count).map(|_| buf.read_buffer()).collect()
}

fn named(names: &[&str], fields: Vec<Vec<u8>>) -> Vec<Part> {
    names.iter().zip(fields).map(|(name, data)| Part::new(*name, data)).collect()
}

/// Reads the type string and checks an ECDSA curve field against it
fn read_type(buf: &mut WireBuffer) -> Result<(Algorithm, String)> {
    let type_name = buf.read_string()?;
    let (algorithm, _) = Algorithm::from_ssh_type(&type_name)?;
    Ok((algorithm, type_name))
}

fn check_curve(algorithm: Algorithm, type_name: &str, parts: &[Part]) -> Result<()> {
    if algorithm != Algorithm::Ecdsa {
        return Ok(());
    }
    let curve = parts.iter().find(|p| p.name() == "curve").map(|p| p.data());
    let expected = type_name.trim_start_matches("ecdsa-sha2-").as_bytes();
    if curve != Some(expected) {
        return Err(KeyforgeError::malformed(FORMAT, "curve field does not match key type"));
    }
    Ok(())
}

/// ED25519/Curve25519 `k` may arrive as `seed || A`
fn split_secret(algorithm: Algorithm, mut parts: Vec<Part>) -> Vec<Part> {
    if matches!(algorithm, Algorithm::Ed25519 | Algorithm::Curve25519) {
        for part in parts.iter_mut() {
            if part.name() == "k" && part.data().len() == 64 {
                let seed = Part::new("k", &part.data()[..32]);
                part.zeroize();
                *part = seed;
            }
        }
    }
    parts
}

fn build_private(algorithm: Algorithm, type_name: &str, fields: Vec<Vec<u8>>) -> Result<PrivateKey> {
    let parts = named(algorithm.private_parts(), fields);
    check_curve(algorithm, type_name, &parts)?;
    PrivateKey::new(algorithm, split_secret(algorithm, parts))
}

/// Reads exactly one private key blob from `buf`, leaving the cursor after it
pub(crate) fn read_private_from(buf: &mut WireBuffer) -> Result<PrivateKey> {
    let (algorithm, type_name) = read_type(buf)?;
    let fields = read_fields(buf, algorithm.private_parts().len())?;
    build_private(algorithm, &type_name, fields)
}

pub(crate) fn read_public_blob(data: &[u8]) -> Result<Key> {
    match read_blob(data)? {
        ParsedKey::Public(key) => Ok(key),
        ParsedKey::Private(_) => Err(KeyforgeError::malformed(FORMAT, "expected a public key blob")),
    }
}

fn read_blob(data: &[u8]) -> Result<ParsedKey> {
    let mut buf = WireBuffer::from_bytes(data);
    let (algorithm, type_name) = read_type(&mut buf)?;

    let mut fields = Vec::new();
    while !buf.at_end() {
        fields.push(buf.read_buffer()?);
    }

    if fields.len() == algorithm.public_parts().len() {
        let parts = named(algorithm.public_parts(), fields);
        check_curve(algorithm, &type_name, &parts)?;
        Ok(ParsedKey::Public(Key::new(algorithm, parts)?))
    } else if fields.len() == algorithm.private_parts().len() {
        Ok(ParsedKey::Private(build_private(algorithm, &type_name, fields)?))
    } else {
        Err(KeyforgeError::malformed(
            FORMAT,
            format!("{} blob has {} fields", type_name, fields.len()),
        ))
    }
}

pub(super) fn read(data: &[u8], _options: &ParseOptions) -> Result<ParsedKey> {
    read_blob(data)
}

fn write_parts(buf: &mut WireBuffer, key: &Key) -> Result<()> {
    buf.write_string(key.algorithm().ssh_type(key.curve())?);
    for part in key.parts() {
        buf.write_buffer(part.data());
    }
    Ok(())
}

/// The public blob, as hashed for fingerprints
pub(crate) fn write_public(key: &Key) -> Result<Vec<u8>> {
    let mut buf = WireBuffer::new();
    write_parts(&mut buf, key)?;
    Ok(buf.to_bytes())
}

pub(crate) fn write_private_to(buf: &mut WireBuffer, key: &PrivateKey) -> Result<()> {
    buf.write_string(key.algorithm().ssh_type(key.curve())?);
    for part in key.parts() {
        if part.name() == "k" && matches!(key.algorithm(), Algorithm::Ed25519 | Algorithm::Curve25519) {
            buf.write_buffer(&[part.data(), key.require_part("A")?].concat());
        } else {
            buf.write_buffer(part.data());
        }
    }
    Ok(())
}

pub(super) fn write(key: KeyRef<'_>, _options: &WriteOptions) -> Result<Vec<u8>> {
    match key {
        KeyRef::Public(key) => write_public(key),
        KeyRef::Private(key) => {
            let mut buf = WireBuffer::new();
            write_private_to(&mut buf, key)?;
            Ok(buf.to_bytes())
        }
    }
}
