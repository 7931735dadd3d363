//! PEM armour (RFC 7468) and label dispatch
//!
//! The `pem`, `pkcs1` and `pkcs8` codecs all read the same way: the label
//! decides which DER structure follows. They differ in what they write.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{as_text, key_encrypted, pkcs1, pkcs8, ssh_private, Format, KeyRef, ParsedKey};
use crate::algs::Algorithm;
use crate::config::{ParseOptions, WriteOptions};
use crate::error::{KeyforgeError, Result};

const FORMAT: &str = "pem";

/// Base64 line width for everything but OpenSSH
pub(crate) const LINE_WIDTH: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct Armor {
    pub label: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Armor {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Legacy OpenSSL encryption (`Proc-Type: 4,ENCRYPTED`)
    pub fn is_encrypted(&self) -> bool {
        self.header("Proc-Type")
            .is_some_and(|v| v.split(',').any(|f| f.trim() == "ENCRYPTED"))
    }
}

fn boundary<'a>(line: &'a str, kind: &str) -> Option<&'a str> {
    let rest = line.trim_start_matches('-').trim_start();
    let label = rest.strip_prefix(kind)?.trim_start();
    Some(label.trim_end_matches('-').trim())
}

pub(crate) fn decode(text: &str) -> Result<Armor> {
    let mut lines = text.lines().map(str::trim);
    let label = lines
        .by_ref()
        .find_map(|line| line.starts_with('-').then(|| boundary(line, "BEGIN")).flatten())
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, "no BEGIN line"))?
        .to_string();

    let mut headers = Vec::new();
    let mut body = String::new();
    let mut ended = false;
    for line in lines {
        if line.starts_with('-') {
            match boundary(line, "END") {
                Some(end) if end == label => {
                    ended = true;
                    break;
                }
                _ => {
                    return Err(KeyforgeError::malformed(
                        FORMAT,
                        format!("END line does not match BEGIN {}", label),
                    ))
                }
            }
        }
        match line.split_once(':') {
            Some((name, value)) if body.is_empty() => {
                headers.push((name.trim().to_string(), value.trim().to_string()));
            }
            _ => body.push_str(line),
        }
    }
    if !ended {
        return Err(KeyforgeError::malformed(FORMAT, format!("missing END {}", label)));
    }

    Ok(Armor {
        label,
        headers,
        body: STANDARD.decode(body)?,
    })
}

pub(crate) fn encode(label: &str, body: &[u8], width: usize) -> String {
    let encoded = STANDARD.encode(body);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in encoded.as_bytes().chunks(width) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Reads any supported PEM key; `format` names the codec in errors
pub(crate) fn read_as(data: &[u8], options: &ParseOptions, format: Format) -> Result<ParsedKey> {
    let armor = decode(as_text(data, format.name())?)?;
    if armor.is_encrypted() {
        if options.passphrase.is_none() {
            return Err(key_encrypted(options, format));
        }
        return Err(KeyforgeError::UnsupportedFormat {
            format: format.name().to_string(),
            operation: "decrypting legacy Proc-Type encrypted keys".to_string(),
        });
    }

    let der = armor.body.as_slice();
    match armor.label.as_str() {
        "RSA PRIVATE KEY" => pkcs1::read_private(Algorithm::Rsa, der),
        "DSA PRIVATE KEY" => pkcs1::read_private(Algorithm::Dsa, der),
        "EC PRIVATE KEY" => pkcs1::read_private(Algorithm::Ecdsa, der),
        "EDDSA PRIVATE KEY" => pkcs1::read_private(Algorithm::Ed25519, der),
        "RSA PUBLIC KEY" => pkcs1::read_public(Algorithm::Rsa, der),
        "DSA PUBLIC KEY" => pkcs1::read_public(Algorithm::Dsa, der),
        "PRIVATE KEY" => pkcs8::read_private(der),
        "PUBLIC KEY" => pkcs8::read_public(der),
        "ENCRYPTED PRIVATE KEY" => match &options.passphrase {
            Some(passphrase) => pkcs8::read_encrypted(der, passphrase),
            None => Err(key_encrypted(options, format)),
        },
        "OPENSSH PRIVATE KEY" => ssh_private::read_container(der, options),
        other => Err(KeyforgeError::malformed(
            FORMAT,
            format!("unsupported PEM label \"{}\"", other),
        )),
    }
}

pub(super) fn read(data: &[u8], options: &ParseOptions) -> Result<ParsedKey> {
    read_as(data, options, Format::Pem)
}

/// PKCS#8 output
pub(super) fn write(key: KeyRef<'_>, options: &WriteOptions) -> Result<Vec<u8>> {
    pkcs8::write_pem(key, options)
}
