//! PuTTY `.ppk` files
//!
//! ```text
//! PuTTY-User-Key-File-2: ssh-ed25519
//! Encryption: none
//! Comment: user@host
//! Public-Lines: 2
//! <base64 public blob>
//! Private-Lines: 1
//! <base64 private fields>
//! Private-MAC: <hex>
//! ```
//!
//! The public blob is an RFC 4253 blob. The private blob holds only the
//! fields the public one lacks. The MAC is not checked.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{as_text, comment_for, key_encrypted, rfc4253, Format, KeyRef, ParsedKey};
use crate::algs::{Algorithm, Part};
use crate::config::{ParseOptions, WriteOptions};
use crate::error::{KeyforgeError, Result};
use crate::key::PrivateKey;
use crate::wire::WireBuffer;

const FORMAT: &str = "putty";
const LINE_WIDTH: usize = 64;

/// Fields of the private blob, in file order
fn private_fields(algorithm: Algorithm) -> &'static [&'static str] {
    match algorithm {
        Algorithm::Rsa => &["d", "p", "q", "iqmp"],
        Algorithm::Dsa => &["x"],
        Algorithm::Ecdsa => &["d"],
        Algorithm::Ed25519 | Algorithm::Curve25519 => &["k"],
    }
}

struct PpkFile<'a> {
    key_type: &'a str,
    encryption: &'a str,
    comment: Option<&'a str>,
    public: Vec<u8>,
    private: Option<Vec<u8>>,
}

fn header<'a>(line: &'a str) -> Result<(&'a str, &'a str)> {
    line.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, format!("expected a header, found \"{}\"", line)))
}

fn read_lines<'a>(lines: &mut impl Iterator<Item = &'a str>, count: &str) -> Result<Vec<u8>> {
    let count: usize = count
        .parse()
        .map_err(|_| KeyforgeError::malformed(FORMAT, format!("bad line count \"{}\"", count)))?;
    let mut encoded = String::new();
    for _ in 0..count {
        let line = lines
            .next()
            .ok_or_else(|| KeyforgeError::malformed(FORMAT, "file ends inside a key block"))?;
        encoded.push_str(line.trim());
    }
    Ok(STANDARD.decode(encoded)?)
}

fn parse_file(text: &str) -> Result<PpkFile<'_>> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let (version, key_type) = header(lines.next().unwrap_or_default())?;
    if !(version.eq_ignore_ascii_case("PuTTY-User-Key-File-2")
        || version.eq_ignore_ascii_case("PuTTY-User-Key-File-3"))
    {
        return Err(KeyforgeError::malformed(FORMAT, format!("unsupported version \"{}\"", version)));
    }

    let mut file = PpkFile {
        key_type,
        encryption: "none",
        comment: None,
        public: Vec::new(),
        private: None,
    };
    let mut seen_public = false;
    while let Some(line) = lines.next() {
        let (name, value) = header(line)?;
        match name {
            "Encryption" => file.encryption = value,
            "Comment" => file.comment = Some(value).filter(|c| !c.is_empty()),
            "Public-Lines" => {
                file.public = read_lines(&mut lines, value)?;
                seen_public = true;
            }
            "Private-Lines" => file.private = Some(read_lines(&mut lines, value)?),
            // Private-MAC, Key-Derivation, Argon2-* ...
            _ => {}
        }
    }
    if !seen_public {
        return Err(KeyforgeError::malformed(FORMAT, "no Public-Lines"));
    }
    Ok(file)
}

pub(super) fn read(data: &[u8], options: &ParseOptions) -> Result<ParsedKey> {
    let file = parse_file(as_text(data, FORMAT)?)?;
    let public = rfc4253::read_public_blob(&file.public)?;
    let (declared, _) = Algorithm::from_ssh_type(file.key_type)?;
    if declared != public.algorithm() {
        return Err(KeyforgeError::malformed(FORMAT, "key type does not match public blob"));
    }

    let private = match file.private {
        None => None,
        Some(_) if file.encryption != "none" => {
            if options.passphrase.is_none() {
                return Err(key_encrypted(options, Format::Putty));
            }
            return Err(KeyforgeError::UnsupportedFormat {
                format: FORMAT.to_string(),
                operation: format!("decrypting {} keys", file.encryption),
            });
        }
        Some(blob) => {
            let mut buf = WireBuffer::from_bytes(&blob);
            let mut parts = public.parts().to_vec();
            for name in private_fields(public.algorithm()) {
                parts.push(Part::new(*name, buf.read_buffer()?));
            }
            Some(PrivateKey::new(public.algorithm(), parts)?)
        }
    };

    Ok(match (private, file.comment) {
        (Some(key), Some(comment)) => ParsedKey::Private(key.with_comment(comment)),
        (Some(key), None) => ParsedKey::Private(key),
        (None, Some(comment)) => ParsedKey::Public(public.with_comment(comment)),
        (None, None) => ParsedKey::Public(public),
    })
}

/// Public half only
pub(super) fn write(key: KeyRef<'_>, options: &WriteOptions) -> Result<Vec<u8>> {
    let public = key.public();
    let encoded = STANDARD.encode(rfc4253::write_public(public)?);
    let lines: Vec<&str> = encoded
        .as_bytes()
        .chunks(LINE_WIDTH)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect();

    let mut out = format!(
        "PuTTY-User-Key-File-2: {}\nEncryption: none\nComment: {}\nPublic-Lines: {}\n",
        public.algorithm().ssh_type(public.curve())?,
        comment_for(key, options),
        lines.len()
    );
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    Ok(out.into_bytes())
}
