//! OpenSSH public key lines: `<type> <base64 blob> [comment]`

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::{as_text, comment_for, rfc4253, KeyRef, ParsedKey};
use crate::algs::Algorithm;
use crate::config::{ParseOptions, WriteOptions};
use crate::error::{KeyforgeError, Result};
use crate::key::Key;

const FORMAT: &str = "ssh";

pub(super) fn read(data: &[u8], _options: &ParseOptions) -> Result<ParsedKey> {
    let text = as_text(data, FORMAT)?.trim();
    let mut fields = text.splitn(3, |c: char| c == ' ' || c == '\t');
    let type_name = fields.next().unwrap_or_default();
    let encoded = fields
        .next()
        .ok_or_else(|| KeyforgeError::malformed(FORMAT, "missing key data"))?;
    let comment = fields.next().map(str::trim).filter(|c| !c.is_empty());

    let blob = STANDARD.decode(encoded.trim())?;
    let key = rfc4253::read_public_blob(&blob)?;

    let (declared, _) = Algorithm::from_ssh_type(type_name)?;
    if declared != key.algorithm() {
        return Err(KeyforgeError::malformed(
            FORMAT,
            format!("line says {} but the blob holds {}", type_name, key.algorithm()),
        ));
    }

    Ok(ParsedKey::Public(match comment {
        Some(comment) => key.with_comment(comment),
        None => key,
    }))
}

/// Single-line rendering, no trailing newline
pub(crate) fn write_line(key: &Key, comment: Option<&str>) -> Result<String> {
    let blob = rfc4253::write_public(key)?;
    let mut line = format!(
        "{} {}",
        key.algorithm().ssh_type(key.curve())?,
        STANDARD.encode(blob)
    );
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        line.push(' ');
        line.push_str(comment);
    }
    Ok(line)
}

pub(super) fn write(key: KeyRef<'_>, options: &WriteOptions) -> Result<Vec<u8>> {
    let mut line = write_line(key.public(), Some(comment_for(key, options)))?;
    line.push('\n');
    Ok(line.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::Part;

    const ED25519_LINE: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQ user@example";

    #[test]
    fn test_read_line_with_comment() {
        let key = read(ED25519_LINE.as_bytes(), &ParseOptions::default())
            .unwrap()
            .into_public();
        assert_eq!(key.algorithm(), Algorithm::Ed25519);
        assert_eq!(key.part("A").unwrap(), &[0x10u8; 32][..]);
        assert_eq!(key.comment(), Some("user@example"));
    }

    #[test]
    fn test_write_matches_openssh() {
        let key = Key::new(Algorithm::Ed25519, vec![Part::new("A", vec![0x10u8; 32])])
            .unwrap()
            .with_comment("user@example");
        let out = write(KeyRef::Public(&key), &WriteOptions::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), format!("{}\n", ED25519_LINE));
        assert_eq!(key.to_string(), ED25519_LINE);
    }

    #[test]
    fn test_comment_override() {
        let key = Key::new(Algorithm::Ed25519, vec![Part::new("A", vec![0x10u8; 32])]).unwrap();
        let options = WriteOptions::new().with_comment("other");
        let out = String::from_utf8(write(KeyRef::Public(&key), &options).unwrap()).unwrap();
        assert!(out.trim_end().ends_with(" other"));
    }

    #[test]
    fn test_mismatched_type_rejected() {
        let line = ED25519_LINE.replacen("ssh-ed25519", "ssh-rsa", 1);
        assert!(read(line.as_bytes(), &ParseOptions::default()).is_err());
    }

    #[test]
    fn test_missing_blob() {
        assert!(read(b"ssh-ed25519", &ParseOptions::default()).is_err());
    }
}
