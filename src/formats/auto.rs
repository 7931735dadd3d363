//! Content sniffing
//!
//! Checks run in a fixed order and the first match wins. Only a prefix of
//! the input is examined and nothing is consumed. The final RFC 4253 check
//! is a length sanity test, not a real signature: arbitrary binary data
//! can pass it, in which case the codec rejects it instead.

use tracing::debug;

use super::{Format, KeyRef, ParsedKey};
use crate::config::{ParseOptions, WriteOptions};
use crate::error::{KeyforgeError, Result};

const DNSSEC_PRIVATE_PREFIX: &[u8] = b"Private-key-format: v1";
const PUTTY_PREFIX: &[u8] = b"putty-user-key-file-2:";

fn skip_while(data: &[u8], from: usize, pred: impl Fn(u8) -> bool) -> usize {
    data[from..]
        .iter()
        .position(|&b| !pred(b))
        .map_or(data.len(), |pos| from + pos)
}

fn is_pem(data: &[u8]) -> bool {
    let start = skip_while(data, 0, |b| b == b' ' || b == b'\n' || b == b'\r' || b == b'\t');
    if data.get(start) != Some(&b'-') {
        return false;
    }
    let offset = skip_while(data, start, |b| b == b'-');
    let offset = skip_while(data, offset, |b| b == b' ');
    data[offset..].starts_with(b"BEGIN")
}

fn skip_blank(data: &[u8]) -> &[u8] {
    &data[skip_while(data, 0, |b| b == b' ' || b == b'\n' || b == b'\r' || b == b'\t')..]
}

fn is_ssh(data: &[u8]) -> bool {
    let rest = skip_blank(data);
    rest.starts_with(b"ssh-") || rest.starts_with(b"ecdsa-")
}

fn is_putty(data: &[u8]) -> bool {
    let rest = skip_blank(data);
    rest.len() >= PUTTY_PREFIX.len() && rest[..PUTTY_PREFIX.len()].eq_ignore_ascii_case(PUTTY_PREFIX)
}

fn is_dnssec(data: &[u8]) -> bool {
    if data.len() <= DNSSEC_PRIVATE_PREFIX.len() {
        return false;
    }
    if data.starts_with(DNSSEC_PRIVATE_PREFIX) {
        return true;
    }
    // public records: `example.com. IN DNSKEY ...` after any `;` comments
    let text = String::from_utf8_lossy(data);
    match text.lines().find(|line| !line.starts_with(';')) {
        Some(line) => line.contains(". IN KEY ") || line.contains(". IN DNSKEY "),
        None => false,
    }
}

fn is_rfc4253(data: &[u8]) -> bool {
    match data.get(..4) {
        Some(len) => (u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize) < data.len(),
        None => false,
    }
}

/// Picks the format of `data`
pub fn detect(data: &[u8]) -> Result<Format> {
    let format = if is_pem(data) {
        Format::Pem
    } else if is_ssh(data) {
        Format::Ssh
    } else if is_putty(data) {
        Format::Putty
    } else if is_dnssec(data) {
        Format::Dnssec
    } else if is_rfc4253(data) {
        Format::Rfc4253
    } else {
        return Err(KeyforgeError::Detection);
    };
    debug!(%format, "detected key format");
    Ok(format)
}

pub(super) fn read(data: &[u8], options: &ParseOptions) -> Result<ParsedKey> {
    super::read(data, detect(data)?, options)
}

pub(super) fn write(_key: KeyRef<'_>, _options: &WriteOptions) -> Result<Vec<u8>> {
    Err(KeyforgeError::UnsupportedFormat {
        format: Format::Auto.name().to_string(),
        operation: "writing".to_string(),
    })
}
