//! Key file formats
//!
//! Each format is a stateless codec: a `read` turning bytes into a key and a
//! `write` turning a key into bytes. The set of formats is closed; names,
//! including aliases, resolve to a [`Format`] and the codec table is a
//! `match` on it.

mod auto;
pub(crate) mod der;
mod dnssec;
mod pem;
mod pkcs1;
mod pkcs8;
mod putty;
pub(crate) mod rfc4253;
pub(crate) mod ssh;
mod ssh_private;

use std::fmt;

use tracing::trace;

pub use auto::detect;

use crate::algs::{Algorithm, Curve};
use crate::config::{ParseOptions, WriteOptions};
use crate::error::{KeyforgeError, Result};
use crate::key::{Key, PrivateKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Detect from content (reading only)
    Auto,
    /// PEM armour, dispatched on its label
    Pem,
    Pkcs1,
    Pkcs8,
    /// Binary SSH wire blob
    Rfc4253,
    /// `type base64 comment` line
    Ssh,
    /// `openssh-key-v1` container
    SshPrivate,
    /// PuTTY `.ppk` v2
    Putty,
    /// BIND DNSSEC key files
    Dnssec,
}

/// Which kind of key a format name is being resolved for.
///
/// `ssh` means the public line for public keys and the OpenSSH private
/// container for private keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameContext {
    Public,
    Private,
}

impl Format {
    pub const ALL: [Format; 9] = [
        Format::Auto,
        Format::Pem,
        Format::Pkcs1,
        Format::Pkcs8,
        Format::Rfc4253,
        Format::Ssh,
        Format::SshPrivate,
        Format::Putty,
        Format::Dnssec,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::Auto => "auto",
            Format::Pem => "pem",
            Format::Pkcs1 => "pkcs1",
            Format::Pkcs8 => "pkcs8",
            Format::Rfc4253 => "rfc4253",
            Format::Ssh => "ssh",
            Format::SshPrivate => "ssh-private",
            Format::Putty => "putty",
            Format::Dnssec => "dnssec",
        }
    }

    /// Resolves a format name or alias
    pub fn from_name(name: &str, context: NameContext) -> Result<Format> {
        Ok(match (name, context) {
            ("auto", _) => Format::Auto,
            ("pem", _) => Format::Pem,
            ("pkcs1", _) => Format::Pkcs1,
            ("pkcs8", _) => Format::Pkcs8,
            ("rfc4253", _) => Format::Rfc4253,
            ("ssh", NameContext::Public) => Format::Ssh,
            ("ssh", NameContext::Private) | ("openssh", _) | ("ssh-private", _) => Format::SshPrivate,
            ("putty" | "ppk", _) => Format::Putty,
            ("dnssec", _) => Format::Dnssec,
            _ => return Err(KeyforgeError::UnknownFormat(name.to_string())),
        })
    }

    fn codec(self) -> Codec {
        match self {
            Format::Auto => Codec {
                read: auto::read,
                write: auto::write,
            },
            Format::Pem => Codec {
                read: pem::read,
                write: pem::write,
            },
            Format::Pkcs1 => Codec {
                read: pkcs1::read,
                write: pkcs1::write,
            },
            Format::Pkcs8 => Codec {
                read: pkcs8::read,
                write: pkcs8::write,
            },
            Format::Rfc4253 => Codec {
                read: rfc4253::read,
                write: rfc4253::write,
            },
            Format::Ssh => Codec {
                read: ssh::read,
                write: ssh::write,
            },
            Format::SshPrivate => Codec {
                read: ssh_private::read,
                write: ssh_private::write,
            },
            Format::Putty => Codec {
                read: putty::read,
                write: putty::write,
            },
            Format::Dnssec => Codec {
                read: dnssec::read,
                write: dnssec::write,
            },
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct Codec {
    read: fn(&[u8], &ParseOptions) -> Result<ParsedKey>,
    write: fn(KeyRef<'_>, &WriteOptions) -> Result<Vec<u8>>,
}

/// Whatever a codec found
#[derive(Debug, Clone)]
pub enum ParsedKey {
    Public(Key),
    Private(PrivateKey),
}

impl ParsedKey {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            ParsedKey::Public(key) => key.algorithm(),
            ParsedKey::Private(key) => key.algorithm(),
        }
    }

    pub fn into_public(self) -> Key {
        match self {
            ParsedKey::Public(key) => key,
            ParsedKey::Private(key) => key.to_public().clone(),
        }
    }

    pub fn into_private(self) -> Result<PrivateKey> {
        match self {
            ParsedKey::Public(_) => Err(KeyforgeError::NotPrivateKey),
            ParsedKey::Private(key) => Ok(key),
        }
    }
}

/// A key handed to a codec for writing
#[derive(Debug, Clone, Copy)]
pub enum KeyRef<'a> {
    Public(&'a Key),
    Private(&'a PrivateKey),
}

impl<'a> KeyRef<'a> {
    pub fn algorithm(self) -> Algorithm {
        match self {
            KeyRef::Public(key) => key.algorithm(),
            KeyRef::Private(key) => key.algorithm(),
        }
    }

    pub fn curve(self) -> Option<Curve> {
        match self {
            KeyRef::Public(key) => key.curve(),
            KeyRef::Private(key) => key.curve(),
        }
    }

    pub fn comment(self) -> Option<&'a str> {
        match self {
            KeyRef::Public(key) => key.comment(),
            KeyRef::Private(key) => key.comment(),
        }
    }

    pub fn public(self) -> &'a Key {
        match self {
            KeyRef::Public(key) => key,
            KeyRef::Private(key) => key.to_public(),
        }
    }

    pub fn private(self) -> Option<&'a PrivateKey> {
        match self {
            KeyRef::Public(_) => None,
            KeyRef::Private(key) => Some(key),
        }
    }
}

/// Comment to write: the override, else the key's own
pub(crate) fn comment_for<'a>(key: KeyRef<'a>, options: &'a WriteOptions) -> &'a str {
    options
        .comment
        .as_deref()
        .or_else(|| key.comment())
        .unwrap_or("")
}

/// Reads `data` as `format`, detecting it first for [`Format::Auto`]
pub fn read(data: &[u8], format: Format, options: &ParseOptions) -> Result<ParsedKey> {
    trace!(%format, len = data.len(), "reading key");
    (format.codec().read)(data, options)
}

pub fn write(key: KeyRef<'_>, format: Format, options: &WriteOptions) -> Result<Vec<u8>> {
    trace!(%format, algorithm = %key.algorithm(), "writing key");
    (format.codec().write)(key, options)
}

/// Text view of input for the line-oriented formats
pub(crate) fn as_text<'a>(data: &'a [u8], format: &str) -> Result<&'a str> {
    std::str::from_utf8(data).map_err(|_| KeyforgeError::malformed(format, "input is not valid UTF-8 text"))
}

pub(crate) fn key_encrypted(options: &ParseOptions, format: Format) -> KeyforgeError {
    KeyforgeError::KeyEncrypted {
        name: options.name().to_string(),
        format: format.name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest(name, context, expected,
        case("ssh", NameContext::Public, Format::Ssh),
        case("ssh", NameContext::Private, Format::SshPrivate),
        case("openssh", NameContext::Private, Format::SshPrivate),
        case("ssh-private", NameContext::Public, Format::SshPrivate),
        case("pkcs8", NameContext::Public, Format::Pkcs8),
        case("ppk", NameContext::Private, Format::Putty),
    )]
    fn test_name_aliases(name: &str, context: NameContext, expected: Format) {
        assert_eq!(Format::from_name(name, context).unwrap(), expected);
    }

    #[test]
    fn test_canonical_names_resolve() {
        for format in Format::ALL {
            assert_eq!(Format::from_name(format.name(), NameContext::Public).unwrap(), format);
        }
    }

    #[test]
    fn test_unknown_name() {
        assert!(matches!(
            Format::from_name("x509", NameContext::Public),
            Err(KeyforgeError::UnknownFormat(_))
        ));
    }
}
