use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeyforgeError>;

#[derive(Debug, Error)]
pub enum KeyforgeError {
    #[error("Fingerprint format is not supported, or is invalid:{}", fingerprint_detail(.fingerprint, .format))]
    FingerprintFormat {
        fingerprint: Option<String>,
        format: Option<String>,
    },

    #[error("Algorithm \"{algorithm}\" is not supported")]
    InvalidAlgorithm { algorithm: String },

    #[error("Failed to parse {name} as a valid {format} format key: {source}")]
    KeyParse {
        name: String,
        format: String,
        #[source]
        source: Box<KeyforgeError>,
    },

    #[error("Failed to parse the given data as a {kind} signature in {format} format: {source}")]
    SignatureParse {
        kind: String,
        format: String,
        #[source]
        source: Box<KeyforgeError>,
    },

    #[error("Failed to parse {name} as a valid {format} format certificate: {source}")]
    CertificateParse {
        name: String,
        format: String,
        #[source]
        source: Box<KeyforgeError>,
    },

    #[error("The {format} format key {name} is encrypted (password-protected), and no passphrase was provided in `options`")]
    KeyEncrypted { name: String, format: String },

    #[error("length out of bounds at +0x{offset:x}: need {needed} bytes, {available} left (data truncated?)")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("c string does not terminate (started at +0x{0:x})")]
    UnterminatedString(usize),

    #[error("value must fit in 64 bits of precision")]
    Int64Overflow,

    #[error("Failed to auto-detect format of key")]
    Detection,

    #[error("Unknown key format \"{0}\"")]
    UnknownFormat(String),

    #[error("\"{format}\" format cannot be used for {operation}")]
    UnsupportedFormat { format: String, operation: String },

    #[error("Key derivation not supported from {from} to {to}")]
    UnsupportedConversion { from: String, to: String },

    #[error("Key generation not supported with key type \"{0}\"")]
    UnsupportedKeyType(String),

    #[error("Curve \"{0}\" is not supported")]
    UnsupportedCurve(String),

    #[error("Curve25519 keys are not suitable for signing or verification")]
    NotSigningKey,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed {format} data: {reason}")]
    Malformed { format: String, reason: String },

    #[error("key is not a private key")]
    NotPrivateKey,

    #[error("ED25519 only supports the use of SHA-512 hashes (got {0})")]
    Ed25519HashRequired(String),

    #[error("signature was created by too old a version of keyforge and cannot be verified")]
    SignatureTooOld,

    #[error("Crypto provider error: {0}")]
    Crypto(String),

    #[error("base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn fingerprint_detail(fingerprint: &Option<String>, format: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(fp) = fingerprint {
        out.push_str(&format!(" fingerprint = {}", fp));
    }
    if let Some(fmt) = format {
        out.push_str(&format!(" format = {}", fmt));
    }
    out
}

impl KeyforgeError {
    pub(crate) fn malformed(format: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn crypto(err: impl std::fmt::Display) -> Self {
        Self::Crypto(err.to_string())
    }

    /// The wrapped cause of a parse failure, if this error wraps one
    pub fn cause(&self) -> Option<&KeyforgeError> {
        match self {
            Self::KeyParse { source, .. }
            | Self::SignatureParse { source, .. }
            | Self::CertificateParse { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// True for the one failure callers can fix by supplying a passphrase
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::KeyEncrypted { .. })
    }
}
