//! Key fingerprints in OpenSSH notation
//!
//! `SHA256:<unpadded base64>` is the default rendering; the hex form is
//! colon separated (`SHA1:ab:cd:...`). Parsing accepts either, and bare
//! colon-hex whose length identifies the digest.

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine as _,
};
use serde::{Deserialize, Serialize};

use crate::algs::HashAlgorithm;
use crate::error::{KeyforgeError, Result};
use crate::key::Key;
use crate::version::{ApiVersion, Kind, Marker, Tagged};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintEncoding {
    Base64,
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    algorithm: HashAlgorithm,
    hash: Vec<u8>,
}

impl Fingerprint {
    pub fn new(algorithm: HashAlgorithm, hash: Vec<u8>) -> Self {
        Self { algorithm, hash }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    pub fn to_string_as(&self, encoding: FingerprintEncoding) -> String {
        let prefix = self.algorithm.name().to_uppercase();
        match encoding {
            FingerprintEncoding::Base64 => format!("{}:{}", prefix, STANDARD_NO_PAD.encode(&self.hash)),
            FingerprintEncoding::Hex => {
                let pairs: Vec<String> = self.hash.iter().map(|b| format!("{:02x}", b)).collect();
                format!("{}:{}", prefix, pairs.join(":"))
            }
        }
    }

    pub fn parse(text: &str) -> Result<Fingerprint> {
        let text = text.trim();
        let invalid = || KeyforgeError::FingerprintFormat {
            fingerprint: Some(text.to_string()),
            format: None,
        };

        let (algorithm, body) = match text.split_once(':') {
            Some((prefix, rest)) => match prefix.parse::<HashAlgorithm>() {
                Ok(algorithm) => (Some(algorithm), rest),
                Err(_) => (None, text),
            },
            None => (None, text),
        };

        let hex_digits: String = body.chars().filter(|&c| c != ':').collect();
        let from_hex = hex::decode(&hex_digits).ok().filter(|bytes| {
            algorithm.map_or(true, |a| bytes.len() == a.output_len())
        });

        let (algorithm, hash) = match (algorithm, from_hex) {
            (Some(algorithm), Some(hash)) => (algorithm, hash),
            (None, Some(hash)) => (hash_for_len(hash.len()).ok_or_else(invalid)?, hash),
            (Some(algorithm), None) => {
                let hash = STANDARD
                    .decode(body.trim_end_matches('=').to_string() + padding(body))
                    .map_err(|_| invalid())?;
                (algorithm, hash)
            }
            (None, None) => return Err(invalid()),
        };

        if hash.len() != algorithm.output_len() {
            return Err(invalid());
        }
        Ok(Fingerprint { algorithm, hash })
    }

    /// True when `key` hashes to this fingerprint
    pub fn matches(&self, key: &Key) -> Result<bool> {
        Ok(key.hash(self.algorithm)? == self.hash)
    }
}

fn hash_for_len(len: usize) -> Option<HashAlgorithm> {
    [
        HashAlgorithm::Sha1,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha512,
    ]
    .into_iter()
    .find(|h| h.output_len() == len)
}

/// Padding needed to make unpadded base64 decodable by the padded engine
fn padding(body: &str) -> &'static str {
    match body.trim_end_matches('=').len() % 4 {
        2 => "==",
        3 => "=",
        _ => "",
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_as(FingerprintEncoding::Base64))
    }
}

impl Tagged for Fingerprint {
    fn marker(&self) -> Marker {
        Marker {
            kind: Kind::Fingerprint,
            version: ApiVersion::FINGERPRINT,
        }
    }
}
