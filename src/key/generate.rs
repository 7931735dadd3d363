use tracing::debug;

use super::PrivateKey;
use crate::algs::{Algorithm, Part};
use crate::config::GenerateOptions;
use crate::crypto::keys::{ec_generate, KeyPair};
use crate::error::{KeyforgeError, Result};

impl PrivateKey {
    /// Fresh random key. Only `ecdsa` (nistp256 by default, or nistp384)
    /// and `ed25519` can be generated.
    pub fn generate(algorithm: Algorithm, options: &GenerateOptions) -> Result<PrivateKey> {
        match algorithm {
            Algorithm::Ecdsa => {
                let curve = options.curve;
                debug!(%algorithm, %curve, "generating key");
                let (q, d) = ec_generate(curve)?;
                PrivateKey::new(
                    algorithm,
                    vec![
                        Part::new("curve", curve.name()),
                        Part::new("Q", q),
                        Part::new("d", d),
                    ],
                )
            }
            Algorithm::Ed25519 => {
                debug!(%algorithm, "generating key");
                let pair = KeyPair::generate_ed25519();
                PrivateKey::new(
                    algorithm,
                    vec![
                        Part::new("A", pair.public_key_bytes()),
                        Part::new("k", pair.private_key_bytes()),
                    ],
                )
            }
            other => Err(KeyforgeError::UnsupportedKeyType(other.name().to_string())),
        }
    }
}
