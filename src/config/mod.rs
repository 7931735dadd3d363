//! Call configuration
//!
//! Every operation that can be tuned takes a plain options struct:
//! - `ParseOptions`: filename for messages, passphrase
//! - `WriteOptions`: passphrase, comment override, DNSSEC hash
//! - `GenerateOptions`: curve

mod options;

pub use options::{GenerateOptions, ParseOptions, WriteOptions, UNNAMED};
