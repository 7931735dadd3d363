//! Structural identity across builds
//!
//! Several copies of this crate can end up linked into one program (two
//! dependency versions, a plugin built separately). Their `Key` types are
//! distinct to the compiler, so compatibility is decided from a runtime
//! marker instead: every value reports what it is and which API version
//! produced it.

use serde::{Deserialize, Serialize};

/// API version pair `[major, minor]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApiVersion(pub u32, pub u32);

impl ApiVersion {
    pub const KEY: ApiVersion = ApiVersion(1, 7);
    pub const PRIVATE_KEY: ApiVersion = ApiVersion(1, 6);
    pub const SIGNATURE: ApiVersion = ApiVersion(2, 1);
    pub const FINGERPRINT: ApiVersion = ApiVersion(1, 2);

    /// Same major version and at least the requested minor
    pub fn satisfies(self, needed: ApiVersion) -> bool {
        self.0 == needed.0 && self.1 >= needed.1
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

/// What kind of value a marker describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Key,
    PrivateKey,
    Signature,
    Fingerprint,
}

impl Kind {
    /// A private key can stand in wherever a key is expected
    fn is_a(self, wanted: Kind) -> bool {
        self == wanted || (self == Kind::PrivateKey && wanted == Kind::Key)
    }
}

/// Runtime marker carried by every value in this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub kind: Kind,
    pub version: ApiVersion,
}

pub trait Tagged {
    fn marker(&self) -> Marker;
}

/// Accepts any value whose marker claims `kind` (or a subtype) at a version
/// satisfying `needed`, regardless of which build produced it.
pub fn is_compatible(obj: &dyn Tagged, kind: Kind, needed: ApiVersion) -> bool {
    let marker = obj.marker();
    marker.kind.is_a(kind) && marker.version.satisfies(needed)
}
