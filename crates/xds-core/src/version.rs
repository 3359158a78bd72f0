//! Content-addressed resource versions.
//!
//! This module provides [`ResourceVersion`]. Versions of revisions are derived
//! from the content they describe, so two identical specifications always map
//! to the same version and any change mints a new one.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of digest bytes kept in a content version (32 hex characters).
const CONTENT_DIGEST_BYTES: usize = 16;

/// Version identifier for a revision or snapshot.
///
/// An empty version represents "nothing published yet".
///
/// # Example
///
/// ```rust
/// use xds_core::ResourceVersion;
///
/// let v1 = ResourceVersion::from_content(b"listeners: []");
/// let v1_again = ResourceVersion::from_content(b"listeners: []");
/// let v2 = ResourceVersion::from_content(b"listeners: [l1]");
///
/// assert_eq!(v1, v1_again);
/// assert_ne!(v1, v2);
/// assert!(ResourceVersion::empty().is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    /// Create a resource version from an existing string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Derive a version from canonical content bytes (truncated SHA-256, hex).
    #[must_use]
    pub fn from_content(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        Self(hex::encode(&digest[..CONTENT_DIGEST_BYTES]))
    }

    /// Create an empty resource version.
    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Check if the version is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResourceVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ResourceVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ResourceVersion {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ResourceVersion {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
