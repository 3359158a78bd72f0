//! Node identification for per-node snapshots.
//!
//! This module provides [`NodeId`], the validated identity of a proxy node.
//! The FNV-1a hash of the id is computed once at construction so that cache
//! lookups never rehash the string.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use fnv::FnvHasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::XdsError;

/// Maximum length of a node id (DNS-1123 subdomain).
const MAX_NODE_ID_LEN: usize = 253;

/// Validated, cheaply clonable proxy node identifier.
///
/// Node ids follow DNS-1123 subdomain syntax: lowercase alphanumeric labels
/// separated by dots, where each label may contain inner dashes.
///
/// # Example
///
/// ```rust
/// use xds_core::NodeId;
///
/// let node1 = NodeId::new("envoy-node-1").unwrap();
/// let node2 = NodeId::new("envoy-node-2").unwrap();
///
/// assert_ne!(node1, node2);
/// assert!(NodeId::new("Not_Valid").is_err());
/// ```
#[derive(Clone)]
pub struct NodeId {
    id: Arc<str>,
    hash: u64,
}

impl NodeId {
    /// Create a node id, validating its syntax.
    pub fn new(id: impl AsRef<str>) -> Result<Self, XdsError> {
        let id = id.as_ref();
        validate(id).map_err(|reason| XdsError::InvalidObject {
            kind: "NodeId".to_string(),
            name: id.to_string(),
            reason: reason.to_string(),
        })?;

        let mut hasher = FnvHasher::default();
        hasher.write(id.as_bytes());

        Ok(Self {
            id: Arc::from(id),
            hash: hasher.finish(),
        })
    }

    /// Get the node id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Get the precomputed FNV-1a hash.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.hash
    }
}

fn validate(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("node id cannot be empty");
    }
    if id.len() > MAX_NODE_ID_LEN {
        return Err("node id must be no more than 253 characters");
    }
    for label in id.split('.') {
        let bytes = label.as_bytes();
        let (Some(first), Some(last)) = (bytes.first(), bytes.last()) else {
            return Err("node id labels cannot be empty");
        };
        if !is_alnum(*first) || !is_alnum(*last) {
            return Err("node id labels must start and end with a lowercase alphanumeric character");
        }
        if !bytes.iter().all(|b| is_alnum(*b) || *b == b'-') {
            return Err("node id must consist of lowercase alphanumeric characters, '-' or '.'");
        }
    }
    Ok(())
}

fn is_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.id == other.id
    }
}

impl Eq for NodeId {}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&&*self.id).finish()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl TryFrom<&str> for NodeId {
    type Error = XdsError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodeId::new(raw).map_err(serde::de::Error::custom)
    }
}
