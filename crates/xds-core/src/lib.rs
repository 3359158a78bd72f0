//! # xds-core
//!
//! Core types, traits, and error handling for the xDS revision controller.
//!
//! This crate provides the foundational types used across all other crates:
//!
//! - [`XdsError`] - Error type with an [`ErrorClass`] driving retry policy
//! - [`ResourceVersion`] - Content-addressed versions for revisions
//! - [`NodeId`] - Validated proxy node identity with a precomputed FNV-1a hash
//! - [`Resource`] - Trait for typed proxy configuration objects
//! - [`ResourceCategory`] - The closed set of six resource categories
//!
//! ## Example
//!
//! ```rust
//! use xds_core::{NodeId, ResourceCategory, ResourceVersion};
//!
//! let node = NodeId::new("my-envoy-node").unwrap();
//! let version = ResourceVersion::from_content(b"{}");
//!
//! assert!(!version.is_empty());
//! assert_eq!(ResourceCategory::ALL.len(), 6);
//! assert_eq!(node.as_str(), "my-envoy-node");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod category;
mod error;
mod node;
mod resource;
mod version;

pub use category::ResourceCategory;
pub use error::{ErrorClass, XdsError};
pub use node::NodeId;
pub use resource::{downcast, BoxResource, Resource};
pub use version::ResourceVersion;

/// Result type alias using [`XdsError`].
pub type Result<T> = std::result::Result<T, XdsError>;

/// Alias used by the cache and controller crates.
pub type XdsResult<T> = Result<T>;
