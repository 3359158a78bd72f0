//! Error types for the revision controller.
//!
//! This module provides [`XdsError`], the single error type shared by the
//! cache, the object store contract and both reconcile loops, together with
//! [`ErrorClass`], which decides how a failed reconcile is retried.

use crate::ResourceCategory;

/// How a failed operation should be handled by the reconcile runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Infrastructure failure (object store read/write). Requeued with backoff.
    Transient,
    /// The user-provided specification is wrong. The owning revision is
    /// tainted and a fixed-delay retry is scheduled.
    Specification,
    /// No publishable revision exists. Reported through a condition and not
    /// requeued until something else changes.
    Terminal,
    /// Unexpected failure. Surfaced and retried like a transient error.
    Internal,
}

/// Error type for all revision controller operations.
///
/// # Example
///
/// ```rust
/// use xds_core::{ErrorClass, ResourceCategory, XdsError};
///
/// let err = XdsError::Decode {
///     category: ResourceCategory::Listener,
///     index: 0,
///     field_path: "spec.resources.listeners[0].value".to_string(),
///     value: "{not json".to_string(),
///     reason: "expected value".to_string(),
/// };
/// assert_eq!(err.class(), ErrorClass::Specification);
/// assert!(err.to_string().contains("Listeners"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum XdsError {
    /// A resource value could not be decoded into its typed form.
    #[error("invalid {category} resource value at index {index} ({field_path}): {reason}")]
    Decode {
        /// Category the resource was declared under.
        category: ResourceCategory,
        /// Position of the resource within its category list.
        index: usize,
        /// Path of the offending field in the owning object.
        field_path: String,
        /// The raw value that failed to decode.
        value: String,
        /// Decoder error message.
        reason: String,
    },

    /// A resource decoded fine but violates a category-specific constraint.
    #[error("invalid {category} resource at index {index} ({field_path}): {reason}")]
    Validation {
        /// Category the resource was declared under.
        category: ResourceCategory,
        /// Position of the resource within its category list.
        index: usize,
        /// Path of the offending field in the owning object.
        field_path: String,
        /// Why the resource was rejected.
        reason: String,
    },

    /// The object specification itself is invalid (for example a changed node id).
    #[error("invalid {kind} {name}: {reason}")]
    InvalidObject {
        /// Object kind.
        kind: String,
        /// `namespace/name` of the object.
        name: String,
        /// Why the object was rejected.
        reason: String,
    },

    /// Every revision in the history is tainted or missing.
    #[error("no publishable revision for node {node_id}: desired version {desired} is tainted")]
    RevisionTainted {
        /// Node the revisions belong to.
        node_id: String,
        /// Version computed from the current specification.
        desired: String,
    },

    /// An object looked up in the store does not exist.
    #[error("{kind} {name} not found")]
    NotFound {
        /// Object kind.
        kind: String,
        /// `namespace/name` of the object.
        name: String,
    },

    /// An object with the same key already exists.
    #[error("{kind} {name} already exists")]
    AlreadyExists {
        /// Object kind.
        kind: String,
        /// `namespace/name` of the object.
        name: String,
    },

    /// A write was based on a stale resource version.
    #[error("conflict writing {kind} {name}: stored resource version is {current}, write was based on {attempted}")]
    Conflict {
        /// Object kind.
        kind: String,
        /// `namespace/name` of the object.
        name: String,
        /// Resource version currently stored.
        current: u64,
        /// Resource version carried by the rejected write.
        attempted: u64,
    },

    /// The object store failed to serve a request.
    #[error("object store error during {operation}: {message}")]
    Store {
        /// Operation tag (`get`, `list`, `update_status`, ...).
        operation: &'static str,
        /// Description of the failure.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Snapshot cache operation failed.
    #[error("cache error: {message}")]
    Cache {
        /// Description of the cache error.
        message: String,
    },

    /// Unexpected internal error.
    #[error("internal error during {operation}: {message}")]
    Internal {
        /// Operation tag.
        operation: &'static str,
        /// Error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl XdsError {
    /// Create an internal error from any error type.
    pub fn internal<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal {
            operation,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an object store error from any error type.
    pub fn store<E>(operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            operation,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Classify this error for the reconcile runtime.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            XdsError::Decode { .. }
            | XdsError::Validation { .. }
            | XdsError::InvalidObject { .. } => ErrorClass::Specification,
            XdsError::RevisionTainted { .. } => ErrorClass::Terminal,
            XdsError::NotFound { .. }
            | XdsError::AlreadyExists { .. }
            | XdsError::Conflict { .. }
            | XdsError::Store { .. } => ErrorClass::Transient,
            XdsError::Cache { .. } | XdsError::Internal { .. } | XdsError::Configuration(_) => {
                ErrorClass::Internal
            }
        }
    }

    /// Whether the error was caused by the user-provided specification.
    #[must_use]
    pub fn is_specification(&self) -> bool {
        self.class() == ErrorClass::Specification
    }

    /// Whether the error is a not-found lookup failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, XdsError::NotFound { .. })
    }

    /// Short label used for metrics and condition reasons.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            XdsError::Decode { .. } => "ResourceDecodeError",
            XdsError::Validation { .. } => "ResourceValidationError",
            XdsError::InvalidObject { .. } => "InvalidObject",
            XdsError::RevisionTainted { .. } => "DesiredRevisionTainted",
            XdsError::NotFound { .. } => "NotFound",
            XdsError::AlreadyExists { .. } => "AlreadyExists",
            XdsError::Conflict { .. } => "Conflict",
            XdsError::Store { .. } => "StoreError",
            XdsError::Cache { .. } => "CacheError",
            XdsError::Internal { .. } => "InternalError",
            XdsError::Configuration(_) => "ConfigurationError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = XdsError::not_found("NodeConfigRevision", "default/node-1-abc");
        assert!(err.to_string().contains("default/node-1-abc"));
    }

    #[test]
    fn test_validation_names_category_and_index() {
        let err = XdsError::Validation {
            category: ResourceCategory::Secret,
            index: 2,
            field_path: "spec.resources.secrets[2].ref".to_string(),
            reason: "only 'kubernetes.io/tls' type secrets allowed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Secrets"));
        assert!(msg.contains("index 2"));
        assert!(msg.contains("secrets[2].ref"));
    }

    #[test]
    fn test_error_classes() {
        let conflict = XdsError::Conflict {
            kind: "NodeConfigCache".to_string(),
            name: "default/cache".to_string(),
            current: 4,
            attempted: 3,
        };
        assert_eq!(conflict.class(), ErrorClass::Transient);

        let tainted = XdsError::RevisionTainted {
            node_id: "node-1".to_string(),
            desired: "abc".to_string(),
        };
        assert_eq!(tainted.class(), ErrorClass::Terminal);

        let internal = XdsError::internal("encode", std::io::Error::other("boom"));
        assert_eq!(internal.class(), ErrorClass::Internal);
        assert!(!internal.is_specification());
    }

    #[test]
    fn test_store_error_helper() {
        let io_err = std::io::Error::other("connection reset");
        let err = XdsError::store("list", io_err);
        assert!(matches!(err, XdsError::Store { operation: "list", .. }));
        assert_eq!(err.reason(), "StoreError");
    }
}
