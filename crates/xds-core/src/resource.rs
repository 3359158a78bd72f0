//! Resource trait for typed proxy configuration objects.
//!
//! Every object that can be stored in a snapshot implements [`Resource`]. The
//! encoded form returned by [`Resource::encode`] is what the equality checker
//! compares and what a discovery server would put on the wire.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{ResourceCategory, XdsError};

/// Trait for typed proxy configuration resources.
///
/// # Example
///
/// ```rust
/// use std::any::Any as StdAny;
/// use xds_core::{Resource, ResourceCategory, XdsError};
///
/// #[derive(Debug)]
/// struct StaticRuntime {
///     name: String,
/// }
///
/// impl Resource for StaticRuntime {
///     fn category(&self) -> ResourceCategory {
///         ResourceCategory::Runtime
///     }
///
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn encode(&self) -> Result<prost_types::Any, XdsError> {
///         Ok(prost_types::Any {
///             type_url: self.category().type_url().to_string(),
///             value: self.name.as_bytes().to_vec(),
///         })
///     }
///
///     fn as_any(&self) -> &dyn StdAny {
///         self
///     }
/// }
///
/// let runtime = StaticRuntime { name: "rtds".into() };
/// assert_eq!(runtime.encode().unwrap().type_url, ResourceCategory::RUNTIME_TYPE_URL);
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Category this resource is served under.
    fn category(&self) -> ResourceCategory;

    /// Resource name as carried inside the resource itself.
    fn name(&self) -> &str;

    /// Encode the resource to a protobuf `Any` message.
    ///
    /// Encoding must be deterministic: equal resources produce equal bytes.
    fn encode(&self) -> Result<prost_types::Any, XdsError>;

    /// Convert to `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Shared, type-erased resource.
/// Uses Arc so snapshots can be cloned cheaply.
pub type BoxResource = Arc<dyn Resource>;

/// Downcast a shared resource to its concrete type.
#[must_use]
pub fn downcast<T: Resource + 'static>(resource: &BoxResource) -> Option<&T> {
    resource.as_any().downcast_ref::<T>()
}
