//! Resource categories served to proxies.
//!
//! The set of categories is closed: a snapshot always carries exactly one
//! collection per [`ResourceCategory`], and adding a category is a code change.

use std::fmt;

/// Category of a proxy configuration resource.
///
/// # Example
///
/// ```rust
/// use xds_core::ResourceCategory;
///
/// assert_eq!(ResourceCategory::Route.short_name(), "RouteConfiguration");
/// assert_eq!(ResourceCategory::Secret.to_string(), "Secrets");
/// assert_eq!(ResourceCategory::ALL.len(), 6);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceCategory {
    /// Listener (LDS).
    Listener,
    /// Cluster (CDS).
    Cluster,
    /// RouteConfiguration (RDS).
    Route,
    /// ClusterLoadAssignment (EDS).
    Endpoint,
    /// TLS Secret (SDS).
    Secret,
    /// Runtime layer (RTDS).
    Runtime,
}

impl ResourceCategory {
    /// Type URL for Cluster (CDS).
    pub const CLUSTER_TYPE_URL: &'static str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    /// Type URL for ClusterLoadAssignment (EDS).
    pub const ENDPOINT_TYPE_URL: &'static str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

    /// Type URL for Listener (LDS).
    pub const LISTENER_TYPE_URL: &'static str =
        "type.googleapis.com/envoy.config.listener.v3.Listener";

    /// Type URL for RouteConfiguration (RDS).
    pub const ROUTE_TYPE_URL: &'static str =
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

    /// Type URL for Secret (SDS).
    pub const SECRET_TYPE_URL: &'static str =
        "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

    /// Type URL for Runtime (RTDS).
    pub const RUNTIME_TYPE_URL: &'static str =
        "type.googleapis.com/envoy.service.runtime.v3.Runtime";

    /// All categories, in snapshot slot order.
    pub const ALL: [ResourceCategory; 6] = [
        ResourceCategory::Listener,
        ResourceCategory::Cluster,
        ResourceCategory::Route,
        ResourceCategory::Endpoint,
        ResourceCategory::Secret,
        ResourceCategory::Runtime,
    ];

    /// Slot of this category inside a snapshot.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            ResourceCategory::Listener => 0,
            ResourceCategory::Cluster => 1,
            ResourceCategory::Route => 2,
            ResourceCategory::Endpoint => 3,
            ResourceCategory::Secret => 4,
            ResourceCategory::Runtime => 5,
        }
    }

    /// Type URL of the resources in this category.
    #[must_use]
    pub const fn type_url(self) -> &'static str {
        match self {
            ResourceCategory::Listener => Self::LISTENER_TYPE_URL,
            ResourceCategory::Cluster => Self::CLUSTER_TYPE_URL,
            ResourceCategory::Route => Self::ROUTE_TYPE_URL,
            ResourceCategory::Endpoint => Self::ENDPOINT_TYPE_URL,
            ResourceCategory::Secret => Self::SECRET_TYPE_URL,
            ResourceCategory::Runtime => Self::RUNTIME_TYPE_URL,
        }
    }

    /// Message name, the last segment of the type URL.
    #[must_use]
    pub fn short_name(self) -> &'static str {
        let url = self.type_url();
        url.rsplit('.').next().unwrap_or(url)
    }

    /// Name of the list holding this category in a resource specification.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            ResourceCategory::Listener => "listeners",
            ResourceCategory::Cluster => "clusters",
            ResourceCategory::Route => "routes",
            ResourceCategory::Endpoint => "endpoints",
            ResourceCategory::Secret => "secrets",
            ResourceCategory::Runtime => "runtimes",
        }
    }

    /// Look up a category by its type URL.
    #[must_use]
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.type_url() == type_url)
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceCategory::Listener => "Listeners",
            ResourceCategory::Cluster => "Clusters",
            ResourceCategory::Route => "Routes",
            ResourceCategory::Endpoint => "Endpoints",
            ResourceCategory::Secret => "Secrets",
            ResourceCategory::Runtime => "Runtimes",
        };
        f.write_str(label)
    }
}
