//! Raw resource declarations carried by desired-state and revision records.

use std::fmt;

use serde::{Deserialize, Serialize};
use xds_core::ResourceCategory;

/// Encoding of every resource value within one specification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Serialization {
    /// Plain JSON.
    #[default]
    #[serde(rename = "json")]
    Json,
    /// Base64-wrapped JSON.
    #[serde(rename = "b64json")]
    B64Json,
    /// YAML.
    #[serde(rename = "yaml")]
    Yaml,
}

impl Serialization {
    pub fn as_str(self) -> &'static str {
        match self {
            Serialization::Json => "json",
            Serialization::B64Json => "b64json",
            Serialization::Yaml => "yaml",
        }
    }
}

impl fmt::Display for Serialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, still-encoded resource value.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvoyResource {
    pub name: String,
    pub value: String,
}

impl EnvoyResource {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Reference to a credential object.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretRef {
    pub name: String,
    /// Defaults to the namespace of the referencing record.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
}

/// A TLS secret resource built from a credential object.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvoySecretResource {
    pub name: String,
    #[serde(rename = "ref")]
    pub reference: SecretRef,
}

impl EnvoySecretResource {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        secret_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            reference: SecretRef {
                name: secret_name.into(),
                namespace: namespace.into(),
            },
        }
    }
}

/// Resource lists of a specification, one per category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvoyResources {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EnvoyResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<EnvoyResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<EnvoyResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listeners: Vec<EnvoyResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runtimes: Vec<EnvoyResource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<EnvoySecretResource>,
}

impl EnvoyResources {
    /// Encoded entries of a category. Secrets are references and have none.
    pub fn values(&self, category: ResourceCategory) -> &[EnvoyResource] {
        match category {
            ResourceCategory::Endpoint => &self.endpoints,
            ResourceCategory::Cluster => &self.clusters,
            ResourceCategory::Route => &self.routes,
            ResourceCategory::Listener => &self.listeners,
            ResourceCategory::Runtime => &self.runtimes,
            ResourceCategory::Secret => &[],
        }
    }

    /// Total number of declared resources.
    pub fn len(&self) -> usize {
        self.endpoints.len()
            + self.clusters.len()
            + self.routes.len()
            + self.listeners.len()
            + self.runtimes.len()
            + self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
