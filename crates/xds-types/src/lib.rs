//! # xds-types
//!
//! Typed Envoy configuration objects for the six resource categories.
//!
//! The types mirror the Envoy v3 messages closely enough to validate the
//! fields the controller and proxies care about, and carry every other field
//! through untouched in an `other` map so no configuration is lost on the way
//! to the cache. Field names accept both the proto (`port_value`) and the
//! canonical JSON (`portValue`) spellings.
//!
//! All message types implement [`xds_core::Resource`]; their encoded form is
//! the canonical JSON rendering, which is deterministic because unknown fields
//! live in ordered maps.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![allow(missing_docs)] // Field docs follow the upstream proto definitions

use std::any::Any as StdAny;

pub use prost_types::Any;

use xds_core::{Resource, ResourceCategory, XdsError};

/// Unknown fields preserved verbatim.
pub type OtherFields = std::collections::BTreeMap<String, serde_json::Value>;

pub mod envoy {
    //! Envoy xDS types.

    pub mod config {
        //! Envoy configuration types.

        pub mod core {
            //! Core configuration types.

            pub mod v3 {
                //! Core v3 API.

                use serde::{Deserialize, Serialize};

                use crate::OtherFields;

                /// Socket address.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct SocketAddress {
                    /// Protocol (`TCP` or `UDP`).
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub protocol: Option<String>,
                    /// Address.
                    pub address: String,
                    /// Port value.
                    #[serde(default, alias = "portValue")]
                    pub port_value: u32,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }

                /// Address.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct Address {
                    /// Socket address.
                    #[serde(
                        default,
                        alias = "socketAddress",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub socket_address: Option<SocketAddress>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }

                /// Data source for certificates and keys.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct DataSource {
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub filename: Option<String>,
                    #[serde(
                        default,
                        alias = "inlineString",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub inline_string: Option<String>,
                    #[serde(
                        default,
                        alias = "inlineBytes",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub inline_bytes: Option<String>,
                }

                impl DataSource {
                    /// Data source holding an inline string.
                    pub fn inline(value: impl Into<String>) -> Self {
                        Self {
                            inline_string: Some(value.into()),
                            ..Self::default()
                        }
                    }
                }

                /// Locality information.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct Locality {
                    #[serde(default, skip_serializing_if = "String::is_empty")]
                    pub region: String,
                    #[serde(default, skip_serializing_if = "String::is_empty")]
                    pub zone: String,
                    #[serde(default, alias = "subZone", skip_serializing_if = "String::is_empty")]
                    pub sub_zone: String,
                }
            }
        }

        pub mod listener {
            //! Listener types.

            pub mod v3 {
                //! Listener v3 API.

                use serde::{Deserialize, Serialize};

                use super::super::core::v3::Address;
                use crate::OtherFields;

                /// Listener (LDS).
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct Listener {
                    #[serde(default)]
                    pub name: String,
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub address: Option<Address>,
                    /// Filter chains are passed through opaquely.
                    #[serde(default, alias = "filterChains", skip_serializing_if = "Vec::is_empty")]
                    pub filter_chains: Vec<serde_json::Value>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }
            }
        }

        pub mod cluster {
            //! Cluster types.

            pub mod v3 {
                //! Cluster v3 API.

                use serde::{Deserialize, Serialize};

                use super::super::endpoint::v3::ClusterLoadAssignment;
                use crate::OtherFields;

                /// Service discovery type of a cluster.
                #[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
                #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
                pub enum DiscoveryType {
                    Static,
                    StrictDns,
                    LogicalDns,
                    Eds,
                    OriginalDst,
                }

                /// Cluster (CDS).
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct Cluster {
                    #[serde(default)]
                    pub name: String,
                    /// Duration in proto JSON form, e.g. `"0.25s"`.
                    #[serde(
                        default,
                        alias = "connectTimeout",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub connect_timeout: Option<String>,
                    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
                    pub discovery_type: Option<DiscoveryType>,
                    #[serde(default, alias = "lbPolicy", skip_serializing_if = "Option::is_none")]
                    pub lb_policy: Option<String>,
                    #[serde(
                        default,
                        alias = "loadAssignment",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub load_assignment: Option<ClusterLoadAssignment>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }
            }
        }

        pub mod endpoint {
            //! Endpoint types.

            pub mod v3 {
                //! Endpoint v3 API.

                use serde::{Deserialize, Serialize};

                use super::super::core::v3::{Address, Locality};
                use crate::OtherFields;

                /// Upstream host.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct Endpoint {
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub address: Option<Address>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }

                /// Endpoint with load balancing metadata.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct LbEndpoint {
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub endpoint: Option<Endpoint>,
                    #[serde(
                        default,
                        alias = "healthStatus",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub health_status: Option<String>,
                    #[serde(
                        default,
                        alias = "loadBalancingWeight",
                        skip_serializing_if = "Option::is_none"
                    )]
                    pub load_balancing_weight: Option<u32>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }

                /// Endpoints grouped by locality.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct LocalityLbEndpoints {
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub locality: Option<Locality>,
                    #[serde(default, alias = "lbEndpoints")]
                    pub lb_endpoints: Vec<LbEndpoint>,
                    #[serde(default, skip_serializing_if = "Option::is_none")]
                    pub priority: Option<u32>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }

                /// ClusterLoadAssignment (EDS).
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct ClusterLoadAssignment {
                    #[serde(default, alias = "clusterName")]
                    pub cluster_name: String,
                    #[serde(default)]
                    pub endpoints: Vec<LocalityLbEndpoints>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }
            }
        }

        pub mod route {
            //! Route types.

            pub mod v3 {
                //! Route v3 API.

                use serde::{Deserialize, Serialize};

                use crate::OtherFields;

                /// Virtual host; routes are passed through opaquely.
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct VirtualHost {
                    pub name: String,
                    #[serde(default)]
                    pub domains: Vec<String>,
                    #[serde(default, skip_serializing_if = "Vec::is_empty")]
                    pub routes: Vec<serde_json::Value>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }

                /// RouteConfiguration (RDS).
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct RouteConfiguration {
                    #[serde(default)]
                    pub name: String,
                    #[serde(default, alias = "virtualHosts")]
                    pub virtual_hosts: Vec<VirtualHost>,
                    #[serde(flatten)]
                    pub other: OtherFields,
                }
            }
        }
    }

    pub mod extensions {
        //! Envoy extension types.

        pub mod transport_sockets {
            //! Transport socket extensions.

            pub mod tls {
                //! TLS transport socket.

                pub mod v3 {
                    //! TLS v3 API.

                    use serde::{Deserialize, Serialize};

                    use crate::envoy::config::core::v3::DataSource;
                    use crate::OtherFields;

                    /// Certificate chain and private key.
                    #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                    pub struct TlsCertificate {
                        #[serde(
                            default,
                            alias = "certificateChain",
                            skip_serializing_if = "Option::is_none"
                        )]
                        pub certificate_chain: Option<DataSource>,
                        #[serde(
                            default,
                            alias = "privateKey",
                            skip_serializing_if = "Option::is_none"
                        )]
                        pub private_key: Option<DataSource>,
                    }

                    /// Secret (SDS).
                    #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                    pub struct Secret {
                        #[serde(default)]
                        pub name: String,
                        #[serde(
                            default,
                            alias = "tlsCertificate",
                            skip_serializing_if = "Option::is_none"
                        )]
                        pub tls_certificate: Option<TlsCertificate>,
                        #[serde(flatten)]
                        pub other: OtherFields,
                    }

                    impl Secret {
                        /// Compose a TLS certificate secret from PEM key and chain.
                        pub fn tls(
                            name: impl Into<String>,
                            private_key: impl Into<String>,
                            certificate_chain: impl Into<String>,
                        ) -> Self {
                            Self {
                                name: name.into(),
                                tls_certificate: Some(TlsCertificate {
                                    certificate_chain: Some(DataSource::inline(certificate_chain)),
                                    private_key: Some(DataSource::inline(private_key)),
                                }),
                                other: OtherFields::new(),
                            }
                        }
                    }
                }
            }
        }
    }

    pub mod service {
        //! Envoy service types.

        pub mod runtime {
            //! Runtime discovery service.

            pub mod v3 {
                //! Runtime v3 API.

                use serde::{Deserialize, Serialize};

                use crate::OtherFields;

                /// Runtime layer (RTDS).
                #[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
                pub struct Runtime {
                    #[serde(default)]
                    pub name: String,
                    /// Runtime keys, as a JSON struct.
                    #[serde(default)]
                    pub layer: OtherFields,
                }
            }
        }
    }
}

pub use envoy::config::cluster::v3::Cluster;
pub use envoy::config::endpoint::v3::ClusterLoadAssignment;
pub use envoy::config::listener::v3::Listener;
pub use envoy::config::route::v3::RouteConfiguration;
pub use envoy::extensions::transport_sockets::tls::v3::Secret;
pub use envoy::service::runtime::v3::Runtime;

fn encode_json<T: serde::Serialize>(
    category: ResourceCategory,
    message: &T,
) -> Result<Any, XdsError> {
    let value = serde_json::to_vec(message).map_err(|e| XdsError::internal("encode", e))?;
    Ok(Any {
        type_url: category.type_url().to_string(),
        value,
    })
}

macro_rules! impl_resource {
    ($ty:ty, $category:ident, $name:ident) => {
        impl Resource for $ty {
            fn category(&self) -> ResourceCategory {
                ResourceCategory::$category
            }

            fn name(&self) -> &str {
                &self.$name
            }

            fn encode(&self) -> Result<Any, XdsError> {
                encode_json(ResourceCategory::$category, self)
            }

            fn as_any(&self) -> &dyn StdAny {
                self
            }
        }
    };
}

impl_resource!(Listener, Listener, name);
impl_resource!(Cluster, Cluster, name);
impl_resource!(RouteConfiguration, Route, name);
impl_resource!(ClusterLoadAssignment, Endpoint, cluster_name);
impl_resource!(Secret, Secret, name);
impl_resource!(Runtime, Runtime, name);
