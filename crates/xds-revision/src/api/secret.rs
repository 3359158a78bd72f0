//! Credential objects.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::meta::{Object, ObjectMeta};

/// Type discriminator of TLS credential objects.
pub const TLS_SECRET_TYPE: &str = "kubernetes.io/tls";
/// Data key holding the PEM private key.
pub const TLS_PRIVATE_KEY: &str = "tls.key";
/// Data key holding the PEM certificate chain.
pub const TLS_CERTIFICATE: &str = "tls.crt";

/// Opaque bytes, base64 on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteString(pub Vec<u8>);

impl Serialize for ByteString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for ByteString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        STANDARD
            .decode(raw.trim())
            .map(ByteString)
            .map_err(serde::de::Error::custom)
    }
}

/// A credential object, read-only for the controllers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(rename = "type", default)]
    pub secret_type: String,
    #[serde(default)]
    pub data: BTreeMap<String, ByteString>,
}

impl Secret {
    /// A TLS credential object.
    pub fn tls(
        namespace: impl Into<String>,
        name: impl Into<String>,
        private_key: impl Into<Vec<u8>>,
        certificate: impl Into<Vec<u8>>,
    ) -> Self {
        let mut data = BTreeMap::new();
        data.insert(TLS_PRIVATE_KEY.to_string(), ByteString(private_key.into()));
        data.insert(TLS_CERTIFICATE.to_string(), ByteString(certificate.into()));
        Self {
            metadata: ObjectMeta::new(namespace, name),
            secret_type: TLS_SECRET_TYPE.to_string(),
            data,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.secret_type == TLS_SECRET_TYPE
    }

    /// Raw bytes of a data key.
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(|v| v.0.as_slice())
    }
}

impl Object for Secret {
    const KIND: &'static str = "Secret";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
