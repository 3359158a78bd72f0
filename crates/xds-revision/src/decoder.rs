//! Resource value decoders.
//!
//! A decoder turns the raw text of one resource value into a structured JSON
//! value; the typed object is then produced by deserializing that value into
//! the category's concrete type. Which decoder applies is decided once per
//! specification by its [`Serialization`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::api::Serialization;

/// Why a raw value could not be turned into a typed resource.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[source] serde_json::Error),
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// The document parsed but does not match the resource schema.
    #[error("{0}")]
    Schema(#[source] serde_json::Error),
}

/// Turns raw resource text into a structured value.
pub trait ResourceDecoder: Send + Sync {
    fn decode(&self, raw: &str) -> Result<Value, DecodeError>;
}

/// Plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl ResourceDecoder for Json {
    fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        serde_json::from_str(raw).map_err(DecodeError::Json)
    }
}

/// Base64-wrapped JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct B64Json;

impl ResourceDecoder for B64Json {
    fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        let bytes = STANDARD.decode(raw.trim())?;
        serde_json::from_slice(&bytes).map_err(DecodeError::Json)
    }
}

/// YAML.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

impl ResourceDecoder for Yaml {
    fn decode(&self, raw: &str) -> Result<Value, DecodeError> {
        Ok(serde_yaml::from_str(raw)?)
    }
}

static JSON: Json = Json;
static B64_JSON: B64Json = B64Json;
static YAML: Yaml = Yaml;

impl Serialization {
    /// Decoder for this serialization.
    pub fn decoder(self) -> &'static dyn ResourceDecoder {
        match self {
            Serialization::Json => &JSON,
            Serialization::B64Json => &B64_JSON,
            Serialization::Yaml => &YAML,
        }
    }
}

/// Decode raw text straight into a typed object.
///
/// # Example
///
/// ```rust
/// use xds_revision::api::Serialization;
/// use xds_revision::decoder::decode_as;
/// use xds_types::Listener;
///
/// let listener: Listener = decode_as(Serialization::Yaml.decoder(), "name: l1").unwrap();
/// assert_eq!(listener.name, "l1");
/// ```
pub fn decode_as<T: DeserializeOwned>(
    decoder: &dyn ResourceDecoder,
    raw: &str,
) -> Result<T, DecodeError> {
    let value = decoder.decode(raw)?;
    serde_json::from_value(value).map_err(DecodeError::Schema)
}
