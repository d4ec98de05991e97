//! Ignition v3.2 `storage.luks` document types.
//!
//! Field declaration order is the serialization order, and the content hash
//! depends on it. Unset optional fields are skipped entirely.

use serde::{Deserialize, Serialize};

/// One LUKS volume, keyed by `name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Luks {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_volume: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<LuksOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<Resource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clevis: Option<Clevis>,
}

impl Luks {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A single argument forwarded to cryptsetup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LuksOption(pub String);

impl LuksOption {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LuksOption {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Fetchable payload: key files here, but the shape is shared across Ignition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,

    #[serde(default, skip_serializing_if = "Verification::is_empty")]
    pub verification: Verification,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_headers: Vec<HttpHeader>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Verification {
    pub fn is_empty(&self) -> bool {
        self.hash.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Automatic unlock policy handed to clevis at boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clevis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm2: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tang: Vec<Tang>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<ClevisCustom>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tang {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
}

/// Arbitrary clevis pin with a pin-specific JSON config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClevisCustom {
    pub pin: String,
    pub config: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_network: Option<bool>,
}
