//! Key-file attribute resolution.
//!
//! The attribute surface exposes two mutually exclusive blocks,
//! `inline_key_file` and `remote_key_file`. They collapse into [`KeyFile`],
//! which cannot represent both at once.

use crate::attributes::ResourceData;
use crate::error::{LuksError, LuksResult};
use crate::types::{HttpHeader, Resource, Verification};
use base64::Engine;
use log::debug;

pub const INLINE_BLOCK: &str = "inline_key_file";
pub const REMOTE_BLOCK: &str = "remote_key_file";

/// Mime type used when an inline key does not name one.
pub const DEFAULT_MIME: &str = "text/plain";

/// Where the key material for a LUKS device comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum KeyFile {
    /// No key file; the device already has a key or relies on clevis.
    #[default]
    None,
    Inline {
        mime: String,
        content: String,
    },
    Remote {
        source: Option<String>,
        compression: Option<String>,
        verification: Option<String>,
        http_headers: Vec<HttpHeader>,
    },
}

impl KeyFile {
    /// Resolve the key-file blocks of `data`.
    pub fn from_resource_data(data: &ResourceData) -> LuksResult<Self> {
        let has_inline = data.get_ok(INLINE_BLOCK).is_some();
        let has_remote = data.get_ok(REMOTE_BLOCK).is_some();

        match (has_inline, has_remote) {
            (true, true) => Err(LuksError::KeySourceConflict),
            (false, false) => Ok(KeyFile::None),
            (true, false) => {
                let mime = data
                    .string("inline_key_file.0.mime")?
                    .unwrap_or_else(|| DEFAULT_MIME.to_string());
                let content = data.string("inline_key_file.0.content")?.unwrap_or_default();
                debug!("using inline key file ({mime}, {} bytes)", content.len());
                Ok(KeyFile::Inline { mime, content })
            }
            (false, true) => {
                let mut http_headers = Vec::new();
                for idx in 0..data.list_len("remote_key_file.0.http_headers")? {
                    let prefix = format!("remote_key_file.0.http_headers.{idx}");
                    http_headers.push(HttpHeader {
                        name: data.string(&format!("{prefix}.name"))?.unwrap_or_default(),
                        value: header_value(data, &format!("{prefix}.value"))?,
                    });
                }
                let source = data.string("remote_key_file.0.source")?;
                debug!(
                    "using remote key file {} ({} headers)",
                    source.as_deref().unwrap_or("<unset>"),
                    http_headers.len()
                );
                Ok(KeyFile::Remote {
                    source,
                    compression: data.string("remote_key_file.0.compression")?,
                    verification: data.string("remote_key_file.0.verification")?,
                    http_headers,
                })
            }
        }
    }

    /// Ignition resource for this key file, or `None` when nothing is attached.
    pub fn into_resource(self) -> Option<Resource> {
        match self {
            KeyFile::None => None,
            KeyFile::Inline { mime, content } => Some(Resource {
                source: Some(encode_data_url(&mime, content.as_bytes())),
                ..Resource::default()
            }),
            KeyFile::Remote {
                source,
                compression,
                verification,
                http_headers,
            } => Some(Resource {
                source,
                compression,
                verification: Verification { hash: verification },
                http_headers,
            }),
        }
    }
}

/// Header values keep an explicit empty string; only absent/null is unset.
fn header_value(data: &ResourceData, path: &str) -> LuksResult<Option<String>> {
    match data.get(path) {
        None => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(LuksError::attribute_type(path, "a string")),
    }
}

/// Encode `content` as an RFC 2397 base64 data URL.
pub fn encode_data_url(mime: &str, content: &[u8]) -> String {
    let mime = if mime.is_empty() { DEFAULT_MIME } else { mime };
    let encoded = base64::engine::general_purpose::STANDARD.encode(content);
    format!("data:{mime};base64,{encoded}")
}
