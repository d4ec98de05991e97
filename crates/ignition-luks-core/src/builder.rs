//! Attribute bag to validated, rendered Ignition LUKS JSON.

use crate::attributes::ResourceData;
use crate::config::RenderConfig;
use crate::error::{LuksError, LuksResult};
use crate::keyfile::KeyFile;
use crate::types::{Clevis, ClevisCustom, Luks, LuksOption, Tang};
use crate::validate::ContextPath;
use log::{debug, info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Output of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Compact JSON document.
    pub json: String,
    /// Hex SHA-256 of `json`.
    pub id: String,
}

/// Map, validate, serialize and hash the LUKS device described by `data`.
///
/// Any mapping or validation failure aborts the whole build; nothing is
/// rendered for a partially valid document.
pub fn build_luks(data: &ResourceData, config: &RenderConfig) -> LuksResult<Rendered> {
    let luks = map_luks(data)?;

    let report = luks.validate_with(&ContextPath::root(), &config.options.extra_option_tokens);
    if report.is_fatal() {
        warn!(
            "luks device `{}` failed validation with {} error(s)",
            luks.name,
            report.entries().len()
        );
    }
    report.into_result()?;

    let json = serde_json::to_string(&luks).map_err(LuksError::Render)?;
    let id = content_hash(&json);
    info!("rendered luks device `{}` as {id}", luks.name);
    Ok(Rendered { json, id })
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn map_luks(data: &ResourceData) -> LuksResult<Luks> {
    let name = data.string("name")?.unwrap_or_default();
    debug!("mapping luks attributes for `{name}`");

    Ok(Luks {
        device: data.string("device")?,
        label: data.string("label")?,
        uuid: data.string("uuid")?,
        wipe_volume: data.bool("wipe_volume")?,
        options: map_options(data)?,
        key_file: KeyFile::from_resource_data(data)?.into_resource(),
        clevis: map_clevis(data)?,
        name,
    })
}

fn map_options(data: &ResourceData) -> LuksResult<Vec<LuksOption>> {
    let mut options = Vec::new();
    for idx in 0..data.list_len("options")? {
        if let Some(token) = data.string(&format!("options.{idx}"))? {
            options.push(LuksOption(token));
        }
    }
    Ok(options)
}

fn map_clevis(data: &ResourceData) -> LuksResult<Option<Clevis>> {
    if data.get_ok("clevis").is_none() {
        return Ok(None);
    }

    let mut tang = Vec::new();
    for idx in 0..data.list_len("clevis.0.tang")? {
        let prefix = format!("clevis.0.tang.{idx}");
        tang.push(Tang {
            url: data.string(&format!("{prefix}.url"))?.unwrap_or_default(),
            thumbprint: data.string(&format!("{prefix}.thumbprint"))?,
        });
    }

    let custom = match data.get_ok("clevis.0.custom") {
        Some(Value::Array(_)) => Some(ClevisCustom {
            pin: data.string("clevis.0.custom.0.pin")?.unwrap_or_default(),
            config: data.string("clevis.0.custom.0.config")?.unwrap_or_default(),
            needs_network: data.bool("clevis.0.custom.0.needs_network")?,
        }),
        Some(_) => return Err(LuksError::attribute_type("clevis.0.custom", "a block")),
        None => None,
    };

    Ok(Some(Clevis {
        tpm2: data.bool("clevis.0.tpm2")?,
        threshold: data.int("clevis.0.threshold")?,
        tang,
        custom,
    }))
}
