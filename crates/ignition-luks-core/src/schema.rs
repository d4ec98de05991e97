//! Attribute surface of the `ignition_luks` data source.
//!
//! The host uses this declaration to reject malformed input before the
//! builder runs and to decide when a change forces a replacement.

use crate::attributes::{ResourceData, RENDERED};
use crate::error::{LuksError, LuksResult};
use crate::keyfile::{INLINE_BLOCK, REMOTE_BLOCK};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const DATA_SOURCE_TYPE: &str = "ignition_luks";

/// Value shape of an attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Kind {
    String,
    Bool,
    Int,
    List {
        elem: Box<Kind>,
    },
    /// Nested block, stored as a list of objects.
    Block {
        #[serde(skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
        attributes: BTreeMap<String, Attribute>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub kind: Kind,
    pub required: bool,
    pub computed: bool,
    pub force_new: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
}

impl Attribute {
    pub fn required(kind: Kind) -> Self {
        Self {
            kind,
            required: true,
            computed: false,
            force_new: true,
            default: None,
            description: None,
        }
    }

    pub fn optional(kind: Kind) -> Self {
        Self {
            required: false,
            ..Self::required(kind)
        }
    }

    pub fn computed(kind: Kind) -> Self {
        Self {
            kind,
            required: false,
            computed: true,
            force_new: false,
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }
}

fn block(max_items: Option<usize>, attributes: Vec<(&str, Attribute)>) -> Kind {
    Kind::Block {
        max_items,
        attributes: attributes
            .into_iter()
            .map(|(name, attr)| (name.to_string(), attr))
            .collect(),
    }
}

fn string_list() -> Kind {
    Kind::List {
        elem: Box::new(Kind::String),
    }
}

/// Declared attributes of a data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub type_name: &'static str,
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    /// Schema for `ignition_luks`; `default_mime` fills `inline_key_file.mime`.
    pub fn luks(default_mime: &str) -> Self {
        let inline = block(
            Some(1),
            vec![
                (
                    "mime",
                    Attribute::optional(Kind::String).with_default(default_mime),
                ),
                ("content", Attribute::required(Kind::String)),
            ],
        );
        let headers = block(
            None,
            vec![
                ("name", Attribute::required(Kind::String)),
                ("value", Attribute::optional(Kind::String)),
            ],
        );
        let remote = block(
            Some(1),
            vec![
                ("source", Attribute::optional(Kind::String)),
                ("compression", Attribute::optional(Kind::String)),
                ("verification", Attribute::optional(Kind::String)),
                ("http_headers", Attribute::optional(headers)),
            ],
        );
        let tang = block(
            None,
            vec![
                ("url", Attribute::optional(Kind::String)),
                ("thumbprint", Attribute::optional(Kind::String)),
            ],
        );
        let custom = block(
            Some(1),
            vec![
                ("pin", Attribute::optional(Kind::String)),
                ("config", Attribute::optional(Kind::String)),
                ("needs_network", Attribute::optional(Kind::Bool)),
            ],
        );
        let clevis = block(
            Some(1),
            vec![
                ("tang", Attribute::optional(tang)),
                ("tpm2", Attribute::optional(Kind::Bool)),
                ("threshold", Attribute::optional(Kind::Int)),
                ("custom", Attribute::optional(custom)),
            ],
        );

        let attributes = vec![
            (
                "name",
                Attribute::required(Kind::String).describe("Device mapper name of the volume."),
            ),
            (
                "device",
                Attribute::required(Kind::String).describe("Absolute path of the backing device."),
            ),
            ("label", Attribute::optional(Kind::String)),
            ("uuid", Attribute::optional(Kind::String)),
            ("wipe_volume", Attribute::optional(Kind::Bool)),
            (
                "options",
                Attribute::optional(string_list())
                    .describe("Ordered cryptsetup options for the volume."),
            ),
            (
                INLINE_BLOCK,
                Attribute::optional(inline).describe("Key material embedded as a data URL."),
            ),
            (
                REMOTE_BLOCK,
                Attribute::optional(remote).describe("Key material fetched at provisioning time."),
            ),
            ("clevis", Attribute::optional(clevis)),
            (
                RENDERED,
                Attribute::computed(Kind::String).describe("Rendered Ignition JSON."),
            ),
        ];

        Self {
            type_name: DATA_SOURCE_TYPE,
            attributes: attributes
                .into_iter()
                .map(|(name, attr)| (name.to_string(), attr))
                .collect(),
        }
    }

    /// Check `value` against the declaration and build the attribute bag.
    ///
    /// Single nested blocks given as bare objects are wrapped into one-element
    /// lists and defaults are filled in.
    pub fn conform(&self, value: Value) -> LuksResult<ResourceData> {
        match value {
            Value::Object(map) => Ok(ResourceData::from_map(conform_block(
                &self.attributes,
                map,
                "",
            )?)),
            _ => Err(LuksError::attribute("<root>", "must be an object")),
        }
    }

    /// Force-new attributes whose values differ between `prior` and `proposed`.
    pub fn replacements(&self, prior: &ResourceData, proposed: &ResourceData) -> Vec<String> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .filter(|(name, _)| prior.get(name) != proposed.get(name))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

fn join(prefix: &str, segment: impl std::fmt::Display) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}

fn conform_block(
    attributes: &BTreeMap<String, Attribute>,
    mut input: Map<String, Value>,
    prefix: &str,
) -> LuksResult<Map<String, Value>> {
    if let Some(unknown) = input.keys().find(|key| !attributes.contains_key(*key)) {
        return Err(LuksError::attribute(
            join(prefix, unknown),
            "is not a supported attribute",
        ));
    }

    let mut output = Map::new();
    for (name, attr) in attributes {
        let path = join(prefix, name);
        match input.remove(name).filter(|value| !value.is_null()) {
            Some(value) => {
                output.insert(name.clone(), conform_value(&attr.kind, value, &path)?);
            }
            None if attr.required => return Err(LuksError::attribute(path, "is required")),
            None => {
                if let Some(default) = &attr.default {
                    output.insert(name.clone(), default.clone());
                }
            }
        }
    }
    Ok(output)
}

fn conform_value(kind: &Kind, value: Value, path: &str) -> LuksResult<Value> {
    match kind {
        Kind::String if value.is_string() => Ok(value),
        Kind::String => Err(LuksError::attribute_type(path, "a string")),
        Kind::Bool if value.is_boolean() => Ok(value),
        Kind::Bool => Err(LuksError::attribute_type(path, "a bool")),
        Kind::Int if value.is_i64() => Ok(value),
        Kind::Int => Err(LuksError::attribute_type(path, "an integer")),
        Kind::List { elem } => match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| {
                    if item.is_null() {
                        Ok(item)
                    } else {
                        conform_value(elem, item, &join(path, idx))
                    }
                })
                .collect::<LuksResult<Vec<_>>>()
                .map(Value::Array),
            _ => Err(LuksError::attribute_type(path, "a list")),
        },
        Kind::Block {
            max_items,
            attributes,
        } => {
            let items = match value {
                Value::Object(map) => vec![Value::Object(map)],
                Value::Array(items) => items,
                _ => return Err(LuksError::attribute_type(path, "a block")),
            };
            if let Some(max) = max_items {
                if items.len() > *max {
                    return Err(LuksError::attribute(
                        path,
                        format!("must have at most {max} block(s), got {}", items.len()),
                    ));
                }
            }
            items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(map) => {
                        conform_block(attributes, map, &join(path, idx)).map(Value::Object)
                    }
                    _ => Err(LuksError::attribute_type(join(path, idx), "a block")),
                })
                .collect::<LuksResult<Vec<_>>>()
                .map(Value::Array)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyfile::DEFAULT_MIME;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::luks(DEFAULT_MIME)
    }

    fn reason(err: LuksError) -> String {
        err.to_string()
    }

    #[test]
    fn required_attributes_are_enforced() {
        let err = schema().conform(json!({"name": "root"})).unwrap_err();
        assert_eq!(reason(err), "[IL1200] attribute `device` is required");

        let err = schema()
            .conform(json!({
                "name": "root",
                "device": "/dev/sda1",
                "remote_key_file": {"http_headers": [{"value": "x"}]}
            }))
            .unwrap_err();
        assert_eq!(
            reason(err),
            "[IL1200] attribute `remote_key_file.0.http_headers.0.name` is required"
        );
    }

    #[test]
    fn unknown_and_mistyped_attributes_are_rejected() {
        let err = schema()
            .conform(json!({"name": "root", "device": "/dev/sda1", "treshold": 1}))
            .unwrap_err();
        assert_eq!(err.code(), "IL1200");

        let err = schema()
            .conform(json!({"name": "root", "device": "/dev/sda1", "wipe_volume": "yes"}))
            .unwrap_err();
        assert_eq!(reason(err), "[IL1201] attribute `wipe_volume` must be a bool");

        let err = schema()
            .conform(json!({"name": "root", "device": "/dev/sda1", "options": ["discard", 1]}))
            .unwrap_err();
        assert_eq!(reason(err), "[IL1201] attribute `options.1` must be a string");

        assert!(schema().conform(json!(["root"])).is_err());
    }

    #[test]
    fn single_blocks_are_capped() {
        let err = schema()
            .conform(json!({
                "name": "root",
                "device": "/dev/sda1",
                "clevis": [{"tpm2": true}, {"tpm2": false}]
            }))
            .unwrap_err();
        assert_eq!(err.code(), "IL1200");
    }

    #[test]
    fn blocks_are_normalized_and_defaults_applied() {
        let data = schema()
            .conform(json!({
                "name": "root",
                "device": "/dev/sda1",
                "inline_key_file": {"content": "secret"},
                "options": ["discard", null]
            }))
            .unwrap();
        assert_eq!(data.get("inline_key_file.0.mime"), Some(&json!("text/plain")));
        assert_eq!(data.get("inline_key_file.0.content"), Some(&json!("secret")));
        assert_eq!(data.get("options.0"), Some(&json!("discard")));
        assert_eq!(data.get("options.1"), None);

        let data = Schema::luks("application/octet-stream")
            .conform(json!({
                "name": "root",
                "device": "/dev/sda1",
                "inline_key_file": [{"content": "secret"}]
            }))
            .unwrap();
        assert_eq!(
            data.get("inline_key_file.0.mime"),
            Some(&json!("application/octet-stream"))
        );
    }

    #[test]
    fn replacements_list_changed_force_new_attributes() {
        let s = schema();
        let prior = s
            .conform(json!({"name": "root", "device": "/dev/sda1", "rendered": "{}"}))
            .unwrap();
        let same = s.conform(json!({"name": "root", "device": "/dev/sda1"})).unwrap();
        assert!(s.replacements(&prior, &same).is_empty());

        let renamed = s
            .conform(json!({"name": "data", "device": "/dev/sda1", "label": "x"}))
            .unwrap();
        assert_eq!(s.replacements(&prior, &renamed), vec!["label", "name"]);
    }

    #[test]
    fn schema_serializes_for_display() {
        let value = serde_json::to_value(schema()).unwrap();
        assert_eq!(value["type"], json!("ignition_luks"));
        assert_eq!(value["attributes"]["name"]["required"], json!(true));
        assert_eq!(value["attributes"]["rendered"]["computed"], json!(true));
        assert_eq!(
            value["attributes"]["clevis"]["type"]["attributes"]["threshold"]["type"]["kind"],
            json!("int")
        );
    }
}
