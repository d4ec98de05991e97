//! Attribute bag handed over by the host for a single data source instance.

use crate::error::{LuksError, LuksResult};
use serde_json::{Map, Value};

/// Name of the computed attribute carrying the rendered document.
pub const RENDERED: &str = "rendered";

/// Attributes of one instance plus its identifier.
///
/// Values are addressed with dotted paths where list elements use their
/// index, e.g. `remote_key_file.0.http_headers.1.name`. Nested single blocks
/// are stored as one-element lists; [`crate::schema::Schema::conform`]
/// normalizes them before a `ResourceData` is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    attributes: Map<String, Value>,
    id: Option<String>,
}

impl ResourceData {
    pub(crate) fn from_map(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Raw value at `path`. Null values read as absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.attributes.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        (!current.is_null()).then_some(current)
    }

    /// Value at `path` only when it holds something other than its zero value.
    pub fn get_ok(&self, path: &str) -> Option<&Value> {
        self.get(path).filter(|value| !is_zero(value))
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Non-empty string at `path`.
    pub fn string(&self, path: &str) -> LuksResult<Option<String>> {
        match self.get_ok(path) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(LuksError::attribute_type(path, "a string")),
        }
    }

    /// Explicitly set bool at `path`; `false` counts as set.
    pub fn bool(&self, path: &str) -> LuksResult<Option<bool>> {
        match self.get(path) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(LuksError::attribute_type(path, "a bool")),
        }
    }

    pub fn int(&self, path: &str) -> LuksResult<Option<i64>> {
        match self.get(path) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| LuksError::attribute_type(path, "an integer")),
        }
    }

    /// Number of elements in the list at `path`, zero when absent.
    pub fn list_len(&self, path: &str) -> LuksResult<usize> {
        match self.get(path) {
            None => Ok(0),
            Some(Value::Array(items)) => Ok(items.len()),
            Some(_) => Err(LuksError::attribute_type(path, "a list")),
        }
    }
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> ResourceData {
        match value {
            Value::Object(map) => ResourceData::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn get_walks_lists_and_objects() {
        let d = data(json!({
            "remote_key_file": [{
                "http_headers": [{"name": "A"}, {"name": "B", "value": null}]
            }]
        }));
        assert_eq!(
            d.get("remote_key_file.0.http_headers.1.name"),
            Some(&json!("B"))
        );
        assert_eq!(d.get("remote_key_file.0.http_headers.1.value"), None);
        assert_eq!(d.get("remote_key_file.1"), None);
        assert_eq!(d.get("remote_key_file.x"), None);
        assert_eq!(d.get("missing"), None);
    }

    #[test]
    fn get_ok_treats_zero_values_as_absent() {
        let d = data(json!({"label": "", "wipe_volume": false, "options": [], "uuid": "u"}));
        assert!(d.get("label").is_some());
        assert!(d.get_ok("label").is_none());
        assert!(d.get_ok("wipe_volume").is_none());
        assert!(d.get_ok("options").is_none());
        assert_eq!(d.get_ok("uuid"), Some(&json!("u")));
    }

    #[test]
    fn typed_accessors() {
        let d = data(json!({"label": "", "wipe_volume": false, "threshold": 2, "name": 3}));
        assert_eq!(d.string("label").unwrap(), None);
        assert_eq!(d.bool("wipe_volume").unwrap(), Some(false));
        assert_eq!(d.int("threshold").unwrap(), Some(2));
        assert_eq!(d.list_len("options").unwrap(), 0);
        let err = d.string("name").unwrap_err();
        assert_eq!(err.code(), "IL1201");
    }

    #[test]
    fn set_and_id() {
        let mut d = ResourceData::default().with_id("old");
        assert_eq!(d.id(), Some("old"));
        d.set(RENDERED, "{}");
        d.set_id("new");
        assert_eq!(d.get(RENDERED), Some(&json!("{}")));
        assert_eq!(d.id(), Some("new"));
    }
}
