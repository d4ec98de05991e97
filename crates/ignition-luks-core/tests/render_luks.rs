use ignition_luks_core::attributes::RENDERED;
use ignition_luks_core::{
    build_luks, content_hash, DataSource, LuksDataSource, LuksError, RenderConfig, Rendered,
};
use serde_json::{json, Value};
use std::sync::Arc;

fn data_source() -> LuksDataSource {
    LuksDataSource::new(Arc::new(RenderConfig::default()))
}

fn render(attributes: Value) -> Result<Rendered, LuksError> {
    let ds = data_source();
    let data = ds.load(attributes)?;
    build_luks(&data, &RenderConfig::default())
}

fn full_attributes() -> Value {
    json!({
        "name": "luks-data",
        "device": "/dev/disk/by-partlabel/data",
        "label": "data",
        "uuid": "0f1e2d3c-4b5a-6978-8796-a5b4c3d2e1f0",
        "wipe_volume": false,
        "options": ["--cipher=aes-xts-plain64", "discard"],
        "remote_key_file": {
            "source": "https://keys.example.com/data.key",
            "compression": "gzip",
            "verification": format!("sha256-{}", "ab".repeat(32)),
            "http_headers": [
                {"name": "Authorization", "value": "Bearer t"},
                {"name": "X-Node", "value": "n1"}
            ]
        },
        "clevis": {
            "tang": [
                {"url": "https://tang-a.example.com", "thumbprint": "aaa"},
                {"url": "https://tang-b.example.com", "thumbprint": "bbb"}
            ],
            "threshold": 1
        }
    })
}

#[test]
fn spec_example_renders_exactly() {
    let rendered = render(json!({
        "name": "luks-root",
        "device": "/dev/sda1",
        "wipe_volume": true,
        "options": ["discard"]
    }))
    .unwrap();
    assert_eq!(
        rendered.json,
        r#"{"name":"luks-root","device":"/dev/sda1","wipeVolume":true,"options":["discard"]}"#
    );
    assert_eq!(rendered.id, content_hash(&rendered.json));
    for key in ["label", "uuid", "keyFile", "clevis"] {
        assert!(!rendered.json.contains(key), "unexpected `{key}` in output");
    }
}

#[test]
fn building_twice_is_deterministic() {
    let first = render(full_attributes()).unwrap();
    let second = render(full_attributes()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn full_document_shape() {
    let rendered = render(full_attributes()).unwrap();
    let value: Value = serde_json::from_str(&rendered.json).unwrap();
    assert_eq!(value["wipeVolume"], json!(false));
    assert_eq!(
        value["keyFile"]["verification"]["hash"],
        json!(format!("sha256-{}", "ab".repeat(32)))
    );
    assert_eq!(value["keyFile"]["httpHeaders"][1]["name"], json!("X-Node"));
    assert_eq!(value["clevis"]["tang"][0]["thumbprint"], json!("aaa"));
    assert_eq!(value["clevis"]["threshold"], json!(1));
}

#[test]
fn ordered_lists_change_the_identifier() {
    let base = render(full_attributes()).unwrap();

    let mut options = full_attributes();
    options["options"] = json!(["discard", "--cipher=aes-xts-plain64"]);
    let options = render(options).unwrap();

    let mut tang = full_attributes();
    tang["clevis"]["tang"] = json!([
        {"url": "https://tang-b.example.com", "thumbprint": "bbb"},
        {"url": "https://tang-a.example.com", "thumbprint": "aaa"}
    ]);
    let tang = render(tang).unwrap();

    let mut headers = full_attributes();
    headers["remote_key_file"]["http_headers"] = json!([
        {"name": "X-Node", "value": "n1"},
        {"name": "Authorization", "value": "Bearer t"}
    ]);
    let headers = render(headers).unwrap();

    for other in [&options, &tang, &headers] {
        assert_ne!(base.json, other.json);
        assert_ne!(base.id, other.id);
    }
}

#[test]
fn unset_scalars_produce_no_fields() {
    let rendered = render(json!({
        "name": "root",
        "device": "/dev/sda1",
        "label": "",
        "uuid": null
    }))
    .unwrap();
    assert_eq!(rendered.json, r#"{"name":"root","device":"/dev/sda1"}"#);
}

#[test]
fn both_key_file_forms_always_conflict() {
    for extra in [
        json!({}),
        json!({"wipe_volume": true, "options": ["discard"]}),
        json!({"clevis": {"tpm2": true}}),
    ] {
        let mut attributes = json!({
            "name": "root",
            "device": "/dev/sda1",
            "inline_key_file": {"content": "secret"},
            "remote_key_file": {"source": "https://example.com/key"}
        });
        for (key, value) in extra.as_object().unwrap() {
            attributes[key] = value.clone();
        }
        let err = render(attributes).unwrap_err();
        assert!(matches!(err, LuksError::KeySourceConflict));
        assert_eq!(err.code(), "IL1300");
    }
}

#[test]
fn inline_key_file_becomes_data_url() {
    let rendered = render(json!({
        "name": "root",
        "device": "/dev/sda1",
        "inline_key_file": {"mime": "application/octet-stream", "content": "secret"}
    }))
    .unwrap();
    assert_eq!(
        rendered.json,
        r#"{"name":"root","device":"/dev/sda1","keyFile":{"source":"data:application/octet-stream;base64,c2VjcmV0"}}"#
    );
}

#[test]
fn tang_without_url_fails_but_tpm2_alone_succeeds() {
    let err = render(json!({
        "name": "root",
        "device": "/dev/sda1",
        "clevis": {"tang": [{"thumbprint": "abc"}]}
    }))
    .unwrap_err();
    assert_eq!(err.code(), "IL1400");
    assert!(err.to_string().contains("$.clevis.tang.0.url"));

    let rendered = render(json!({
        "name": "root",
        "device": "/dev/sda1",
        "clevis": {"tpm2": true}
    }))
    .unwrap();
    assert!(rendered.json.ends_with(r#""clevis":{"tpm2":true}}"#));
}

#[test]
fn missing_required_attribute_is_caught_before_building() {
    let err = render(json!({"device": "/dev/sda1"})).unwrap_err();
    assert_eq!(err.to_string(), "[IL1200] attribute `name` is required");
}

#[test]
fn read_then_exists_round_trip() {
    let ds = data_source();
    let mut data = ds.load(full_attributes()).unwrap();
    ds.read(&mut data).unwrap();

    let rendered = data.get(RENDERED).and_then(Value::as_str).unwrap();
    assert_eq!(data.id(), Some(content_hash(rendered).as_str()));
    assert!(ds.exists(&data).unwrap());
}

#[test]
fn renaming_forces_replacement() {
    let ds = data_source();
    let prior = ds.load(full_attributes()).unwrap();
    let mut proposed = full_attributes();
    proposed["name"] = json!("luks-data2");
    let proposed = ds.load(proposed).unwrap();
    assert_eq!(ds.schema().replacements(&prior, &proposed), vec!["name"]);
}

#[test]
fn label_limit_counts_bytes() {
    let render_label = |label: String| {
        render(json!({"name": "root", "device": "/dev/sda1", "label": label}))
    };
    assert!(render_label("x".repeat(47)).is_ok());
    assert_eq!(render_label("x".repeat(48)).unwrap_err().code(), "IL1400");
    assert_eq!(render_label("é".repeat(48)).unwrap_err().code(), "IL1400");
}

#[test]
fn uppercase_scheme_source_accepts_http_headers() {
    let rendered = render(json!({
        "name": "root",
        "device": "/dev/sda1",
        "remote_key_file": {
            "source": "HTTPS://keys.example.com/root.key",
            "http_headers": [{"name": "A", "value": "1"}]
        }
    }))
    .unwrap();
    assert!(rendered.json.contains(r#""source":"HTTPS://keys.example.com/root.key""#));
}
