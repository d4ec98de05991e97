//! Field and cross-field validation for LUKS documents.
//!
//! Validators never stop at the first problem: every violation is recorded in
//! a [`Report`] keyed by its JSON path so callers can surface all of them at
//! once.

use crate::error::{LuksError, LuksResult};
use crate::types::{Clevis, ClevisCustom, HttpHeader, Luks, LuksOption, Resource, Tang};
use base64::Engine;
use std::collections::HashSet;
use std::fmt;

/// LUKS2 label field is 48 bytes including the NUL terminator.
const MAX_LABEL_BYTES: usize = 47;

const KEY_FILE_SCHEMES: &[&str] = &["http", "https", "tftp", "s3", "gs", "data"];
const HTTP_SCHEMES: &[&str] = &["http", "https"];
const CLEVIS_PINS: &[&str] = &["tpm2", "tang", "sss"];

/// cryptsetup open flags accepted without a leading `--`.
pub const KNOWN_OPEN_FLAGS: &[&str] = &[
    "discard",
    "allow-discards",
    "same-cpu-crypt",
    "submit-from-crypt-cpus",
    "no-read-workqueue",
    "no-write-workqueue",
    "readonly",
];

/// Location of a field inside the document, rendered as `$.clevis.tang.0.url`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextPath(Vec<String>);

impl ContextPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn append(&self, segment: impl ToString) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.0 {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: ContextPath,
    pub message: String,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error at {}: {}", self.path, self.message)
    }
}

/// Aggregate of every violation found in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    entries: Vec<Entry>,
}

impl Report {
    pub fn add_error(&mut self, path: ContextPath, message: impl Into<String>) {
        self.entries.push(Entry {
            path,
            message: message.into(),
        });
    }

    /// Record `result` only when it carries an error.
    pub fn add_on_error(&mut self, path: ContextPath, result: Result<(), String>) {
        if let Err(message) = result {
            self.add_error(path, message);
        }
    }

    pub fn merge(&mut self, other: Report) {
        self.entries.extend(other.entries);
    }

    pub fn is_fatal(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Turn a non-empty report into a single aggregate failure.
    pub fn into_result(self) -> LuksResult<()> {
        if self.is_fatal() {
            Err(LuksError::Validation(self))
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.entries.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// Implemented by every document node that carries its own rules.
pub trait Validate {
    fn validate(&self, path: &ContextPath) -> Report;
}

impl Validate for Luks {
    fn validate(&self, path: &ContextPath) -> Report {
        self.validate_with(path, &[])
    }
}

impl Luks {
    /// Validate the device, additionally accepting `extra_tokens` as options.
    pub fn validate_with(&self, path: &ContextPath, extra_tokens: &[String]) -> Report {
        let mut report = Report::default();

        if self.name.is_empty() {
            report.add_error(path.append("name"), "name is required");
        } else if self.name.contains('/') {
            report.add_error(path.append("name"), "name must not contain '/'");
        }

        match self.device.as_deref() {
            None | Some("") => report.add_error(path.append("device"), "device is required"),
            Some(device) => report.add_on_error(path.append("device"), validate_path(device)),
        }

        if let Some(label) = self.label.as_deref() {
            if label.len() > MAX_LABEL_BYTES {
                report.add_error(
                    path.append("label"),
                    format!("label must be at most {MAX_LABEL_BYTES} bytes"),
                );
            }
        }

        for (idx, option) in self.options.iter().enumerate() {
            if !option.is_recognized(extra_tokens) {
                report.add_error(
                    path.append("options").append(idx),
                    format!("unrecognized luks option `{}`", option.as_str()),
                );
            }
        }

        if let Some(key_file) = &self.key_file {
            report.merge(key_file.validate(&path.append("keyFile")));
        }

        if let Some(clevis) = &self.clevis {
            report.merge(clevis.validate(&path.append("clevis")));
        }

        report
    }
}

impl LuksOption {
    /// Known open flags, `--long` options and configured extras are accepted.
    pub fn is_recognized(&self, extra_tokens: &[String]) -> bool {
        let token = self.as_str();
        KNOWN_OPEN_FLAGS.contains(&token)
            || extra_tokens.iter().any(|extra| extra == token)
            || is_long_option(token)
    }
}

fn is_long_option(token: &str) -> bool {
    let Some(rest) = token.strip_prefix("--") else {
        return false;
    };
    let (name, value) = match rest.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (rest, None),
    };
    let name_ok = !name.is_empty()
        && !name.starts_with('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    let value_ok = value.map_or(true, |v| !v.is_empty() && !v.chars().any(char::is_whitespace));
    name_ok && value_ok
}

impl Validate for Resource {
    fn validate(&self, path: &ContextPath) -> Report {
        let mut report = Report::default();

        if let Some(source) = self.source.as_deref() {
            report.add_on_error(path.append("source"), validate_url(source, KEY_FILE_SCHEMES));
        }

        if let Some(compression) = self.compression.as_deref() {
            if !matches!(compression, "" | "gzip") {
                report.add_error(
                    path.append("compression"),
                    format!("unsupported compression `{compression}`"),
                );
            }
        }

        if let Some(hash) = self.verification.hash.as_deref() {
            let hash_path = path.append("verification").append("hash");
            if self.source.is_none() {
                report.add_error(hash_path.clone(), "verification requires a source");
            }
            report.add_on_error(hash_path, validate_hash(hash));
        }

        if !self.http_headers.is_empty() {
            let headers_path = path.append("httpHeaders");
            match self.source.as_deref().map(url_scheme) {
                Some(Some(scheme)) if HTTP_SCHEMES.contains(&scheme.as_str()) => {}
                Some(Some(_)) => report.add_error(
                    headers_path.clone(),
                    "http headers are only supported for http and https sources",
                ),
                _ => report.add_error(headers_path.clone(), "http headers require a valid source url"),
            }
            report.merge(validate_headers(&self.http_headers, &headers_path));
        }

        report
    }
}

fn validate_headers(headers: &[HttpHeader], path: &ContextPath) -> Report {
    let mut report = Report::default();
    let mut seen = HashSet::new();
    for (idx, header) in headers.iter().enumerate() {
        let name_path = path.append(idx).append("name");
        if header.name.is_empty() {
            report.add_error(name_path, "header name is required");
        } else if !seen.insert(header.name.to_ascii_lowercase()) {
            report.add_error(name_path, format!("duplicate http header `{}`", header.name));
        }
    }
    report
}

impl Validate for Clevis {
    fn validate(&self, path: &ContextPath) -> Report {
        let mut report = Report::default();

        if let Some(threshold) = self.threshold {
            if threshold < 0 {
                report.add_error(path.append("threshold"), "threshold must not be negative");
            }
        }

        for (idx, tang) in self.tang.iter().enumerate() {
            report.merge(tang.validate(&path.append("tang").append(idx)));
        }

        if let Some(custom) = &self.custom {
            let combined = !self.tang.is_empty()
                || self.tpm2 == Some(true)
                || self.threshold.is_some_and(|t| t != 0);
            if combined {
                report.add_error(
                    path.clone(),
                    "a custom clevis pin cannot be combined with tang, tpm2 or threshold",
                );
            }
            report.merge(custom.validate(&path.append("custom")));
        }

        report
    }
}

impl Validate for Tang {
    fn validate(&self, path: &ContextPath) -> Report {
        let mut report = Report::default();
        if self.url.is_empty() {
            report.add_error(path.append("url"), "tang url is required");
        } else {
            report.add_on_error(path.append("url"), validate_url(&self.url, HTTP_SCHEMES));
        }
        report
    }
}

impl Validate for ClevisCustom {
    fn validate(&self, path: &ContextPath) -> Report {
        let mut report = Report::default();

        if self.pin.is_empty() {
            report.add_error(path.append("pin"), "clevis pin is required");
        } else if !CLEVIS_PINS.contains(&self.pin.as_str()) {
            report.add_error(
                path.append("pin"),
                format!("unknown clevis pin `{}`", self.pin),
            );
        }

        if self.config.is_empty() {
            report.add_error(path.append("config"), "clevis config is required");
        } else if !matches!(
            serde_json::from_str::<serde_json::Value>(&self.config),
            Ok(serde_json::Value::Object(_))
        ) {
            report.add_error(path.append("config"), "clevis config must be a JSON object");
        }

        report
    }
}

fn validate_path(path: &str) -> Result<(), String> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(format!("path `{path}` must be absolute"))
    }
}

/// Lowercased scheme of an RFC 3986 URI, if the text starts with a well-formed one.
pub(crate) fn url_scheme(url: &str) -> Option<String> {
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        Some(scheme.to_ascii_lowercase())
    } else {
        None
    }
}

fn validate_url(url: &str, allowed: &[&str]) -> Result<(), String> {
    if url.chars().any(char::is_whitespace) {
        return Err("invalid url: contains whitespace".to_string());
    }
    let scheme = url_scheme(url).ok_or_else(|| format!("invalid url `{url}`"))?;
    if !allowed.contains(&scheme.as_str()) {
        return Err(format!("unsupported url scheme `{scheme}`"));
    }

    let rest = &url[scheme.len() + 1..];
    if scheme == "data" {
        return validate_data_url(rest);
    }

    let authority = rest
        .strip_prefix("//")
        .ok_or_else(|| format!("invalid url `{url}`: missing host"))?;
    let host = authority.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(format!("invalid url `{url}`: missing host"));
    }
    Ok(())
}

fn validate_data_url(rest: &str) -> Result<(), String> {
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data url: missing ','".to_string())?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|err| format!("invalid data url: {err}"))?;
        return Ok(());
    }

    let bytes = data.as_bytes();
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' {
            let valid = bytes.len() > idx + 2
                && bytes[idx + 1].is_ascii_hexdigit()
                && bytes[idx + 2].is_ascii_hexdigit();
            if !valid {
                return Err("invalid data url: bad percent-encoding".to_string());
            }
            idx += 3;
        } else {
            idx += 1;
        }
    }
    Ok(())
}

fn validate_hash(hash: &str) -> Result<(), String> {
    let (function, sum) = hash
        .split_once('-')
        .ok_or_else(|| format!("malformed hash `{hash}`: expected <function>-<digest>"))?;
    let expected_len = match function {
        "sha256" => 64,
        "sha512" => 128,
        other => return Err(format!("unrecognized hash function `{other}`")),
    };
    if sum.len() != expected_len {
        return Err(format!(
            "{function} digest must be {expected_len} hex digits (got {})",
            sum.len()
        ));
    }
    if !sum.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("{function} digest is not hexadecimal"));
    }
    Ok(())
}
