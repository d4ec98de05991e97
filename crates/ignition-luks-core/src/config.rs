use crate::error::{LuksError, LuksResult};
use crate::keyfile::DEFAULT_MIME;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KeyFileCfg {
    #[serde(default = "default_mime")]
    pub default_mime: String,
}

fn default_mime() -> String {
    DEFAULT_MIME.to_string()
}

impl Default for KeyFileCfg {
    fn default() -> Self {
        Self {
            default_mime: default_mime(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OptionsCfg {
    /// Extra cryptsetup tokens accepted in `options` besides the built-in set.
    #[serde(default)]
    pub extra_option_tokens: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingCfg {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingCfg {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RenderConfig {
    #[serde(default)]
    pub keyfile: KeyFileCfg,

    #[serde(default)]
    pub options: OptionsCfg,

    #[serde(default)]
    pub logging: LoggingCfg,

    #[serde(skip)]
    pub path: PathBuf,
}

impl RenderConfig {
    /// Load from TOML when the extension says so, YAML otherwise.
    pub fn load<P: AsRef<Path>>(path: P) -> LuksResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut cfg = if matches!(path.extension().and_then(|ext| ext.to_str()), Some(ext) if ext.eq_ignore_ascii_case("toml"))
        {
            toml::from_str::<Self>(&contents)?
        } else {
            serde_yaml::from_str::<Self>(&contents)?
        };

        cfg.path = path.to_path_buf();
        cfg.check()?;
        Ok(cfg)
    }

    pub fn check(&self) -> LuksResult<()> {
        if !is_mime(&self.keyfile.default_mime) {
            return Err(LuksError::InvalidConfig(format!(
                "keyfile.default_mime `{}` is not a type/subtype mime",
                self.keyfile.default_mime
            )));
        }

        if let Some(token) = self
            .options
            .extra_option_tokens
            .iter()
            .find(|token| token.is_empty() || token.chars().any(char::is_whitespace))
        {
            return Err(LuksError::InvalidConfig(format!(
                "options.extra_option_tokens contains an invalid token `{token}`"
            )));
        }

        Ok(())
    }
}

fn is_mime(mime: &str) -> bool {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
        Some((kind, subtype)) => {
            let token = |s: &str| {
                !s.is_empty()
                    && s.chars()
                        .all(|c| c.is_ascii_alphanumeric() || "!#$&^_.+-".contains(c))
            };
            token(kind) && token(subtype)
        }
        None => false,
    }
}
