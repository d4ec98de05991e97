use crate::validate::Report;
use thiserror::Error;

/// Result alias for core operations.
pub type LuksResult<T> = Result<T, LuksError>;

#[derive(Error, Debug)]
pub enum LuksError {
    #[error("[IL1000] io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[IL1001] toml config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("[IL1002] yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("[IL1003] json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("[IL1100] configuration error: {0}")]
    InvalidConfig(String),

    #[error("[IL1200] attribute `{path}` {reason}")]
    Attribute { path: String, reason: String },

    #[error("[IL1201] attribute `{path}` must be {expected}")]
    AttributeType { path: String, expected: &'static str },

    #[error("[IL1300] content and source options are incompatible")]
    KeySourceConflict,

    #[error("[IL1400] luks config is invalid:\n{0}")]
    Validation(Report),

    #[error("[IL1500] failed to render luks config: {0}")]
    Render(serde_json::Error),
}

impl LuksError {
    pub fn code(&self) -> &'static str {
        match self {
            LuksError::Io(_) => "IL1000",
            LuksError::Toml(_) => "IL1001",
            LuksError::Yaml(_) => "IL1002",
            LuksError::Json(_) => "IL1003",
            LuksError::InvalidConfig(_) => "IL1100",
            LuksError::Attribute { .. } => "IL1200",
            LuksError::AttributeType { .. } => "IL1201",
            LuksError::KeySourceConflict => "IL1300",
            LuksError::Validation(_) => "IL1400",
            LuksError::Render(_) => "IL1500",
        }
    }

    pub(crate) fn attribute(path: impl Into<String>, reason: impl Into<String>) -> Self {
        LuksError::Attribute {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn attribute_type(path: impl Into<String>, expected: &'static str) -> Self {
        LuksError::AttributeType {
            path: path.into(),
            expected,
        }
    }
}
