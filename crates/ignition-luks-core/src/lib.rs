pub mod attributes;
pub mod builder;
pub mod config;
pub mod datasource;
pub mod error;
pub mod keyfile;
pub mod logging;
pub mod schema;
pub mod types;
pub mod validate;

pub use attributes::ResourceData;
pub use builder::{build_luks, content_hash, Rendered};
pub use config::RenderConfig;
pub use datasource::{DataSource, LuksDataSource};
pub use error::{LuksError, LuksResult};
pub use keyfile::KeyFile;
pub use schema::Schema;
pub use types::{Clevis, ClevisCustom, HttpHeader, Luks, LuksOption, Resource, Tang};
pub use validate::{ContextPath, Report, Validate};
