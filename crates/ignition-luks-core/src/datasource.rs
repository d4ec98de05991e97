use crate::attributes::{ResourceData, RENDERED};
use crate::builder::build_luks;
use crate::config::RenderConfig;
use crate::error::LuksResult;
use crate::schema::Schema;
use serde_json::Value;
use std::sync::Arc;

/// Operations the host invokes on a data source.
///
/// Implementations are pure: they read the attribute bag, compute, and only
/// write back into the same bag. Nothing outlives a single call.
pub trait DataSource {
    /// Declared attribute surface.
    fn schema(&self) -> &Schema;

    /// Compute outputs and record them (and the identifier) in `data`.
    fn read(&self, data: &mut ResourceData) -> LuksResult<()>;

    /// Rebuild from `data` and report whether it still matches its identifier.
    fn exists(&self, data: &ResourceData) -> LuksResult<bool>;

    /// Conform raw attributes against [`DataSource::schema`].
    fn load(&self, attributes: Value) -> LuksResult<ResourceData> {
        self.schema().conform(attributes)
    }
}

/// The `ignition_luks` data source.
pub struct LuksDataSource {
    config: Arc<RenderConfig>,
    schema: Schema,
}

impl LuksDataSource {
    pub fn new(config: Arc<RenderConfig>) -> Self {
        let schema = Schema::luks(&config.keyfile.default_mime);
        Self { config, schema }
    }
}

impl DataSource for LuksDataSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn read(&self, data: &mut ResourceData) -> LuksResult<()> {
        let rendered = build_luks(data, &self.config)?;
        data.set(RENDERED, rendered.json);
        data.set_id(rendered.id);
        Ok(())
    }

    fn exists(&self, data: &ResourceData) -> LuksResult<bool> {
        let rendered = build_luks(data, &self.config)?;
        Ok(data.id() == Some(rendered.id.as_str()))
    }
}
