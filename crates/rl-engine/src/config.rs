use std::path::Path;

use rl_types::RecordSchema;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::registry::SchemaRegistry;

/// Page-size limits for paginated queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

impl PagingConfig {
    /// Effective page size: 0 selects the default, anything above the
    /// maximum is clamped.
    pub fn resolve(&self, requested: u32) -> u32 {
        let max = self.max_page_size.max(1);
        let size = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        size.clamp(1, max)
    }
}

/// Engine configuration, usually the `[engine]` table of `rl.toml`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub paging: PagingConfig,
    /// Extra kinds registered alongside the builtins.
    pub kinds: Vec<RecordSchema>,
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> EngineResult<Self> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Builtin kinds plus the configured extras.
    pub fn registry(&self) -> EngineResult<SchemaRegistry> {
        let mut registry = SchemaRegistry::builtin();
        for schema in &self.kinds {
            registry.register(schema.clone())?;
        }
        Ok(registry)
    }
}
