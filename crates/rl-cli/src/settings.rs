use std::path::{Path, PathBuf};

use anyhow::Context;
use rl_engine::EngineConfig;
use rl_server::ServerConfig;
use rl_store::LedgerConfig;
use serde::{Deserialize, Serialize};

/// Settings file read when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "rl.toml";

/// Ledger location when the settings file names none.
pub const DEFAULT_LEDGER_PATH: &str = ".rl/ledger.wal";

/// Contents of `rl.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub ledger: LedgerConfig,
    pub server: ServerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            ledger: LedgerConfig::durable(DEFAULT_LEDGER_PATH),
            server: ServerConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid settings")
    }

    /// Read `explicit` if given (it must exist), otherwise `rl.toml` in the
    /// working directory if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !fallback.exists() {
                    return Ok(Self::default());
                }
                fallback
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Apply command-line overrides.
    pub fn with_ledger(mut self, ledger: Option<PathBuf>) -> Self {
        if let Some(path) = ledger {
            self.ledger.path = Some(path);
        }
        self
    }
}
