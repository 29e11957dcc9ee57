//! Front-end configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "ARPRULE_CONFIG";

/// Table used when neither the configuration nor `-t` names one.
pub const DEFAULT_TABLE: &str = "filter";

/// Directory holding table snapshots by default.
pub const DEFAULT_STATE_DIR: &str = "/var/lib/arprule";

/// Settings read from a JSON configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default table
    pub table: String,
    /// Snapshot file; derived from the table when unset
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE.to_string(),
            state_file: None,
        }
    }
}

impl Config {
    /// Load a configuration file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Load from `path`, else from `$ARPRULE_CONFIG`, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(env) => Self::load(Path::new(&env)),
                None => Ok(Self::default()),
            },
        }
    }

    /// Snapshot path for `table`.
    pub fn state_file_for(&self, table: &str) -> PathBuf {
        match &self.state_file {
            Some(path) => path.clone(),
            None => Path::new(DEFAULT_STATE_DIR).join(format!("{}.arpt", table)),
        }
    }
}
