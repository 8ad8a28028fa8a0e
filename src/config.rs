//! Configuration: YAML file with defaults for every field.
//!
//! Nothing here is required; a missing file yields the defaults, which
//! is how the CLI usually runs.

use crate::batch::DEFAULT_MAX_BATCH;
use crate::resolver::TokenCodes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file; defaults under the platform data directory
    pub db_path: Option<PathBuf>,
    /// Upper bound on bulk reassignment batch size
    pub max_batch: usize,
    /// Operation codes trusted when parsing activation-flow tokens
    pub activation_codes: Vec<String>,
    /// Operation codes trusted when parsing shipment-flow tokens
    pub shipment_codes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let codes = TokenCodes::default();
        Self {
            db_path: None,
            max_batch: DEFAULT_MAX_BATCH,
            activation_codes: codes.activation,
            shipment_codes: codes.shipment,
        }
    }
}

impl Config {
    /// Load from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Load from the given path, or from the default location, falling
    /// back to defaults when no file exists
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let candidate = path
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("stockwell/config.yaml")));
        match candidate {
            Some(p) if p.exists() => Self::load(&p).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    pub fn token_codes(&self) -> TokenCodes {
        TokenCodes {
            activation: self.activation_codes.clone(),
            shipment: self.shipment_codes.clone(),
        }
    }

    /// Resolve the database path (~/.local/share/stockwell/stockwell.db
    /// unless configured)
    pub fn resolve_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
        let dir = data_dir.join("stockwell");
        std::fs::create_dir_all(&dir).ok();
        dir.join("stockwell.db")
    }
}
