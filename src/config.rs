//! Generator configuration
//!
//! ```yaml
//! template_dir: templates
//! output_dir: generated
//! format: true
//! header: true
//! ```
//!
//! Every key is optional. The config file itself is optional too: a missing
//! file yields the defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::error::{GenError, Result};

/// Settings for a generation run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecgenConfig {
    /// Directory holding the template sources
    pub template_dir: PathBuf,
    /// Directory generated files are written to
    pub output_dir: PathBuf,
    /// Run generated sources through rustfmt
    pub format: bool,
    /// Prefix generated files with the "do not edit" header
    pub header: bool,
}

impl Default for ExecgenConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            output_dir: PathBuf::from("generated"),
            format: true,
            header: true,
        }
    }
}

impl ExecgenConfig {
    pub fn from_yaml_str(yaml: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| GenError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GenError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = Self::from_yaml_str(&content, path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Locates the configuration file
pub struct ConfigLoader {
    config_path: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Create loader from EXECGEN_CONFIG env var or default to "execgen.yaml"
    pub fn from_env() -> Self {
        let path = std::env::var("EXECGEN_CONFIG").unwrap_or_else(|_| "execgen.yaml".to_string());
        Self::new(path)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the config file, or defaults when it does not exist
    pub fn load(&self) -> Result<ExecgenConfig> {
        if !self.config_path.exists() {
            info!(
                "No config at {}, using defaults",
                self.config_path.display()
            );
            return Ok(ExecgenConfig::default());
        }
        ExecgenConfig::load(&self.config_path)
    }
}
