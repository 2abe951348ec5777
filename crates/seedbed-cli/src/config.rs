use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use seedbed_store::StoreOptions;

use crate::errors::CliResult;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "seedbed.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default directive when `RUST_LOG` is not set.
    pub filter: String,
    /// Also append JSON logs to this file.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Connection string used when `--conn` is omitted.
    pub conn: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            conn: None,
            max_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

/// Contents of `seedbed.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedbedConfig {
    pub store: StoreOptions,
    pub logging: LoggingConfig,
    pub apply: ApplyConfig,
}

impl SeedbedConfig {
    pub fn from_toml(content: &str) -> CliResult<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Load the explicit config file, or `seedbed.toml` from the working
/// directory when present, or the defaults.
pub fn load_config(path: Option<&Path>) -> CliResult<SeedbedConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(CONFIG_FILE);
            if !default.exists() {
                return Ok(SeedbedConfig::default());
            }
            default
        }
    };

    let content = std::fs::read_to_string(&path)?;
    SeedbedConfig::from_toml(&content)
}
