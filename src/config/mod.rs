//! Configuration module for the shopfloor agent
//!
//! This module handles agent configuration including:
//! - Buffer sizing (observation buffer, checkpoint interval, asset capacity)
//! - Logging setup
//! - Device and data-item definitions
//! - Producers (device connections) and their pipeline options
//!
//! # Files
//!
//! Configuration is read from TOML (`.toml`) or JSON (`.json`) files:
//!
//! ```toml
//! [agent]
//! buffer_size = 131072
//! checkpoint_frequency = 1000
//! max_assets = 1024
//!
//! [logging]
//! level = "info"
//!
//! [[devices]]
//! name = "LinuxCNC"
//! uuid = "000"
//! data_items = [
//!     { id = "x1", name = "Xpos", category = "SAMPLE", type = "POSITION" },
//! ]
//!
//! [[producers]]
//! name = "linuxcnc-adapter"
//! device = "LinuxCNC"
//! options = { FilterDuplicates = true }
//! ```

pub mod options;

pub use options::PipelineOptions;

use crate::device::DataItem;
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Default observation buffer capacity
pub const DEFAULT_BUFFER_SIZE: usize = 131_072;

/// Default interval between observation checkpoints
pub const DEFAULT_CHECKPOINT_FREQUENCY: u64 = 1000;

/// Default asset buffer capacity
pub const DEFAULT_MAX_ASSETS: usize = 1024;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_LEVEL: &str = "info,shopfloor_agent=debug";

/// Buffer sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Observation buffer capacity (number of observations retained)
    pub buffer_size: usize,

    /// Snapshot state every N appended observations (0 disables)
    pub checkpoint_frequency: u64,

    /// Asset buffer capacity
    pub max_assets: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            checkpoint_frequency: DEFAULT_CHECKPOINT_FREQUENCY,
            max_assets: DEFAULT_MAX_ASSETS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,

    /// Directory for daily-rolling log files (stderr only when unset)
    pub directory: Option<PathBuf>,

    /// Log file name prefix
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            directory: None,
            file_prefix: "shopfloor-agent.log".to_string(),
        }
    }
}

/// One device and its data items
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,

    #[serde(default)]
    pub uuid: String,

    #[serde(default)]
    pub data_items: Vec<DataItem>,
}

/// One producer (device connection)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProducerConfig {
    /// Producer identity, reported on connection status entities
    pub name: String,

    /// Device the producer's data items belong to
    pub device: String,

    #[serde(default)]
    pub options: PipelineOptions,
}

impl ProducerConfig {
    pub fn new(name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }
}

/// Complete agent configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub devices: Vec<DeviceConfig>,

    #[serde(default)]
    pub producers: Vec<ProducerConfig>,
}

enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Toml,
        }
    }
}

impl AgentConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AgentError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk (TOML, or JSON by extension)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = match FileFormat::of(path) {
            FileFormat::Json => serde_json::from_str(&content).map_err(|e| {
                AgentError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
            FileFormat::Toml => toml::from_str(&content).map_err(|e| {
                AgentError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to disk (TOML, or JSON by extension)
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AgentError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = match FileFormat::of(path) {
            FileFormat::Json => serde_json::to_string_pretty(self)?,
            FileFormat::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content).map_err(|e| {
            AgentError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check sizing, producer names and producer options
    pub fn validate(&self) -> Result<()> {
        if self.agent.buffer_size == 0 {
            return Err(AgentError::Config("buffer_size must be positive".to_string()));
        }
        if self.agent.max_assets == 0 {
            return Err(AgentError::Config("max_assets must be positive".to_string()));
        }

        let devices: HashSet<&str> = self
            .devices
            .iter()
            .flat_map(|d| [d.name.as_str(), d.uuid.as_str()])
            .filter(|s| !s.is_empty())
            .collect();

        let mut names = HashSet::new();
        for producer in &self.producers {
            if producer.name.is_empty() {
                return Err(AgentError::Config("producer name must not be empty".to_string()));
            }
            if !names.insert(producer.name.as_str()) {
                return Err(AgentError::Config(format!(
                    "duplicate producer '{}'",
                    producer.name
                )));
            }
            if !devices.contains(producer.device.as_str()) {
                return Err(AgentError::Config(format!(
                    "producer '{}' references unknown device '{}'",
                    producer.name, producer.device
                )));
            }
            producer
                .options
                .validate()
                .map_err(|e| AgentError::from(e).with_context(format!("producer '{}'", producer.name)))?;
        }
        Ok(())
    }

    /// Find a producer by name
    pub fn find_producer(&self, name: &str) -> Option<&ProducerConfig> {
        self.producers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Category;

    const SAMPLE: &str = r#"
        [agent]
        buffer_size = 16
        checkpoint_frequency = 4

        [[devices]]
        name = "LinuxCNC"
        uuid = "000"
        data_items = [
            { id = "x1", name = "Xpos", category = "SAMPLE", type = "POSITION", conversion = { factor = 25.4 } },
            { id = "exec", name = "execution", category = "EVENT" },
        ]

        [[producers]]
        name = "adapter"
        device = "LinuxCNC"
        options = { FilterDuplicates = true, ConversionRequired = true }
    "#;

    #[test]
    fn test_parse_sample() {
        let config = AgentConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.agent.buffer_size, 16);
        assert_eq!(config.agent.max_assets, DEFAULT_MAX_ASSETS);
        assert_eq!(config.devices[0].data_items[0].category, Category::Sample);
        assert_eq!(config.devices[0].data_items[0].kind, "POSITION");
        assert_eq!(
            config.devices[0].data_items[0].conversion.map(|c| c.factor),
            Some(25.4)
        );
        let producer = config.find_producer("adapter").unwrap();
        assert!(producer.options.filter_duplicates);
        assert!(producer.options.conversion_required);
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.agent.buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(config.logging.level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_device_rejected() {
        let mut config = AgentConfig::default();
        config.producers.push(ProducerConfig::new("adapter", "Mill"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown device"));
    }

    #[test]
    fn test_contradictory_producer_options_rejected() {
        let mut config = AgentConfig::from_toml_str(SAMPLE).unwrap();
        config.producers[0].options = PipelineOptions::new()
            .ignore_timestamps(true)
            .relative_time(true);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_buffer_rejected() {
        let mut config = AgentConfig::default();
        config.agent.buffer_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = AgentConfig::from_toml_str(SAMPLE).unwrap();

        let toml_path = dir.path().join("agent.toml");
        config.save(&toml_path).unwrap();
        assert_eq!(AgentConfig::load(&toml_path).unwrap(), config);

        let json_path = dir.path().join("agent.json");
        config.save(&json_path).unwrap();
        assert_eq!(AgentConfig::load(&json_path).unwrap(), config);
    }
}
