//! Configuration management
//!
//! Loads the daemon configuration from a TOML file. Every timing knob has a
//! default matching the fixed constants of the original deployment (5 s
//! probe interval, 60 probes, 2000 ms recovery debounce), so a minimal
//! config only lists the groups.
//!
//! ```toml
//! [[groups]]
//! title = "Office CO2"
//! name = "co2_office"
//! targets = ["wb-msw-v4_80/CO2", "wb-msw-v4_81/CO2"]
//! ```

use crate::error::ConfigError;
use crate::points::PointAddress;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level daemon configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Discovery probing knobs
    pub discovery: DiscoveryConfig,
    /// Validity tracking knobs
    pub validity: ValidityConfig,
    /// Monitored sensor groups
    pub groups: Vec<GroupConfig>,
}

/// Discovery probing knobs
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Seconds between reachability probes
    pub probe_interval_seconds: u64,
    /// Number of probes before admission runs anyway
    pub probe_attempts: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe_interval_seconds: 5,
            probe_attempts: 60,
        }
    }
}

/// Validity tracking knobs
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidityConfig {
    /// How long a recovered member must stay error-free before it is
    /// trusted again
    pub recovery_debounce_ms: u64,
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            recovery_debounce_ms: 2000,
        }
    }
}

/// One monitored sensor group
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    /// Human-readable description, used in logs
    #[serde(default)]
    pub title: String,
    /// Display-surface name; becomes the device segment of published cells
    pub name: String,
    /// Addresses of the sensors to track, `device/control` each
    #[serde(default)]
    pub targets: Vec<String>,
}

impl GroupConfig {
    /// Title for logs, falling back to the surface name
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.name
        } else {
            &self.title
        }
    }

    /// The targets parsed into point addresses
    pub fn target_addresses(&self) -> Result<Vec<PointAddress>, ConfigError> {
        self.targets
            .iter()
            .map(|target| {
                target.parse().map_err(|e| {
                    ConfigError::ValidationError(format!(
                        "group '{}': bad target '{}': {}",
                        self.name, target, e
                    ))
                })
            })
            .collect()
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadError` if the file cannot be read,
    /// `ConfigError::TomlError` if it is not valid TOML, and
    /// `ConfigError::ValidationError` for semantically invalid values.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the semantic constraints the TOML schema cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.probe_interval_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.probe_interval_seconds must be at least 1".to_string(),
            ));
        }
        if self.discovery.probe_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.probe_attempts must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(ConfigError::ValidationError(
                    "group name must not be empty".to_string(),
                ));
            }
            if group.name.contains('/') || group.name.contains('#') {
                return Err(ConfigError::ValidationError(format!(
                    "group name '{}' must not contain '/' or '#'",
                    group.name
                )));
            }
            if !names.insert(group.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate group name '{}'",
                    group.name
                )));
            }
            group.target_addresses()?;
        }
        Ok(())
    }

    /// The configured probe interval
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.discovery.probe_interval_seconds)
    }

    /// The configured recovery debounce window
    pub fn recovery_debounce(&self) -> Duration {
        Duration::from_millis(self.validity.recovery_debounce_ms)
    }
}
