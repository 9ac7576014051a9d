//! Configuration file support for aftcheck
//!
//! Loads and validates aftcheck configuration from TOML files.
//! Default location: /etc/sonic/aftcheck.toml
//!
//! # NIST 800-53 Rev 5 Control Mappings
//! - CM-6: Configuration Settings - Validated, file-based settings

use crate::collector::{CollectMode, CollectorConfig};
use crate::error::{AftCheckError, Result};
use crate::validate::ValidationMode;
use serde::{Deserialize, Serialize};
use sonic_gnmi::{parse_path, TargetConfig};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/aftcheck.toml";

/// gNMI target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    /// Target address (host:port)
    #[serde(default = "default_address")]
    pub address: String,

    /// Username sent as call metadata
    #[serde(default)]
    pub username: Option<String>,

    /// Password sent as call metadata
    #[serde(default)]
    pub password: Option<String>,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Counter collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSection {
    /// Subscription mode (sample or once)
    #[serde(default)]
    pub mode: CollectMode,

    /// Sample interval in milliseconds
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    /// Collection window in seconds
    #[serde(default = "default_collect_duration")]
    pub collect_duration_secs: u64,

    /// Wait after half-close before forcing end-of-stream, in milliseconds
    #[serde(default = "default_half_close_grace")]
    pub half_close_grace_ms: u64,

    /// Notification queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Counter path to subscribe to
    #[serde(default = "default_counter_path")]
    pub path: String,
}

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSection {
    /// Validation mode (exact, increment, transit)
    #[serde(default = "default_validation_mode")]
    pub mode: String,

    /// Allowed deviation for exact mode, percent of offered packets
    #[serde(default)]
    pub tolerance_percent: f64,

    /// Accept unknown modes as a no-op pass instead of rejecting them
    #[serde(default)]
    pub allow_unknown_mode: bool,

    /// Allowed absolute deviation of traffic distribution ratios
    #[serde(default = "default_distribution_tolerance")]
    pub distribution_tolerance: f64,
}

/// Complete aftcheck configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AftCheckConfig {
    /// Target configuration
    #[serde(default)]
    pub target: TargetSection,

    /// Collection configuration
    #[serde(default)]
    pub collection: CollectionSection,

    /// Validation configuration
    #[serde(default)]
    pub validation: ValidationSection,
}

// Default functions
fn default_address() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_sample_interval() -> u64 {
    1000
}

fn default_collect_duration() -> u64 {
    20
}

fn default_half_close_grace() -> u64 {
    2000
}

fn default_queue_capacity() -> usize {
    100
}

fn default_counter_path() -> String {
    crate::collector::counter_path().display().to_string()
}

fn default_validation_mode() -> String {
    "exact".to_string()
}

fn default_distribution_tolerance() -> f64 {
    0.02
}

// Default implementations
impl Default for TargetSection {
    fn default() -> Self {
        Self {
            address: default_address(),
            username: None,
            password: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for CollectionSection {
    fn default() -> Self {
        Self {
            mode: CollectMode::default(),
            sample_interval_ms: default_sample_interval(),
            collect_duration_secs: default_collect_duration(),
            half_close_grace_ms: default_half_close_grace(),
            queue_capacity: default_queue_capacity(),
            path: default_counter_path(),
        }
    }
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            mode: default_validation_mode(),
            tolerance_percent: 0.0,
            allow_unknown_mode: false,
            distribution_tolerance: default_distribution_tolerance(),
        }
    }
}

impl AftCheckConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config = toml::from_str(&content)?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AftCheckError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AftCheckError::config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.target.connect_timeout_secs)
    }

    /// Get sample interval as Duration
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.collection.sample_interval_ms)
    }

    /// Get collection window as Duration
    pub fn collect_duration(&self) -> Duration {
        Duration::from_secs(self.collection.collect_duration_secs)
    }

    /// Get half-close grace period as Duration
    pub fn half_close_grace(&self) -> Duration {
        Duration::from_millis(self.collection.half_close_grace_ms)
    }

    /// Builds the gNMI target configuration.
    pub fn target_config(&self) -> TargetConfig {
        let mut target = TargetConfig::new(self.target.address.clone())
            .with_connect_timeout(self.connect_timeout());
        target.username = self.target.username.clone();
        target.password = self.target.password.clone();
        target
    }

    /// Builds the collector configuration.
    pub fn collector_config(&self) -> Result<CollectorConfig> {
        Ok(CollectorConfig {
            mode: self.collection.mode,
            path: parse_path(&self.collection.path)?,
            sample_interval: self.sample_interval(),
            collect_duration: self.collect_duration(),
            half_close_grace: self.half_close_grace(),
            queue_capacity: self.collection.queue_capacity,
        })
    }

    /// Resolves the configured validation mode.
    ///
    /// Unknown names are rejected unless `allow_unknown_mode` is set.
    pub fn validation_mode(&self) -> Result<ValidationMode> {
        if self.validation.allow_unknown_mode {
            Ok(ValidationMode::parse_lenient(&self.validation.mode))
        } else {
            self.validation.mode.parse()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.target.address.trim().is_empty() {
            return Err(AftCheckError::config("target address must not be empty"));
        }

        if self.collection.sample_interval_ms == 0 {
            return Err(AftCheckError::config("sample_interval_ms must be > 0"));
        }

        if self.collection.collect_duration_secs == 0 {
            return Err(AftCheckError::config("collect_duration_secs must be > 0"));
        }

        if self.collection.queue_capacity == 0 {
            return Err(AftCheckError::config("queue_capacity must be > 0"));
        }

        if self.validation.tolerance_percent < 0.0 {
            return Err(AftCheckError::config("tolerance_percent must be >= 0"));
        }

        if !(0.0..=1.0).contains(&self.validation.distribution_tolerance) {
            return Err(AftCheckError::config("distribution_tolerance must be 0-1"));
        }

        parse_path(&self.collection.path)?;
        self.validation_mode()?;

        Ok(())
    }
}
