//! Configuration management for the rxtap tools

use serde::{Deserialize, Serialize};
use std::path::Path;

use rxtap::{HookConfig, HEADER_LEN};

use crate::{Result, ToolError};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Receive hook settings
    pub hook: HookConfig,
    /// Output buffer pool
    pub pool: PoolConfig,
    /// Capture file output
    pub capture: CaptureConfig,
}

/// General configuration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// Buffer pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Use a bounded pool instead of plain heap buffers
    pub enabled: bool,
    /// Number of buffers in the pool
    pub buffers: usize,
    /// Capacity of each buffer in bytes
    pub buffer_size: usize,
}

/// Capture output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Snapshot length written to the pcap header; longer frames are truncated
    pub snaplen: u32,
}

/// Result of configuration validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffers: 64,
            buffer_size: rxtap::DEFAULT_MAX_OUTPUT_LEN,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { snaplen: 65535 }
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            hook: HookConfig::default(),
            pool: PoolConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl ToolConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ToolError::Config {
            message: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Get configuration as TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ToolError::Config {
            message: format!("Failed to serialize config: {}", e),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        };

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            result.errors.push(format!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                valid_levels.join(", ")
            ));
        }

        if let Err(e) = self.hook.validate() {
            result.errors.push(e.to_string());
        }

        if self.pool.enabled {
            if self.pool.buffers == 0 {
                result.errors.push("Pool must hold at least one buffer".to_string());
            }
            if self.pool.buffer_size < HEADER_LEN {
                result.errors.push(format!(
                    "Pool buffer size {} is smaller than the {}-byte capture header",
                    self.pool.buffer_size, HEADER_LEN
                ));
            } else if self.pool.buffer_size < self.hook.max_output_len {
                result.warnings.push(format!(
                    "Pool buffer size {} is below max_output_len {}, larger frames will be dropped",
                    self.pool.buffer_size, self.hook.max_output_len
                ));
            }
        }

        if (self.capture.snaplen as usize) < self.hook.max_output_len {
            result.warnings.push(format!(
                "snaplen {} is below max_output_len {}, captured frames may be truncated",
                self.capture.snaplen, self.hook.max_output_len
            ));
        }

        result.valid = result.errors.is_empty();
        result
    }
}
