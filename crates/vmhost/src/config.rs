//! Host configuration.
//!
//! Loaded from TOML. Every field has a default, so a partial file only
//! overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::gas_metering::GasSchedule;
use crate::{DEFAULT_PROTECTED_KEY_PREFIX, DEFAULT_RESERVED_KEY_PREFIX, MAX_CALL_DEPTH, MAX_CODE_SIZE};

/// VM host configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmHostConfig {
    /// Global storage namespace no contract may write
    pub reserved_key_prefix: String,
    /// Per-account namespace reserved for built-in functions
    pub protected_key_prefix: String,
    /// Maximum nesting of contract calls
    pub max_call_depth: usize,
    /// Maximum contract code size in bytes
    pub max_code_size: usize,
    pub gas_schedule: GasSchedule,
}

impl Default for VmHostConfig {
    fn default() -> Self {
        Self {
            reserved_key_prefix: DEFAULT_RESERVED_KEY_PREFIX.to_string(),
            protected_key_prefix: DEFAULT_PROTECTED_KEY_PREFIX.to_string(),
            max_call_depth: MAX_CALL_DEPTH,
            max_code_size: MAX_CODE_SIZE,
            gas_schedule: GasSchedule::default(),
        }
    }
}

impl VmHostConfig {
    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let config: VmHostConfig = toml::from_str(contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        if path.to_string_lossy().contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e))?;
        let config: VmHostConfig = toml::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file '{}': {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn to_file(&self, path: &Path) -> anyhow::Result<()> {
        if path.to_string_lossy().contains("..") {
            anyhow::bail!("Invalid path: directory traversal detected");
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write config file '{}': {}", path.display(), e))?;
        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reserved_key_prefix.is_empty() {
            anyhow::bail!("Reserved key prefix cannot be empty");
        }
        if self.protected_key_prefix.is_empty() {
            anyhow::bail!("Protected key prefix cannot be empty");
        }
        if self.max_call_depth == 0 {
            anyhow::bail!("Max call depth cannot be 0");
        }
        if self.max_code_size == 0 {
            anyhow::bail!("Max code size cannot be 0");
        }
        Ok(())
    }
}
