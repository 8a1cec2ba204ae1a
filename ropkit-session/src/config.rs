//! Session configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via ROPKIT_CONFIG)
//! 3. Environment variables

use ropkit_protocol::rop::BufferTooSmallResponse;
use ropkit_protocol::{BUFFER_HEADER_LEN, DEFAULT_PCB_OUT, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// When a Pending marker is appended to a response buffer.
///
/// Which behavior a server exhibits is version-dependent, so the policy is
/// always explicit configuration, never a hard-coded default hidden from
/// callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Emit Pending only when queued notifications remain after the drain.
    WhenBacklogRemains,
    /// Emit Pending whenever the queue was non-empty before the drain,
    /// even if every notification fit.
    WheneverQueued,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum response buffer size in bytes (`pcb_out`).
    pub pcb_out: u32,
    /// Pending-marker policy.
    pub pending_policy: PendingPolicy,
    /// Notification queue configuration.
    pub queue: QueueConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            pcb_out: DEFAULT_PCB_OUT,
            pending_policy: PendingPolicy::WhenBacklogRemains,
            queue: QueueConfig::default(),
        }
    }
}

/// Notification queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum queued notifications; 0 means unbounded.
    pub max_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_depth: 1024 }
    }
}

impl SessionConfig {
    /// Loads configuration from file, then applies environment variable
    /// overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("ROPKIT_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: SessionConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(size) = std::env::var("ROPKIT_PCB_OUT") {
            if let Ok(n) = size.parse() {
                self.pcb_out = n;
            }
        }

        if let Ok(policy) = std::env::var("ROPKIT_PENDING_POLICY") {
            match policy.to_lowercase().as_str() {
                "when_backlog_remains" => self.pending_policy = PendingPolicy::WhenBacklogRemains,
                "whenever_queued" => self.pending_policy = PendingPolicy::WheneverQueued,
                _ => {}
            }
        }

        if let Ok(depth) = std::env::var("ROPKIT_QUEUE_DEPTH") {
            if let Ok(n) = depth.parse() {
                self.queue.max_depth = n;
            }
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floor = (BUFFER_HEADER_LEN + 2 + BufferTooSmallResponse::ENCODED_LEN) as u32;
        if self.pcb_out < floor {
            return Err(ConfigError::ValidationError(format!(
                "pcb_out {} is below the minimum of {floor}",
                self.pcb_out
            )));
        }
        if self.pcb_out as usize > BUFFER_HEADER_LEN + MAX_PAYLOAD_SIZE {
            return Err(ConfigError::ValidationError(format!(
                "pcb_out {} exceeds the addressable buffer size",
                self.pcb_out
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
