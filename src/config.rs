//! Configuration for pinline.
//!
//! This module provides TOML configuration file loading from
//! `~/.pinline/config.toml`.
//!
//! # Configuration File
//!
//! ```toml
//! # Bottom rows kept clear of scrolling output (prompt + margin)
//! reserve_lines = 2
//!
//! # Fallback re-measure period of the resize watcher, in milliseconds
//! resize_poll_ms = 100
//!
//! # Enable ANSI processing and 24-bit color output
//! colors = true
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ui::RESERVE_LINE;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rows reserved at the bottom for the prompt
    pub reserve_lines: u16,
    /// Resize watcher fallback poll period
    pub resize_poll_ms: u64,
    /// Color output
    pub colors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reserve_lines: RESERVE_LINE,
            resize_poll_ms: 100,
            colors: true,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        match Self::get_config_path() {
            Some(path) if path.exists() => match fs::read_to_string(&path) {
                Ok(content) => Self::from_toml(&content),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Parse TOML, falling back to defaults on error
    pub fn from_toml(content: &str) -> Self {
        match toml::from_str(content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::get_config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            fs::write(&path, content)
                .map_err(|e| format!("Failed to write config: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    /// Poll period as a Duration, at least 1ms
    pub fn resize_poll(&self) -> Duration {
        Duration::from_millis(self.resize_poll_ms.max(1))
    }

    /// Directory holding config and log files
    pub fn config_dir() -> Option<PathBuf> {
        let dir = home_dir()?.join(".pinline");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir)
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}
