//! Configuration for progress-server

use progress_engine::Curriculum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("questline-progress")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and this config file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Upper bound on a single persistence call, in milliseconds
    #[serde(default = "default_save_timeout_ms")]
    pub save_timeout_ms: u64,

    /// sled page cache size in bytes
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,

    /// Units, lessons, required tutorial NPCs and test scorer checkpoints
    #[serde(default)]
    pub curriculum: Curriculum,
}

fn default_http_port() -> u16 {
    5000
}

fn default_save_timeout_ms() -> u64 {
    5_000
}

fn default_cache_size() -> u64 {
    64 * 1024 * 1024 // 64MB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            save_timeout_ms: default_save_timeout_ms(),
            cache_size: default_cache_size(),
            curriculum: Curriculum::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get database path
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("progress.sled")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }
}
