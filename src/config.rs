//! Runtime configuration for the synchronization core.
//!
//! Settings are layered: `plugsmith.toml` in the working directory (if
//! present) → environment variables → CLI flags. All values have
//! sensible defaults so the crate works with no configuration at all.
//!
//! # Configuration File Format
//!
//! ```toml
//! [backend]
//! url = "http://localhost:8080"
//!
//! [sync]
//! poll_interval_secs = 180
//! debounce_ms = 1500
//! max_fix_attempts = 3
//!
//! [selection]
//! entry_marker = "Main"
//! source_root = "src/main/java"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "plugsmith.toml";

/// Backend endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
        }
    }
}

/// Timing knobs for the scheduler and invalidation debounce, plus the
/// opaque fix-attempt budget forwarded to the backend on recompile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_max_fix_attempts")]
    pub max_fix_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            debounce_ms: default_debounce_ms(),
            max_fix_attempts: default_max_fix_attempts(),
        }
    }
}

/// Default-file selection convention: prefer a file under `source_root`
/// whose name contains `entry_marker`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "default_entry_marker")]
    pub entry_marker: String,
    #[serde(default = "default_source_root")]
    pub source_root: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            entry_marker: default_entry_marker(),
            source_root: default_source_root(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval_secs() -> u64 {
    180
}

fn default_debounce_ms() -> u64 {
    1500
}

fn default_max_fix_attempts() -> u32 {
    3
}

fn default_entry_marker() -> String {
    "Main".to_string()
}

fn default_source_root() -> String {
    "src/main/java".to_string()
}

/// Full runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
}

impl Config {
    /// Parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
        Ok(config)
    }

    /// Load `plugsmith.toml` from the given directory if it exists,
    /// otherwise start from defaults; then apply environment overrides.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variables take precedence over the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("PLUGSMITH_BACKEND_URL") {
            self.backend.url = url;
        }
        if let Ok(secs) = std::env::var("PLUGSMITH_POLL_INTERVAL_SECS")
            && let Ok(secs) = secs.parse()
        {
            self.sync.poll_interval_secs = secs;
        }
        if let Ok(ms) = std::env::var("PLUGSMITH_DEBOUNCE_MS")
            && let Ok(ms) = ms.parse()
        {
            self.sync.debounce_ms = ms;
        }
        if let Ok(attempts) = std::env::var("PLUGSMITH_MAX_FIX_ATTEMPTS")
            && let Ok(attempts) = attempts.parse()
        {
            self.sync.max_fix_attempts = attempts;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.sync.poll_interval_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.sync.debounce_ms)
    }
}
