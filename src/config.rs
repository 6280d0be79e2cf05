// Mon Feb 16 2026 - Alex

use crate::error::{Error, Result};
use crate::scanner::ScanFlags;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

static GLOBAL: OnceCell<Config> = OnceCell::new();

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of slots in the process-wide handle registry.
    pub callback_pool_capacity: usize,
    pub default_timeout_seconds: u64,
    pub default_flags: u32,
    pub fast_mode: bool,
    /// Buffer capacity used by `Rules::save` and `Rules::load`.
    pub stream_buffer_size: usize,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callback_pool_capacity: 4096,
            default_timeout_seconds: 0,
            default_flags: 0,
            fast_mode: false,
            stream_buffer_size: 4096,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback_pool_capacity(mut self, capacity: usize) -> Self {
        self.callback_pool_capacity = capacity;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_seconds = timeout.as_secs();
        self
    }

    pub fn with_default_flags(mut self, flags: ScanFlags) -> Self {
        self.default_flags = flags.bits();
        self
    }

    pub fn with_fast_mode(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }

    pub fn with_stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size;
        self
    }

    pub fn with_log_level(mut self, level: &str) -> Self {
        self.log_level = level.to_string();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.callback_pool_capacity == 0 {
            return Err("callback_pool_capacity must be greater than 0".to_string());
        }
        if self.stream_buffer_size == 0 {
            return Err("stream_buffer_size must be greater than 0".to_string());
        }
        if ScanFlags::from_bits(self.default_flags).is_none() {
            return Err(format!("default_flags contains unknown bits: {:#x}", self.default_flags));
        }
        if self.default_timeout_seconds > i32::MAX as u64 {
            return Err("default_timeout_seconds is too large".to_string());
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate().map_err(Error::Config)?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Installs `self` as the process-wide configuration. Only the first
    /// install wins; the handle registry reads its capacity on first use.
    pub fn install(self) -> Result<()> {
        self.validate().map_err(Error::Config)?;
        GLOBAL
            .set(self)
            .map_err(|_| Error::Config("configuration already installed".to_string()))
    }

    pub fn global() -> &'static Config {
        GLOBAL.get_or_init(Config::default)
    }

    pub fn scan_flags(&self) -> ScanFlags {
        let mut flags = ScanFlags::from_bits_truncate(self.default_flags);
        if self.fast_mode {
            flags |= ScanFlags::FAST_MODE;
        }
        flags
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }
}
