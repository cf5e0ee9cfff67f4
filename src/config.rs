//! Configuration using Figment
//!
//! Settings are layered, later sources overriding earlier ones:
//! 1. Built-in defaults
//! 2. `config/arv-stream.toml` (or a file given to `load_from`)
//! 3. Environment variables prefixed with `ARV_STREAM_`, with `__` between
//!    nesting levels
//!
//! # Example
//! ```no_run
//! use arv_stream::config::AcqConfig;
//!
//! let config = AcqConfig::load()?;
//! config.validate()?;
//! println!("pool size: {}", config.session.pool_size);
//! # Ok::<(), arv_stream::AcqError>(())
//! ```
//!
//! `ARV_STREAM_SESSION__POOL_SIZE=4` overrides `session.pool_size`.

use crate::components::acquisition::SessionConfig;
use crate::components::frame_pool::{DEFAULT_POOL_SIZE, MAX_POOL_SIZE};
use crate::error::{AcqError, AcqResult};
use crate::stream::StreamConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/arv-stream.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "ARV_STREAM_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcqConfig {
    /// Acquisition session settings
    pub session: SessionSettings,
    /// Frame stream settings
    pub stream: StreamSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Acquisition session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Number of transfer buffers
    pub pool_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Frame stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    /// Frames to yield (absent = until cancelled)
    pub count: Option<u64>,
    /// Hardware frames consumed per yielded frame
    pub step: u32,
    /// Yield rate cap in frames per second
    pub max_fps: Option<f64>,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            count: None,
            step: 1,
            max_fps: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AcqConfig {
    /// Load from `config/arv-stream.toml` and the environment.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> AcqResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AcqResult<Self> {
        Self::figment(path.as_ref())
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(AcqError::from)
    }

    /// One TOML file, without environment overrides. Absent keys take defaults.
    pub fn figment(path: &Path) -> Figment {
        Figment::new().merge(Toml::file(path))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AcqResult<()> {
        let pool_size = self.session.pool_size;
        if pool_size == 0 || pool_size > MAX_POOL_SIZE {
            return Err(AcqError::Config(format!(
                "Invalid pool_size {pool_size}. Must be 1-{MAX_POOL_SIZE}"
            )));
        }

        if self.stream.step == 0 {
            return Err(AcqError::Config(
                "Invalid step 0. Must be at least 1".to_string(),
            ));
        }

        if let Some(fps) = self.stream.max_fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(AcqError::Config(format!(
                    "Invalid max_fps {fps}. Must be a positive number"
                )));
            }
        }

        let level = self.logging.level.to_lowercase();
        if !VALID_LEVELS.contains(&level.as_str()) {
            return Err(AcqError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            )));
        }

        let format = self.logging.format.to_lowercase();
        if !VALID_FORMATS.contains(&format.as_str()) {
            return Err(AcqError::Config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                VALID_FORMATS.join(", ")
            )));
        }

        Ok(())
    }

    /// Session parameters.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default().with_pool_size(self.session.pool_size)
    }

    /// Stream parameters.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            count: self.stream.count,
            step: self.stream.step,
            max_fps: self.stream.max_fps,
        }
    }
}
