//! Configuration loading and config file resolution
//!
//! Settings live in a TOML file. The file is located in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `STORYTIME_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/storytime/config.toml` on Linux)
//! 4. Compiled defaults (no file)
//!
//! Every key is optional; anything missing falls back to the defaults below.

use crate::fade_curves::FadeCurve;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "STORYTIME_CONFIG";

/// Top-level player configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub transport: TransportConfig,
    pub audio: AudioConfig,
    pub wake_lock: WakeLockConfig,
}

/// Transport timing knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Distance covered by skip forward/backward, in seconds
    pub skip_seconds: f64,

    /// A voice that ends within this many seconds of the track end counts
    /// as a natural completion
    pub end_tolerance_seconds: f64,

    /// Gain ramp applied when playback starts
    pub fade_in_ms: u64,

    /// Gain ramp applied before a paused voice is torn down
    pub fade_out_ms: u64,

    pub fade_curve: FadeCurve,

    /// Start playing as soon as the selected story finishes decoding
    pub autoplay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            skip_seconds: 10.0,
            end_tolerance_seconds: 0.2,
            fade_in_ms: 100,
            fade_out_ms: 100,
            fade_curve: FadeCurve::Linear,
            autoplay: true,
        }
    }
}

impl TransportConfig {
    pub fn fade_in_seconds(&self) -> f64 {
        self.fade_in_ms as f64 / 1000.0
    }

    pub fn fade_out_seconds(&self) -> f64 {
        self.fade_out_ms as f64 / 1000.0
    }
}

/// PCM format produced by the speech service, plus output device selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,

    /// Output device name (None = system default)
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 24_000,
            channels: 1,
            output_device: None,
        }
    }
}

/// Display wake lock settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeLockConfig {
    pub enabled: bool,

    /// Inhibitor command held open while narration plays; killed on release
    pub command: Vec<String>,
}

impl Default for WakeLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: [
                "systemd-inhibit",
                "--what=idle",
                "--who=storytime",
                "--why=Bedtime story narration",
                "sleep",
                "infinity",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl PlayerConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PlayerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load configuration following the priority order above
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(path) => Self::load_from_file(&path),
            None => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the transport cannot work with
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if !(t.skip_seconds.is_finite() && t.skip_seconds > 0.0) {
            return Err(Error::Config(format!(
                "transport.skip_seconds must be positive, got {}",
                t.skip_seconds
            )));
        }
        if !(t.end_tolerance_seconds.is_finite() && t.end_tolerance_seconds >= 0.0) {
            return Err(Error::Config(format!(
                "transport.end_tolerance_seconds must not be negative, got {}",
                t.end_tolerance_seconds
            )));
        }
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be non-zero".to_string()));
        }
        if self.audio.channels == 0 {
            return Err(Error::Config("audio.channels must be non-zero".to_string()));
        }
        if self.wake_lock.enabled && self.wake_lock.command.is_empty() {
            return Err(Error::Config(
                "wake_lock.command must not be empty when the wake lock is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Locate the config file: CLI argument, then environment variable, then the
/// platform config directory. Returns None when no file applies.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (may not exist)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("storytime").join("config.toml"))
}
