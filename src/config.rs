// SPDX-License-Identifier: GPL-3.0-only

use crate::constants::{camera, frame_interval, timing};
use crate::errors::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user's config dir
const APP_DIR: &str = "fingertip-pulse";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// User configuration, persisted as JSON
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Measurement length in seconds
    pub duration_seconds: u32,
    /// V4L2 device path used by `measure`
    pub camera_device: String,
    /// Try to switch the torch on while measuring
    pub torch: bool,
    /// Frame loop rate (frames sampled per second)
    pub frame_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_seconds: timing::DEFAULT_DURATION_SECS,
            camera_device: camera::DEFAULT_DEVICE.to_string(),
            torch: true,
            frame_rate: timing::DEFAULT_FRAME_RATE,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> PulseResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> PulseResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| PulseError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write to the default location
    pub fn save(&self) -> PulseResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| PulseError::Config("no config directory available".to_string()))?;
        self.save_to(&path)
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> PulseResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> PulseResult<()> {
        if self.duration_seconds == 0 {
            return Err(PulseError::Config(
                "duration_seconds must be greater than zero".to_string(),
            ));
        }
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(PulseError::Config(format!(
                "frame_rate must be between 1 and 240 (got {})",
                self.frame_rate
            )));
        }
        Ok(())
    }

    /// Timing parameters for a detection session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            duration: Duration::from_secs(u64::from(self.duration_seconds)),
            frame_interval: frame_interval(self.frame_rate),
            torch: self.torch,
            ..SessionConfig::default()
        }
    }
}

/// Timing of one detection session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Overall timeout
    pub duration: Duration,
    /// Progress timer period
    pub progress_interval: Duration,
    /// Delay between playback start and the first sampled frame
    pub settle_delay: Duration,
    /// Detection time before live BPM is published
    pub publish_warmup: Duration,
    /// Frame loop period
    pub frame_interval: Duration,
    /// Attempt to enable the torch
    pub torch: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(u64::from(timing::DEFAULT_DURATION_SECS)),
            progress_interval: timing::PROGRESS_INTERVAL,
            settle_delay: timing::SETTLE_DELAY,
            publish_warmup: timing::PUBLISH_WARMUP,
            frame_interval: frame_interval(timing::DEFAULT_FRAME_RATE),
            torch: true,
        }
    }
}

impl SessionConfig {
    /// Default timing with a custom duration
    pub fn with_duration_secs(seconds: u64) -> Self {
        Self {
            duration: Duration::from_secs(seconds),
            ..Self::default()
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}
