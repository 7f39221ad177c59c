// SPDX-License-Identifier: GPL-3.0-only

//! Camera profile configuration
//!
//! The profile is read once when a controller is created. Values are fixed
//! for the lifetime of the built pipeline; changing the file afterwards has
//! no effect until a new controller is created.

use crate::backends::camera::types::ZoomRange;
use crate::constants::{app_info, profile, timing};
use crate::errors::{CameraError, CameraResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// V4L2 capture device (e.g., /dev/video0)
    pub device_path: String,
    /// Capture width in pixels
    pub width: u32,
    /// Capture height in pixels
    pub height: u32,
    /// Capture framerate
    pub framerate: u32,
    /// Raw pixel format requested from the converter
    pub output_format: String,
    /// Digital zoom range supported by the device
    pub zoom: ZoomRange,
    /// Deadline for asynchronous state changes; `None` waits forever
    pub state_change_timeout_ms: Option<u64>,
    /// Move the pipeline to PAUSED right after it is built
    pub preroll: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_path: profile::DEVICE_PATH.to_string(),
            width: profile::WIDTH,
            height: profile::HEIGHT,
            framerate: profile::FRAMERATE,
            output_format: profile::OUTPUT_FORMAT.to_string(),
            zoom: ZoomRange::default(),
            state_change_timeout_ms: Some(timing::STATE_CHANGE_TIMEOUT_MS),
            preroll: true,
        }
    }
}

impl CameraConfig {
    /// Default config location: `$XDG_CONFIG_HOME/gst-camera/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join(app_info::APP_NAME)
                .join(app_info::CONFIG_FILE_NAME)
        })
    }

    /// Load the config from `path`, or from [`Self::default_path`]
    ///
    /// A missing file at the default location yields the built-in profile.
    /// A missing file at an explicit path is an error.
    pub fn load(path: Option<&Path>) -> CameraResult<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => {
                    debug!("No config directory, using built-in profile");
                    return Ok(Self::default());
                }
            },
        };

        if !explicit && !path.exists() {
            debug!(path = %path.display(), "Config file not found, using built-in profile");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config = Self::from_json(&contents)?;
        info!(path = %path.display(), device = %config.device_path, "Loaded camera config");
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json(contents: &str) -> CameraResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> CameraResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> CameraResult<()> {
        if self.device_path.is_empty() {
            return Err(CameraError::Config("device_path is empty".to_string()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(CameraError::Config(format!(
                "invalid capture size {}x{}",
                self.width, self.height
            )));
        }
        if self.framerate == 0 {
            return Err(CameraError::Config("framerate must be non-zero".to_string()));
        }
        // Caps carry these as signed 32-bit fields
        let limit = i32::MAX as u32;
        if self.width > limit || self.height > limit || self.framerate > limit {
            return Err(CameraError::Config(format!(
                "capture mode {}x{}@{} exceeds {}",
                self.width, self.height, self.framerate, limit
            )));
        }
        if self.output_format.is_empty() {
            return Err(CameraError::Config("output_format is empty".to_string()));
        }
        if !self.zoom.min.is_finite() || !self.zoom.max.is_finite() || self.zoom.min > self.zoom.max
        {
            return Err(CameraError::Config(format!(
                "invalid zoom range {}",
                self.zoom
            )));
        }
        Ok(())
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.zoom
    }

    pub fn state_change_timeout(&self) -> Option<Duration> {
        self.state_change_timeout_ms.map(Duration::from_millis)
    }
}
