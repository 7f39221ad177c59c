// SPDX-License-Identifier: MPL-2.0

//! Error types for the camera pipeline

use crate::backends::camera::types::{PipelineState, TargetState, ZoomRange};
use std::fmt;
use std::time::Duration;

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;

/// Camera pipeline error type
#[derive(Debug, Clone)]
pub enum CameraError {
    /// GStreamer could not be initialized
    InitializationFailed(String),
    /// A pipeline element could not be instantiated
    ElementCreation { factory: String, reason: String },
    /// Two elements could not be linked with the requested caps
    Link {
        from: String,
        to: String,
        reason: String,
    },
    /// The engine refused or failed a state change
    StateChange { target: TargetState, reason: String },
    /// The engine did not confirm a state change before the deadline
    ///
    /// The controller asks the engine to return to the previous state and
    /// keeps reporting that state.
    StateChangeTimeout {
        target: TargetState,
        waited: Duration,
    },
    /// Operation not allowed in the current lifecycle state
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },
    /// Requested zoom level lies outside the device range
    ZoomOutOfRange { level: f32, range: ZoomRange },
    /// The device rejected the zoom control update
    ZoomControl(String),
    /// Feature not available with this device profile
    Unsupported(&'static str),
    /// Configuration errors
    Config(String),
    /// Filesystem errors
    Io(String),
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::InitializationFailed(msg) => {
                write!(f, "Initialization failed: {}", msg)
            }
            CameraError::ElementCreation { factory, reason } => {
                write!(f, "Failed to create {}: {}", factory, reason)
            }
            CameraError::Link { from, to, reason } => {
                write!(f, "Failed to link {} to {}: {}", from, to, reason)
            }
            CameraError::StateChange { target, reason } => {
                write!(f, "Failed to change the state to {}: {}", target, reason)
            }
            CameraError::StateChangeTimeout { target, waited } => write!(
                f,
                "State change to {} not confirmed after {} ms",
                target,
                waited.as_millis()
            ),
            CameraError::InvalidState { operation, state } => {
                write!(f, "Cannot {} while the pipeline is {}", operation, state)
            }
            CameraError::ZoomOutOfRange { level, range } => {
                write!(f, "Zoom level {} is outside {}", level, range)
            }
            CameraError::ZoomControl(msg) => write!(f, "Zoom control failed: {}", msg),
            CameraError::Unsupported(what) => write!(f, "{} is not supported", what),
            CameraError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CameraError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for CameraError {}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CameraError {
    fn from(err: serde_json::Error) -> Self {
        CameraError::Config(err.to_string())
    }
}

impl From<gstreamer::glib::Error> for CameraError {
    fn from(err: gstreamer::glib::Error) -> Self {
        CameraError::InitializationFailed(err.to_string())
    }
}
