// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the camera pipeline

//! Shared types for the camera pipeline

use crate::constants::frame_byte_len;
use gstreamer::buffer::{MappedBuffer, Readable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Frame data storage - either pre-copied bytes or zero-copy GStreamer buffer
///
/// The `Mapped` variant keeps the GStreamer buffer mapped and holds one
/// reference to it until the last clone is dropped.
#[derive(Clone)]
pub enum FrameData {
    /// Pre-copied bytes (used for tests and synthetic frames)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer - no data copy, just reference counting
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl FrameData {
    /// Create FrameData from a mapped GStreamer buffer (zero-copy)
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        FrameData::Mapped(Arc::new(buffer))
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        match self {
            FrameData::Copied(data) => data.len(),
            FrameData::Mapped(buf) => buf.len(),
        }
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<u8>> for FrameData {
    fn from(data: Vec<u8>) -> Self {
        FrameData::Copied(Arc::from(data))
    }
}

impl std::fmt::Debug for FrameData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameData::Copied(data) => write!(f, "FrameData::Copied({} bytes)", data.len()),
            FrameData::Mapped(buf) => write!(f, "FrameData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for FrameData {
    fn as_ref(&self) -> &[u8] {
        match self {
            FrameData::Copied(data) => data.as_ref(),
            FrameData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for FrameData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// An immutable decoded frame: dimensions and pixels travel together
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub width: u32,
    pub height: u32,
    pub data: FrameData,
    /// When the sink handed the frame over
    pub captured_at: Instant,
}

impl FrameSnapshot {
    pub fn new(width: u32, height: u32, data: impl Into<FrameData>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
            captured_at: Instant::now(),
        }
    }

    /// Size in bytes of the packed RGBA representation
    pub fn packed_len(&self) -> usize {
        frame_byte_len(self.width, self.height)
    }

    /// Copy the frame out as packed RGBA, exactly `width * height * 4` bytes
    ///
    /// A short buffer is zero-padded and a long one truncated, so the length
    /// always matches the dimensions of this snapshot.
    pub fn to_packed_rgba(&self) -> Vec<u8> {
        let expected = self.packed_len();
        let src: &[u8] = &self.data;
        let n = src.len().min(expected);

        let mut out = vec![0u8; expected];
        out[..n].copy_from_slice(&src[..n]);
        out
    }
}

/// Lifecycle state of the camera pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PipelineState {
    /// Graph not constructed (initial state, or after a failed build)
    #[default]
    Unbuilt,
    /// Graph built and linked, device opened but not streaming
    Ready,
    /// Prerolled, clock stopped
    Paused,
    /// Streaming frames
    Playing,
    /// Torn down; terminal
    Destroyed,
}

impl PipelineState {
    /// Whether the graph exists and can accept a state change
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            PipelineState::Ready | PipelineState::Paused | PipelineState::Playing
        )
    }

    /// The engine state to request to return here, for live states
    pub fn as_target(&self) -> Option<TargetState> {
        match self {
            PipelineState::Ready => Some(TargetState::Ready),
            PipelineState::Paused => Some(TargetState::Paused),
            PipelineState::Playing => Some(TargetState::Playing),
            PipelineState::Unbuilt | PipelineState::Destroyed => None,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Unbuilt => write!(f, "unbuilt"),
            PipelineState::Ready => write!(f, "ready"),
            PipelineState::Paused => write!(f, "paused"),
            PipelineState::Playing => write!(f, "playing"),
            PipelineState::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// State a running graph can be asked to reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    Ready,
    Paused,
    Playing,
}

impl From<TargetState> for PipelineState {
    fn from(target: TargetState) -> Self {
        match target {
            TargetState::Ready => PipelineState::Ready,
            TargetState::Paused => PipelineState::Paused,
            TargetState::Playing => PipelineState::Playing,
        }
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&PipelineState::from(*self), f)
    }
}

/// Inclusive digital zoom range of the device profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f32,
    pub max: f32,
}

impl ZoomRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Check whether `level` lies within `[min, max]` (NaN never does)
    pub fn contains(&self, level: f32) -> bool {
        level >= self.min && level <= self.max
    }

    /// Device control step for an accepted level; fractional parts are truncated
    pub fn to_step(level: f32) -> i32 {
        level.trunc() as i32
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self::new(
            crate::constants::profile::ZOOM_MIN,
            crate::constants::profile::ZOOM_MAX,
        )
    }
}

impl std::fmt::Display for ZoomRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// A bus message after classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A still capture was written to `filename`
    CaptureDone { filename: String },
    /// Non-fatal diagnostic from an element
    Warning {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    /// Runtime error from an element; no automatic state change follows
    Error {
        source: Option<String>,
        message: String,
        debug: Option<String>,
    },
    /// Any message the bridge does not act on
    Ignored,
}
