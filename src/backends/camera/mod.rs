// SPDX-License-Identifier: MPL-2.0

//! Camera pipeline abstraction
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Host (plugin API)  │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐       ┌─────────────────────┐
//! │  CameraController   │──────▶│     EventBridge     │ ◀── streaming thread
//! └──────────┬──────────┘       │ FrameSlot + capture │     (frames, bus)
//!            │                  └─────────────────────┘
//!            ▼
//! ┌─────────────────────┐
//! │  MediaGraph trait   │  ← state changes, device controls
//! └──────────┬──────────┘
//!            │
//!            ▼
//!       ┌────────┐
//!       │  V4L2  │  ← v4l2src ! jpegdec ! videoconvert ! appsink
//!       └────────┘
//! ```

pub mod bridge;
pub mod controller;
pub mod frame_slot;
pub mod types;
pub mod v4l2;

pub use bridge::{CaptureCallback, EventBridge};
pub use controller::CameraController;
pub use frame_slot::FrameSlot;
pub use types::*;

use crate::config::CameraConfig;
use crate::errors::CameraResult;
use std::sync::Arc;
use std::time::Duration;

/// Receives frame-ready notifications
///
/// Called on the pipeline's streaming thread after each new frame has been
/// installed. Implementations should only signal; pull the frame later.
pub trait StreamHandler: Send + Sync {
    fn on_frame_decoded(&self);
}

impl<F> StreamHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_frame_decoded(&self) {
        self()
    }
}

/// A built processing graph
///
/// Implementations own their elements and bus. Frames and bus messages are
/// routed to the [`EventBridge`] handed to [`GraphFactory::build`].
///
/// The controller calls into the graph without holding its own lock, so a
/// graph may be used from several host threads at once.
pub trait MediaGraph: Send + Sync {
    /// Request `target` and wait for the engine to confirm it
    ///
    /// `timeout` bounds the wait for an asynchronous change; `None` waits
    /// until the engine answers.
    fn set_state(&self, target: TargetState, timeout: Option<Duration>) -> CameraResult<()>;

    /// Apply an absolute zoom step on the capture device
    fn apply_zoom(&self, step: i32) -> CameraResult<()>;

    /// Stop delivery, drop to an inert state and release engine resources
    ///
    /// Must be safe to call more than once.
    fn shutdown(&self);
}

/// Builds a [`MediaGraph`] for a configuration
pub trait GraphFactory: Send + Sync {
    /// Construct and link the graph
    ///
    /// On error, nothing built so far may be left running.
    fn build(
        &self,
        config: &CameraConfig,
        bridge: Arc<EventBridge>,
    ) -> CameraResult<Box<dyn MediaGraph>>;
}
