// SPDX-License-Identifier: MPL-2.0

//! GStreamer camera adapter
//!
//! Configures a fixed `v4l2src ! jpegdec ! videoconvert ! appsink` pipeline
//! and exposes a small control surface to a host runtime: play, pause, stop,
//! zoom, latest-frame retrieval and a still-capture callback.
//!
//! # Architecture
//!
//! - [`backends`]: pipeline controller, frame slot, event bridge and the
//!   GStreamer graph
//! - [`plugin`]: boolean host surface over the controller
//! - [`config`]: camera profile configuration
//! - [`errors`]: error types
//!
//! # Example
//!
//! ```ignore
//! use gst_camera::{CameraConfig, CameraPlugin};
//!
//! gst_camera::init()?;
//! let camera = CameraPlugin::create(CameraConfig::default(), || {});
//! camera.play();
//! let rgba = camera.get_frame();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod plugin;

// Re-export commonly used types
pub use backends::camera::{CameraController, FrameSnapshot, PipelineState, StreamHandler, ZoomRange};
pub use config::CameraConfig;
pub use errors::{CameraError, CameraResult};
pub use plugin::CameraPlugin;

/// Initialize GStreamer; safe to call repeatedly
pub fn init() -> CameraResult<()> {
    gstreamer::init()?;
    Ok(())
}

/// Deinitialize GStreamer
///
/// # Safety
///
/// No GStreamer object may be used after this call, and [`init`] must not be
/// called again in this process.
pub unsafe fn deinit() {
    // SAFETY: forwarded to the caller
    unsafe { gstreamer::deinit() };
}
