// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing camera surface
//!
//! Every fallible call reports success as a `bool` and logs the failure;
//! nothing is returned as an error to the host runtime.

use crate::backends::camera::types::{FrameSnapshot, PipelineState, ZoomRange};
use crate::backends::camera::{CameraController, GraphFactory, StreamHandler};
use crate::config::CameraConfig;
use crate::errors::CameraResult;
use std::sync::Arc;
use tracing::{error, warn};

pub struct CameraPlugin {
    controller: CameraController,
}

impl CameraPlugin {
    /// Create and build the V4L2 camera pipeline
    ///
    /// `handler` is called on the streaming thread whenever a new frame is
    /// available. Check [`Self::is_built`] before playing.
    pub fn create(config: CameraConfig, handler: impl StreamHandler + 'static) -> Self {
        Self::from_controller(CameraController::v4l2(config, handler))
    }

    /// Create with a custom graph factory
    pub fn with_factory(
        config: CameraConfig,
        factory: impl GraphFactory + 'static,
        handler: impl StreamHandler + 'static,
    ) -> Self {
        Self::from_controller(CameraController::new(config, factory, handler))
    }

    fn from_controller(controller: CameraController) -> Self {
        if let Err(e) = controller.build() {
            error!(error = %e, "Failed to create a pipeline");
        }
        Self { controller }
    }

    /// Whether the pipeline was built and has not been torn down
    pub fn is_built(&self) -> bool {
        self.controller.state().is_live()
    }

    pub fn play(&self) -> bool {
        report("play", self.controller.play())
    }

    pub fn pause(&self) -> bool {
        report("pause", self.controller.pause())
    }

    pub fn stop(&self) -> bool {
        report("stop", self.controller.stop())
    }

    /// Packed RGBA bytes of the latest frame, `None` before the first frame
    pub fn get_frame(&self) -> Option<Vec<u8>> {
        self.controller.get_frame()
    }

    /// Latest frame without copying
    pub fn frame(&self) -> Option<Arc<FrameSnapshot>> {
        self.controller.frame()
    }

    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.controller.frame_size()
    }

    pub fn set_zoom(&self, level: f32) -> bool {
        report("set zoom", self.controller.set_zoom(level))
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.controller.zoom_range()
    }

    /// Register a one-shot still-capture callback
    ///
    /// Not fulfilled by the V4L2 profile; see
    /// [`CameraController::capture_still`].
    pub fn capture_still(&self, on_done: impl FnOnce(String) + Send + 'static) {
        self.controller.capture_still(Box::new(on_done));
    }

    pub fn state(&self) -> PipelineState {
        self.controller.state()
    }

    /// Release the pipeline; safe to call more than once
    pub fn teardown(&self) {
        self.controller.teardown();
    }

    pub fn controller(&self) -> &CameraController {
        &self.controller
    }
}

fn report(operation: &str, result: CameraResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(operation, error = %e, "Camera operation failed");
            false
        }
    }
}
