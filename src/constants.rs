// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Fixed capture profile for the MJPEG camera
///
/// These are the defaults used by [`crate::config::CameraConfig`]. The
/// device path is fixed once a controller has been built.
pub mod profile {
    /// V4L2 capture device
    pub const DEVICE_PATH: &str = "/dev/video34";

    /// Capture width in pixels
    pub const WIDTH: u32 = 1920;

    /// Capture height in pixels
    pub const HEIGHT: u32 = 1080;

    /// Capture framerate (frames per second)
    pub const FRAMERATE: u32 = 30;

    /// Output pixel format delivered to the sink
    /// RGBA uses 4 bytes/pixel in R, G, B, A byte order
    pub const OUTPUT_FORMAT: &str = "RGBA";

    /// Bytes per pixel of [`OUTPUT_FORMAT`]
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Lowest digital zoom step supported by the device
    pub const ZOOM_MIN: f32 = 0.0;

    /// Highest digital zoom step supported by the device
    pub const ZOOM_MAX: f32 = 3.0;
}

/// GStreamer element and caps names
pub mod elements {
    /// Pipeline name
    pub const PIPELINE_NAME: &str = "camera-pipeline";

    /// Source element factory
    pub const SOURCE_FACTORY: &str = "v4l2src";
    /// Source element instance name
    pub const SOURCE_NAME: &str = "source";

    /// JPEG decoder factory
    pub const DECODER_FACTORY: &str = "jpegdec";
    /// JPEG decoder instance name
    pub const DECODER_NAME: &str = "jpegdec";

    /// Color-space converter factory
    pub const CONVERT_FACTORY: &str = "videoconvert";
    /// Color-space converter instance name
    pub const CONVERT_NAME: &str = "videoconvert";

    /// Sink instance name (appsink)
    pub const SINK_NAME: &str = "videosink";

    /// Media type at the source -> decoder boundary
    pub const MJPEG_MEDIA_TYPE: &str = "image/jpeg";

    /// Media type at the convert -> sink boundary
    pub const RAW_VIDEO_MEDIA_TYPE: &str = "video/x-raw";
}

/// V4L2 controls applied through `v4l2src`
pub mod controls {
    /// `v4l2src` property taking a structure of control values
    pub const EXTRA_CONTROLS_PROPERTY: &str = "extra-controls";

    /// Structure name used for the control set
    pub const CONTROLS_STRUCTURE: &str = "controls";

    /// Normalised V4L2 control name for absolute zoom
    pub const ZOOM_ABSOLUTE: &str = "zoom_absolute";
}

/// Bus message names and fields
pub mod messages {
    /// Element message posted when a still capture has been written
    pub const IMAGE_DONE: &str = "image-done";

    /// Field of [`IMAGE_DONE`] carrying the written file
    pub const FILENAME_FIELD: &str = "filename";
}

/// Timing constants
pub mod timing {
    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Default deadline for a requested state change to complete
    pub const STATE_CHANGE_TIMEOUT_MS: u64 = 5_000;

    /// Wait for the NULL state during teardown
    pub const TEARDOWN_TIMEOUT_SECS: u64 = 2;

    /// Poll interval used by the CLI while waiting for frames
    pub const FRAME_POLL_INTERVAL_MS: u64 = 16;

    /// How long the CLI waits for a first frame before giving up
    pub const FIRST_FRAME_TIMEOUT_SECS: u64 = 5;
}

/// Application information utilities
pub mod app_info {
    /// Application name, also used for the config directory
    pub const APP_NAME: &str = "gst-camera";

    /// Config file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "config.json";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

/// Byte length of a packed frame with the output format
pub fn frame_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * profile::BYTES_PER_PIXEL
}
