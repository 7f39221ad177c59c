// SPDX-License-Identifier: MPL-2.0

//! V4L2 camera backend
//!
//! Streams MJPEG from a `v4l2src` device, decodes and converts it to RGBA in
//! GStreamer, and hands each frame to the [`super::EventBridge`].

pub mod bus;
mod pipeline;

pub use pipeline::{V4l2Graph, V4l2GraphFactory};
