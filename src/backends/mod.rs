// SPDX-License-Identifier: MPL-2.0

//! Backend layer for camera capture
//!
//! - [`camera`]: fixed-profile V4L2 capture pipeline, frame slot and event bridge

pub mod camera;
