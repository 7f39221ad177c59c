// SPDX-License-Identifier: GPL-3.0-only

//! Event bridge between the GStreamer streaming thread and the host
//!
//! The pipeline calls into the bridge from its own threads: once per decoded
//! frame and once per bus message. Both entry points are short and never
//! block on host code beyond the frame-ready notification.

use super::StreamHandler;
use super::frame_slot::FrameSlot;
use super::types::{BusEvent, FrameSnapshot};
use crate::constants::timing;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// One-shot callback receiving the file written by a still capture
pub type CaptureCallback = Box<dyn FnOnce(String) + Send + 'static>;

pub struct EventBridge {
    slot: FrameSlot,
    handler: Box<dyn StreamHandler>,
    capture: Mutex<Option<CaptureCallback>>,
    frame_count: AtomicU64,
}

impl EventBridge {
    pub fn new(handler: impl StreamHandler + 'static) -> Self {
        Self {
            slot: FrameSlot::new(),
            handler: Box::new(handler),
            capture: Mutex::new(None),
            frame_count: AtomicU64::new(0),
        }
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Frame handoff from the sink
    ///
    /// A sample without payload is dropped; the slot keeps the last frame.
    pub fn on_frame(&self, frame: FrameSnapshot) {
        if frame.data.is_empty() {
            warn!(width = frame.width, height = frame.height, "Dropping empty frame");
            return;
        }

        let frame_num = self.frame_count.fetch_add(1, Ordering::Relaxed);

        if self.slot.dimensions() != Some((frame.width, frame.height)) {
            info!(
                width = frame.width,
                height = frame.height,
                "Pixel buffer size changed"
            );
        }

        if frame_num % timing::FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = frame_num,
                width = frame.width,
                height = frame.height,
                size_kb = frame.data.len() / 1024,
                "Frame decoded"
            );
        }

        self.slot.store(frame);
        self.handler.on_frame_decoded();
    }

    /// Bus message handling; every message is consumed here
    pub fn on_bus_event(&self, event: BusEvent) {
        match event {
            BusEvent::CaptureDone { filename } => {
                let pending = self.lock_capture().take();
                match pending {
                    Some(callback) => {
                        info!(%filename, "Still capture completed");
                        callback(filename);
                    }
                    None => debug!(%filename, "Capture completed with no pending request"),
                }
            }
            BusEvent::Warning {
                source,
                message,
                debug: debug_info,
            } => {
                warn!(
                    source = source.as_deref().unwrap_or("unknown"),
                    warning = %message,
                    debug = ?debug_info,
                    "GStreamer warning"
                );
            }
            BusEvent::Error {
                source,
                message,
                debug: debug_info,
            } => {
                error!(
                    source = source.as_deref().unwrap_or("unknown"),
                    error = %message,
                    debug = ?debug_info,
                    "GStreamer error"
                );
            }
            BusEvent::Ignored => {}
        }
    }

    /// Record the pending capture request, replacing any earlier one
    pub fn set_capture_request(&self, callback: CaptureCallback) {
        if self.lock_capture().replace(callback).is_some() {
            debug!("Replaced pending capture request");
        }
    }

    pub fn has_pending_capture(&self) -> bool {
        self.lock_capture().is_some()
    }

    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    /// Number of frames delivered so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    // A panicking capture callback must not wedge later requests
    fn lock_capture(&self) -> std::sync::MutexGuard<'_, Option<CaptureCallback>> {
        self.capture
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("slot", &self.slot)
            .field("frame_count", &self.frame_count())
            .field("pending_capture", &self.has_pending_capture())
            .finish()
    }
}
