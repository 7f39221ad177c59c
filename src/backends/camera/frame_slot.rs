// SPDX-License-Identifier: GPL-3.0-only

//! Latest-frame slot shared between the streaming thread and host threads
//!
//! The slot holds one immutable [`FrameSnapshot`]. A new frame replaces the
//! whole snapshot in a single atomic swap, so readers always see a buffer
//! together with the dimensions it was decoded at. Readers copy out of their
//! own `Arc` and never block the writer.

use super::types::FrameSnapshot;
use arc_swap::ArcSwapOption;
use std::sync::Arc;

#[derive(Default)]
pub struct FrameSlot {
    current: ArcSwapOption<FrameSnapshot>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `frame`, returning the snapshot it replaced
    ///
    /// The slot's reference to the previous frame is released by the swap;
    /// the underlying buffer is freed once no reader still holds it.
    pub fn store(&self, frame: FrameSnapshot) -> Option<Arc<FrameSnapshot>> {
        self.current.swap(Some(Arc::new(frame)))
    }

    /// Current snapshot, if any frame has arrived
    pub fn load(&self) -> Option<Arc<FrameSnapshot>> {
        self.current.load_full()
    }

    /// Dimensions of the current snapshot
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let guard = self.current.load();
        guard.as_ref().map(|frame| (frame.width, frame.height))
    }

    /// Packed RGBA copy of the current frame (`width * height * 4` bytes)
    pub fn read_packed(&self) -> Option<Vec<u8>> {
        self.load().map(|frame| frame.to_packed_rgba())
    }

    /// Drop the held frame
    pub fn clear(&self) {
        self.current.store(None);
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_none()
    }
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("dimensions", &self.dimensions())
            .finish()
    }
}
