//! Resource accounting for frames and composite bitmaps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared create/release counters for all pixel-owning objects in one
/// pipeline run.
///
/// Every [`Frame`](crate::Frame) and [`CompositeBitmap`](crate::CompositeBitmap)
/// registers on creation and reports back on drop. After `stop()` both
/// outstanding counts must be zero; a non-zero count is a leak of
/// native-buffer-sized allocations, not a style issue.
#[derive(Debug, Default)]
pub struct FrameLedger {
    frames_created: AtomicU64,
    frames_released: AtomicU64,
    bitmaps_created: AtomicU64,
    bitmaps_released: AtomicU64,
}

impl FrameLedger {
    /// Create a fresh ledger wrapped for sharing across tasks.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn record_frame_created(&self) {
        self.frames_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_released(&self) {
        self.frames_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bitmap_created(&self) {
        self.bitmaps_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bitmap_released(&self) {
        self.bitmaps_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Total frames created so far.
    pub fn frames_created(&self) -> u64 {
        self.frames_created.load(Ordering::Relaxed)
    }

    /// Total frames released so far.
    pub fn frames_released(&self) -> u64 {
        self.frames_released.load(Ordering::Relaxed)
    }

    /// Frames currently alive.
    pub fn outstanding_frames(&self) -> u64 {
        self.frames_created() - self.frames_released()
    }

    /// Bitmaps currently alive.
    pub fn outstanding_bitmaps(&self) -> u64 {
        self.bitmaps_created.load(Ordering::Relaxed)
            - self.bitmaps_released.load(Ordering::Relaxed)
    }

    /// True when every frame and bitmap ever created has been released.
    pub fn is_balanced(&self) -> bool {
        self.outstanding_frames() == 0 && self.outstanding_bitmaps() == 0
    }
}
