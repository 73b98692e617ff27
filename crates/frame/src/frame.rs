//! Frames and composite bitmaps.

use std::fmt;
use std::sync::Arc;

use crate::FrameLedger;

/// Stable identifier for one input source ("camera", "screen", ...).
///
/// Cheap to clone; uniqueness within a composer is required. Insertion
/// order into the composer, not the identifier itself, decides layout
/// slot assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(Arc::from(id.into().as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single decoded RGBA8 image with a capture timestamp.
///
/// A frame has exactly one owner at any time; it moves between tasks by
/// value and its buffer is released exactly once, on drop. Frames
/// created through a [`FrameLedger`] report creation and release so a
/// run can be audited for leaks.
pub struct Frame {
    width: u32,
    height: u32,
    timestamp_us: u64,
    data: Vec<u8>,
    ledger: Arc<FrameLedger>,
}

impl Frame {
    /// Create a ledger-tracked frame from an RGBA8 buffer.
    ///
    /// Panics if the buffer size does not match `width * height * 4`.
    pub fn new(
        ledger: &Arc<FrameLedger>,
        width: u32,
        height: u32,
        timestamp_us: u64,
        data: Vec<u8>,
    ) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 4,
            "frame buffer size does not match dimensions {width}x{height}"
        );
        ledger.record_frame_created();
        Self {
            width,
            height,
            timestamp_us,
            data,
            ledger: ledger.clone(),
        }
    }

    /// Create a ledger-tracked frame filled with one RGBA color.
    pub fn solid(
        ledger: &Arc<FrameLedger>,
        width: u32,
        height: u32,
        timestamp_us: u64,
        rgba: [u8; 4],
    ) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&rgba);
        }
        Self::new(ledger, width, height, timestamp_us, data)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    /// The RGBA8 pixel buffer, row-major, `width * 4` bytes per row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at pixel coordinates, for probing in tests.
    pub fn rgba_at(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let data = self.data();
        [data[idx], data[idx + 1], data[idx + 2], data[idx + 3]]
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp_us", &self.timestamp_us)
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.ledger.record_frame_released();
    }
}

/// An immutable snapshot of the render surface at one render pass.
///
/// Single-use: consumed exactly once into an output [`Frame`] via
/// [`CompositeBitmap::into_output_frame`], or released unused on drop.
pub struct CompositeBitmap {
    width: u32,
    height: u32,
    data: Option<Vec<u8>>,
    ledger: Arc<FrameLedger>,
}

impl CompositeBitmap {
    /// Wrap a detached canvas buffer as a tracked bitmap.
    pub fn new(ledger: &Arc<FrameLedger>, width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            width as usize * height as usize * 4,
            "bitmap buffer size does not match dimensions {width}x{height}"
        );
        ledger.record_bitmap_created();
        Self {
            width,
            height,
            data: Some(data),
            ledger: ledger.clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// Consume the bitmap into an output frame with the given timestamp.
    ///
    /// The pixel buffer moves; the bitmap itself is released.
    pub fn into_output_frame(mut self, ledger: &Arc<FrameLedger>, timestamp_us: u64) -> Frame {
        let data = self.data.take().unwrap_or_default();
        Frame::new(ledger, self.width, self.height, timestamp_us, data)
    }
}

impl fmt::Debug for CompositeBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeBitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl Drop for CompositeBitmap {
    fn drop(&mut self) {
        self.ledger.record_bitmap_released();
    }
}
