//! Off-screen render surface for composite passes.

use std::sync::Arc;

use weave_frame::{CompositeBitmap, Frame, FrameLedger};

use crate::layout::{fit_rect, Rect};

/// Opaque black, the canvas background between draws.
const CLEAR_RGBA: [u8; 4] = [0, 0, 0, 255];

/// A fixed-dimension RGBA8 drawing buffer.
///
/// One surface lives inside the worker task. Each render pass clears
/// it, draws every populated slot into its layout cell, and detaches
/// the result with [`RenderSurface::snapshot`]. Snapshots never reuse
/// memory already handed off: the surface installs a fresh buffer and
/// stays drawable for the next pass.
pub struct RenderSurface {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    ledger: Arc<FrameLedger>,
}

impl RenderSurface {
    pub fn new(ledger: Arc<FrameLedger>, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffer: cleared_buffer(width, height),
            ledger,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reset the whole canvas to the background color.
    pub fn clear(&mut self) {
        for pixel in self.buffer.chunks_exact_mut(4) {
            pixel.copy_from_slice(&CLEAR_RGBA);
        }
    }

    /// Draw a frame into a layout cell: uniform scale to fit, centered,
    /// never cropped, never stretched anisotropically.
    ///
    /// Nearest-neighbour sampling; layout cells never overlap, so draw
    /// order across slots does not matter.
    pub fn draw(&mut self, frame: &Frame, cell: Rect) {
        let dst = fit_rect(frame.width(), frame.height(), cell);
        if dst.width == 0 || dst.height == 0 {
            return;
        }

        let src = frame.data();
        let src_w = frame.width() as usize;
        let surface_w = self.width as usize;

        for dy in 0..dst.height as usize {
            let sy = dy * frame.height() as usize / dst.height as usize;
            let src_row = sy * src_w * 4;
            let dst_row = (dst.y as usize + dy) * surface_w * 4;
            for dx in 0..dst.width as usize {
                let sx = dx * src_w / dst.width as usize;
                let s = src_row + sx * 4;
                let d = dst_row + (dst.x as usize + dx) * 4;
                self.buffer[d..d + 4].copy_from_slice(&src[s..s + 4]);
            }
        }
    }

    /// Detach the current canvas contents as an immutable bitmap.
    ///
    /// The surface swaps in a freshly cleared buffer, so the returned
    /// bitmap's memory is never written again.
    pub fn snapshot(&mut self) -> CompositeBitmap {
        let detached = std::mem::replace(&mut self.buffer, cleared_buffer(self.width, self.height));
        CompositeBitmap::new(&self.ledger, self.width, self.height, detached)
    }
}

fn cleared_buffer(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = vec![0u8; width as usize * height as usize * 4];
    for pixel in buffer.chunks_exact_mut(4) {
        pixel.copy_from_slice(&CLEAR_RGBA);
    }
    buffer
}
