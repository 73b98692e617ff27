//! Layout engine: source count + canvas size to placement rectangles.
//!
//! Pure functions, no state. The grid policy by active source count:
//!
//! | sources | grid              |
//! |---------|-------------------|
//! | 0       | (nothing drawn)   |
//! | 1       | full canvas       |
//! | 2       | side-by-side      |
//! | 3       | three columns     |
//! | 4       | 2x2               |
//! | 5-6     | 3x2, blanks empty |

/// An axis-aligned placement rectangle on the canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether this rect overlaps another (shared edges do not count).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Whether this rect lies fully inside a canvas of the given size.
    pub fn within(&self, canvas_width: u32, canvas_height: u32) -> bool {
        self.x + self.width <= canvas_width && self.y + self.height <= canvas_height
    }
}

/// Grid shape for a given active source count.
fn grid_for(active: usize) -> (u32, u32) {
    match active {
        0 | 1 => (1, 1),
        2 => (2, 1),
        3 => (3, 1),
        4 => (2, 2),
        // 5-6 sources share a 3x2 grid; unused cells stay blank.
        _ => (3, 2),
    }
}

/// Compute one placement rect per active source, in slot order.
///
/// Deterministic: rects depend only on the count and canvas size, never
/// on frame arrival timing. Callers assign rects to sources in the
/// order the sources were registered.
pub fn compute_layout(active: usize, canvas_width: u32, canvas_height: u32) -> Vec<Rect> {
    if active == 0 {
        return Vec::new();
    }

    let (cols, rows) = grid_for(active);
    let cell_width = canvas_width / cols;
    let cell_height = canvas_height / rows;

    let capacity = (cols * rows) as usize;
    let mut rects = Vec::with_capacity(active.min(capacity));
    for i in 0..active.min(capacity) {
        let col = i as u32 % cols;
        let row = i as u32 / cols;
        rects.push(Rect::new(
            col * cell_width,
            row * cell_height,
            cell_width,
            cell_height,
        ));
    }
    rects
}

/// Fit a frame of the given size inside a cell, preserving aspect ratio
/// and centering. Never crops, never stretches anisotropically.
pub fn fit_rect(frame_width: u32, frame_height: u32, cell: Rect) -> Rect {
    if frame_width == 0 || frame_height == 0 || cell.width == 0 || cell.height == 0 {
        return Rect::new(cell.x, cell.y, 0, 0);
    }

    let scale = f64::min(
        cell.width as f64 / frame_width as f64,
        cell.height as f64 / frame_height as f64,
    );
    let draw_width = ((frame_width as f64 * scale) as u32).max(1);
    let draw_height = ((frame_height as f64 * scale) as u32).max(1);

    Rect::new(
        cell.x + (cell.width - draw_width.min(cell.width)) / 2,
        cell.y + (cell.height - draw_height.min(cell.height)) / 2,
        draw_width.min(cell.width),
        draw_height.min(cell.height),
    )
}
