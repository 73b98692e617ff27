//! Print the layout table for a source count.

use weave_compositor::compute_layout;

pub fn run(count: usize, width: u32, height: u32) -> anyhow::Result<()> {
    anyhow::ensure!(count <= 6, "at most 6 sources are supported");

    let rects = compute_layout(count, width, height);
    println!("Layout for {count} source(s) on {width}x{height}:");
    if rects.is_empty() {
        println!("  (nothing drawn)");
        return Ok(());
    }

    for (i, rect) in rects.iter().enumerate() {
        println!(
            "  slot {i}: {}x{} at ({}, {})",
            rect.width, rect.height, rect.x, rect.y
        );
    }
    Ok(())
}
