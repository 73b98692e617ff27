//! Run a compositing pipeline over synthetic sources.

use std::time::Duration;

use weave_common::PipelineConfig;
use weave_compositor::{Composer, FrameSource, TestPatternSource};

pub async fn run(
    sources: usize,
    fps: u32,
    duration: u64,
    width: u32,
    height: u32,
) -> anyhow::Result<()> {
    anyhow::ensure!(
        (1..=6).contains(&sources),
        "source count must be between 1 and 6"
    );

    println!("Compositing {sources} synthetic sources");
    println!("  Canvas: {width}x{height}");
    println!("  Source FPS: {fps}");
    if duration > 0 {
        println!("  Duration: {duration}s");
    } else {
        println!("  Duration: until Ctrl+C");
    }
    println!();

    let mut config = PipelineConfig::default();
    config.canvas.width = width;
    config.canvas.height = height;

    let mut composer = Composer::new(Vec::new(), config)?;
    let ledger = composer.ledger();

    let inputs: Vec<Box<dyn FrameSource>> = (0..sources)
        .map(|i| {
            // Source frames at varied sizes so the aspect fit shows.
            let (w, h) = if i % 2 == 0 { (640, 360) } else { (480, 480) };
            Box::new(TestPatternSource::new(
                format!("pattern-{i}"),
                ledger.clone(),
                w,
                h,
                fps,
            )) as Box<dyn FrameSource>
        })
        .collect();
    composer.change_sources(inputs).await?;

    // Stand in for the external recorder: drain the composite stream
    // and count what an encoder would have received.
    let mut output = composer
        .take_output()
        .ok_or_else(|| anyhow::anyhow!("composite output already taken"))?;
    let consumer = tokio::spawn(async move {
        let mut received: u64 = 0;
        let mut last_ts = 0u64;
        while let Ok(Some(frame)) = output.next_frame().await {
            received += 1;
            last_ts = frame.timestamp_us();
        }
        (received, last_ts)
    });

    composer.start().await?;

    if duration > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(duration)) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("Interrupted");
            }
        }
    } else {
        println!("Press Ctrl+C to stop...");
        tokio::signal::ctrl_c().await?;
    }

    let elapsed = composer.elapsed_secs();
    composer.stop().await?;
    let (received, last_ts) = consumer.await?;
    let stats = composer.stats();

    println!();
    println!("Run complete after {elapsed:.1}s");
    println!("  Frames in:        {}", stats.frames_in);
    println!("  Composites out:   {}", stats.composites_out);
    println!("  Superseded:       {} ({:.1}%)", stats.frames_dropped, stats.drop_rate());
    println!("  Consumer received {received} frames, last timestamp {last_ts}us");

    if !ledger.is_balanced() {
        tracing::warn!(
            frames = ledger.outstanding_frames(),
            bitmaps = ledger.outstanding_bitmaps(),
            "Outstanding resources after stop"
        );
    }

    Ok(())
}
