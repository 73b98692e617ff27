//! Runtime statistics for a pipeline run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Frames accepted from input sources.
    pub frames_in: u64,

    /// Frames dropped by newest-frame-wins slot replacement.
    pub frames_dropped: u64,

    /// Composite frames written to the sink.
    pub composites_out: u64,
}

impl PipelineStats {
    /// Drop rate as a percentage of accepted frames.
    pub fn drop_rate(&self) -> f64 {
        if self.frames_in == 0 {
            return 0.0;
        }
        self.frames_dropped as f64 / self.frames_in as f64 * 100.0
    }
}

/// Live counters shared between the pipeline tasks.
#[derive(Debug, Default)]
pub(crate) struct SharedStats {
    frames_in: AtomicU64,
    frames_dropped: AtomicU64,
    composites_out: AtomicU64,
}

impl SharedStats {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn record_frame_in(&self) {
        self.frames_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_composite_out(&self) {
        self.composites_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_in: self.frames_in.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            composites_out: self.composites_out.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_rate_handles_empty_run() {
        assert_eq!(PipelineStats::default().drop_rate(), 0.0);
    }

    #[test]
    fn drop_rate_is_percentage_of_input() {
        let stats = PipelineStats {
            frames_in: 200,
            frames_dropped: 50,
            composites_out: 150,
        };
        assert!((stats.drop_rate() - 25.0).abs() < 1e-9);
    }
}
