//! Clock and timestamp utilities for the composite output stream.
//!
//! Output frames are stamped from a monotonic clock epoch recorded when
//! the pipeline starts, never from any input frame's capture timestamp.
//! Input sources arrive with independent jitter; the output stream must
//! still carry strictly increasing timestamps, so stamping goes through
//! [`TimestampGen`] which enforces monotonicity even when two composites
//! land within the clock's resolution.

use std::time::Instant;

/// A pipeline clock anchored to the moment the pipeline started.
#[derive(Debug, Clone)]
pub struct PipelineClock {
    /// The instant the pipeline started.
    epoch: Instant,

    /// Wall-clock time at epoch (ISO 8601 string).
    epoch_wall: String,
}

impl PipelineClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Microseconds elapsed since pipeline start.
    pub fn elapsed_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }

    /// Seconds elapsed since pipeline start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at pipeline start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// The underlying epoch instant.
    pub fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Convert an elapsed microsecond value to seconds.
    pub fn us_to_secs(us: u64) -> f64 {
        us as f64 / 1_000_000.0
    }

    /// Convert seconds to microseconds.
    pub fn secs_to_us(secs: f64) -> u64 {
        (secs * 1_000_000.0) as u64
    }
}

/// Issues strictly increasing output timestamps from a pipeline clock.
///
/// Two composites produced back-to-back can read the same elapsed
/// microsecond; the generator bumps the second one so downstream
/// consumers always observe a strictly increasing sequence.
#[derive(Debug)]
pub struct TimestampGen {
    clock: PipelineClock,
    last_us: Option<u64>,
}

impl TimestampGen {
    /// Create a generator over the given clock.
    pub fn new(clock: PipelineClock) -> Self {
        Self {
            clock,
            last_us: None,
        }
    }

    /// Next output timestamp in microseconds, strictly greater than any
    /// previously issued value.
    pub fn next_us(&mut self) -> u64 {
        let now = self.clock.elapsed_us();
        let ts = match self.last_us {
            Some(last) if now <= last => last + 1,
            _ => now,
        };
        self.last_us = Some(ts);
        ts
    }

    /// The clock this generator stamps from.
    pub fn clock(&self) -> &PipelineClock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = PipelineClock::start();
        // Should be very small but non-negative
        assert!(clock.elapsed_us() < 1_000_000); // less than 1 second
    }

    #[test]
    fn test_us_to_secs_conversion() {
        assert!((PipelineClock::us_to_secs(1_500_000) - 1.5).abs() < 1e-9);
        assert_eq!(PipelineClock::secs_to_us(2.0), 2_000_000);
    }

    #[test]
    fn test_timestamps_strictly_increase_under_jitter() {
        let mut gen = TimestampGen::new(PipelineClock::start());
        let mut last = gen.next_us();
        // Calling faster than microsecond resolution must still produce
        // strictly increasing values.
        for _ in 0..10_000 {
            let ts = gen.next_us();
            assert!(ts > last, "timestamp {ts} not greater than {last}");
            last = ts;
        }
    }

    #[test]
    fn test_timestamps_track_wall_clock() {
        let mut gen = TimestampGen::new(PipelineClock::start());
        let first = gen.next_us();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = gen.next_us();
        assert!(second >= first + 4_000);
    }
}
