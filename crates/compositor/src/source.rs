//! Frame source adapters.
//!
//! A [`FrameSource`] wraps one live track as a pull-based frame
//! sequence. `next_frame` suspends the calling task, never the runtime;
//! `&mut self` makes a second in-flight read on the same adapter
//! unrepresentable. `None` means end of stream and is terminal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use weave_common::{WeaveError, WeaveResult};
use weave_frame::{Frame, FrameLedger, SourceId};

/// A pull-based sequence of frames from one live source.
#[async_trait]
pub trait FrameSource: Send {
    /// Stable identifier of this source.
    fn id(&self) -> &SourceId;

    /// Wait for and take ownership of the next frame.
    ///
    /// `Ok(None)` signals end of stream; every subsequent call must
    /// also return `Ok(None)`.
    async fn next_frame(&mut self) -> WeaveResult<Option<Frame>>;

    /// Release the underlying track connection.
    ///
    /// Buffered frames are dropped and any later read resolves as end
    /// of stream.
    async fn close(&mut self);
}

/// Producer half of a live track: the external capture side pushes
/// frames through this handle.
#[derive(Clone)]
pub struct TrackHandle {
    id: SourceId,
    tx: mpsc::Sender<Frame>,
}

impl TrackHandle {
    /// Push one frame into the track, waiting if the consumer is behind.
    ///
    /// Fails once the consuming adapter has been closed; the frame is
    /// released either way.
    pub async fn push(&self, frame: Frame) -> WeaveResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| WeaveError::source(format!("track {} is closed", self.id)))
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }
}

/// Consumer half of a live track, ready to be wrapped by a
/// [`TrackAdapter`] and handed to the composer.
pub struct VideoTrack {
    id: SourceId,
    rx: mpsc::Receiver<Frame>,
}

impl VideoTrack {
    pub fn id(&self) -> &SourceId {
        &self.id
    }
}

/// Create a live track: a producer handle and the consumable track.
pub fn video_track(id: impl Into<SourceId>, capacity: usize) -> (TrackHandle, VideoTrack) {
    let id = id.into();
    let (tx, rx) = mpsc::channel(capacity);
    (
        TrackHandle { id: id.clone(), tx },
        VideoTrack { id, rx },
    )
}

/// Adapter over a [`VideoTrack`].
pub struct TrackAdapter {
    id: SourceId,
    rx: mpsc::Receiver<Frame>,
    ended: bool,
}

impl TrackAdapter {
    pub fn new(track: VideoTrack) -> Self {
        Self {
            id: track.id,
            rx: track.rx,
            ended: false,
        }
    }
}

#[async_trait]
impl FrameSource for TrackAdapter {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn next_frame(&mut self) -> WeaveResult<Option<Frame>> {
        if self.ended {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(frame) => Ok(Some(frame)),
            None => {
                self.ended = true;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.ended = true;
        self.rx.close();
        // Drop anything the producer managed to queue before close.
        while self.rx.try_recv().is_ok() {}
    }
}

/// Synthetic paced source producing solid-color frames.
///
/// Used by the demo CLI and by tests that need a live-looking source
/// without any capture device.
pub struct TestPatternSource {
    id: SourceId,
    ledger: Arc<FrameLedger>,
    width: u32,
    height: u32,
    color: [u8; 4],
    interval_us: u64,
    interval: Option<tokio::time::Interval>,
    remaining: Option<u64>,
    produced: u64,
    ended: bool,
}

impl TestPatternSource {
    pub fn new(
        id: impl Into<String>,
        ledger: Arc<FrameLedger>,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Self {
        let id = SourceId::new(id);
        let color = color_for(&id);
        Self {
            id,
            ledger,
            width,
            height,
            color,
            interval_us: 1_000_000 / fps.max(1) as u64,
            interval: None,
            remaining: None,
            produced: 0,
            ended: false,
        }
    }

    /// Override the derived pattern color.
    pub fn with_color(mut self, rgba: [u8; 4]) -> Self {
        self.color = rgba;
        self
    }

    /// End the stream after producing this many frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }
}

#[async_trait]
impl FrameSource for TestPatternSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn next_frame(&mut self) -> WeaveResult<Option<Frame>> {
        if self.ended || self.remaining == Some(0) {
            self.ended = true;
            return Ok(None);
        }

        // Lazily created so the pacing starts at first read, not at
        // construction time.
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(Duration::from_micros(self.interval_us));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;

        if let Some(remaining) = &mut self.remaining {
            *remaining -= 1;
        }
        let timestamp_us = self.produced * self.interval_us;
        self.produced += 1;

        Ok(Some(Frame::solid(
            &self.ledger,
            self.width,
            self.height,
            timestamp_us,
            self.color,
        )))
    }

    async fn close(&mut self) {
        self.ended = true;
    }
}

/// Derive a stable, distinguishable color from a source id.
fn color_for(id: &SourceId) -> [u8; 4] {
    let mut hash: u32 = 2166136261;
    for byte in id.as_str().bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    [
        (hash >> 16) as u8 | 0x40,
        (hash >> 8) as u8 | 0x40,
        hash as u8 | 0x40,
        255,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn track_adapter_delivers_in_order_then_ends() {
        let ledger = FrameLedger::new();
        let (handle, track) = video_track(SourceId::from("camera"), 4);
        let mut adapter = TrackAdapter::new(track);

        handle
            .push(Frame::solid(&ledger, 2, 2, 10, [1, 1, 1, 255]))
            .await
            .unwrap();
        handle
            .push(Frame::solid(&ledger, 2, 2, 20, [2, 2, 2, 255]))
            .await
            .unwrap();

        let first = adapter.next_frame().await.unwrap().unwrap();
        let second = adapter.next_frame().await.unwrap().unwrap();
        assert_eq!(first.timestamp_us(), 10);
        assert_eq!(second.timestamp_us(), 20);

        drop(handle);
        assert!(adapter.next_frame().await.unwrap().is_none());
        // End of stream is terminal.
        assert!(adapter.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn closing_adapter_releases_buffered_frames() {
        let ledger = FrameLedger::new();
        let (handle, track) = video_track(SourceId::from("screen"), 4);
        let mut adapter = TrackAdapter::new(track);

        handle
            .push(Frame::solid(&ledger, 2, 2, 0, [9, 9, 9, 255]))
            .await
            .unwrap();
        assert_eq!(ledger.outstanding_frames(), 1);

        adapter.close().await;
        assert!(ledger.is_balanced());
        assert!(adapter.next_frame().await.unwrap().is_none());

        // Producer now fails and its frame is still released.
        let err = handle
            .push(Frame::solid(&ledger, 2, 2, 1, [9, 9, 9, 255]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
        assert!(ledger.is_balanced());
    }

    #[tokio::test]
    async fn test_pattern_source_stamps_and_honors_limit() {
        let ledger = FrameLedger::new();
        let mut source = TestPatternSource::new("pattern", ledger.clone(), 4, 4, 1000)
            .with_color([7, 7, 7, 255])
            .with_frame_limit(3);

        for i in 0..3u64 {
            let frame = source.next_frame().await.unwrap().unwrap();
            assert_eq!(frame.timestamp_us(), i * 1_000);
            assert_eq!(frame.rgba_at(0, 0), [7, 7, 7, 255]);
        }
        assert!(source.next_frame().await.unwrap().is_none());
        // Terminal after the limit.
        assert!(source.next_frame().await.unwrap().is_none());
        assert!(ledger.is_balanced());
    }

    #[test]
    fn pattern_colors_differ_per_source() {
        assert_ne!(
            color_for(&SourceId::from("camera")),
            color_for(&SourceId::from("screen"))
        );
    }
}
