//! Frame sink and the synthetic source it republishes.
//!
//! The composer writes composite frames into a [`FrameSink`]; the
//! paired [`SyntheticSource`] re-exposes them as a readable video
//! source, so an external recorder/encoder consumes the composite
//! exactly the way the composer consumes its inputs. The sink
//! guarantees only delivery order, strictly increasing timestamps
//! (stamped upstream) and correct dimensions; encoding and container
//! muxing stay external.

use async_trait::async_trait;
use tokio::sync::mpsc;
use weave_common::{WeaveError, WeaveResult};
use weave_frame::{Frame, SourceId};

use crate::source::FrameSource;

/// Write half: accepts composite frames from the composer.
pub struct FrameSink {
    id: SourceId,
    tx: mpsc::Sender<Frame>,
}

impl FrameSink {
    /// Write one composite frame, waiting if the consumer is behind.
    ///
    /// Fails when the consumer has dropped the synthetic source; that
    /// is a fatal pipeline error for the caller to surface. The frame
    /// is released either way.
    pub async fn write(&self, frame: Frame) -> WeaveResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| WeaveError::sink(format!("consumer of {} is gone", self.id)))
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// Close the sink; the synthetic source observes end of stream
    /// after draining.
    pub fn close(self) {}
}

/// Read half: the composite stream, republished as a video source.
pub struct SyntheticSource {
    id: SourceId,
    rx: mpsc::Receiver<Frame>,
    ended: bool,
}

#[async_trait]
impl FrameSource for SyntheticSource {
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
        while self.rx.try_recv().is_ok() {}
    }
}

/// Create a connected sink / synthetic source pair.
pub fn sink_pair(id: impl Into<SourceId>, capacity: usize) -> (FrameSink, SyntheticSource) {
    let id = id.into();
    let (tx, rx) = mpsc::channel(capacity);
    (
        FrameSink { id: id.clone(), tx },
        SyntheticSource {
            id,
            rx,
            ended: false,
        },
    )
}
