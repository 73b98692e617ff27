//! Compositor worker task.
//!
//! The worker owns the frame slot table and the render surface, and is
//! the only task that touches either. It processes messages strictly in
//! arrival order from one bounded inbound channel; a render pass is
//! synchronous within the task once a frame message starts being
//! handled. Render cadence is arrival-driven: every frame message
//! triggers exactly one pass over the currently populated slots, so the
//! composite rate follows the fastest-arriving source instead of a
//! timer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use weave_frame::{CompositeBitmap, Frame, SourceId};

use crate::layout::compute_layout;
use crate::stats::SharedStats;
use crate::surface::RenderSurface;

/// Messages accepted by the worker, in arrival order.
#[derive(Debug)]
pub(crate) enum WorkerMsg {
    /// Reset the slot table for a new run.
    Start,

    /// A frame transferred in from one source's read task.
    ///
    /// `order` is the source's registration sequence with the composer;
    /// layout slots are assigned by it, never by arrival timing.
    Frame {
        source: SourceId,
        order: u64,
        frame: Frame,
    },

    /// Evict a source's pending frame.
    RemoveSource(SourceId),

    /// Re-align a retained slot with a new registration order.
    ///
    /// Sent on a source hot-swap so a retained source's slot does not
    /// keep its pre-swap position until its next frame arrives.
    Reorder { source: SourceId, order: u64 },

    /// Release everything and exit.
    Stop,
}

/// Latest pending frame for one source.
struct Slot {
    order: u64,
    frame: Frame,
}

/// The isolated render context.
///
/// Owned state is injected at construction (no globals), so multiple
/// compositor instances coexist without cross-talk.
pub(crate) struct CompositorWorker {
    slots: HashMap<SourceId, Slot>,
    surface: RenderSurface,
    composed_tx: mpsc::Sender<CompositeBitmap>,
    stats: Arc<SharedStats>,
}

impl CompositorWorker {
    pub(crate) fn new(
        surface: RenderSurface,
        composed_tx: mpsc::Sender<CompositeBitmap>,
        stats: Arc<SharedStats>,
    ) -> Self {
        Self {
            slots: HashMap::new(),
            surface,
            composed_tx,
            stats,
        }
    }

    /// Message loop. Exits on `Stop`, on inbound channel closure, or
    /// when the composed-bitmap consumer goes away; all pending frames
    /// are released on the way out.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<WorkerMsg>) {
        while let Some(msg) = rx.recv().await {
            match msg {
                WorkerMsg::Start => {
                    // Dropping the old slots releases their frames.
                    self.slots.clear();
                    tracing::debug!("Compositor worker reset");
                }
                WorkerMsg::Frame {
                    source,
                    order,
                    frame,
                } => {
                    self.stats.record_frame_in();
                    if self.slots.insert(source, Slot { order, frame }).is_some() {
                        // Newest frame wins; the superseded one is
                        // released by the insert above.
                        self.stats.record_frame_dropped();
                    }

                    let bitmap = self.render_pass();
                    if self.composed_tx.send(bitmap).await.is_err() {
                        tracing::warn!("Composed frame consumer gone; worker exiting");
                        break;
                    }
                }
                WorkerMsg::RemoveSource(source) => {
                    if self.slots.remove(&source).is_some() {
                        tracing::debug!(source = %source, "Evicted source slot");
                    }
                }
                WorkerMsg::Reorder { source, order } => {
                    // No render here; cadence stays arrival-driven.
                    if let Some(slot) = self.slots.get_mut(&source) {
                        slot.order = order;
                    }
                }
                WorkerMsg::Stop => break,
            }
        }

        self.slots.clear();
        tracing::debug!("Compositor worker stopped");
    }

    /// Draw every populated slot into its layout cell and detach the
    /// result. Slot order is registration order, independent of which
    /// frame arrived last.
    fn render_pass(&mut self) -> CompositeBitmap {
        self.surface.clear();

        let mut entries: Vec<&Slot> = self.slots.values().collect();
        entries.sort_by_key(|slot| slot.order);

        let rects = compute_layout(entries.len(), self.surface.width(), self.surface.height());
        for (slot, rect) in entries.iter().zip(rects) {
            self.surface.draw(&slot.frame, rect);
        }

        self.stats.record_composite_out();
        self.surface.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_frame::FrameLedger;

    const W: u32 = 16;
    const H: u32 = 8;

    struct Harness {
        ledger: Arc<FrameLedger>,
        tx: mpsc::Sender<WorkerMsg>,
        composed: mpsc::Receiver<CompositeBitmap>,
        handle: tokio::task::JoinHandle<()>,
    }

    fn spawn_worker() -> Harness {
        let ledger = FrameLedger::new();
        let (tx, rx) = mpsc::channel(16);
        let (composed_tx, composed) = mpsc::channel(16);
        let worker = CompositorWorker::new(
            RenderSurface::new(ledger.clone(), W, H),
            composed_tx,
            SharedStats::new(),
        );
        let handle = tokio::spawn(worker.run(rx));
        Harness {
            ledger,
            tx,
            composed,
            handle,
        }
    }

    fn probe(bitmap: &CompositeBitmap, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * bitmap.width() as usize + x as usize) * 4;
        let d = bitmap.data();
        [d[idx], d[idx + 1], d[idx + 2], d[idx + 3]]
    }

    fn frame(h: &Harness, source: &str, order: u64, rgba: [u8; 4], w: u32, hh: u32) -> WorkerMsg {
        WorkerMsg::Frame {
            source: SourceId::from(source),
            order,
            frame: Frame::solid(&h.ledger, w, hh, 0, rgba),
        }
    }

    #[tokio::test]
    async fn each_frame_message_triggers_one_render() {
        let mut h = spawn_worker();
        h.tx.send(WorkerMsg::Start).await.unwrap();
        let msg = frame(&h, "camera", 0, [255, 0, 0, 255], W, H);
        h.tx.send(msg).await.unwrap();

        let bitmap = h.composed.recv().await.unwrap();
        assert_eq!(probe(&bitmap, W / 2, H / 2), [255, 0, 0, 255]);

        h.tx.send(WorkerMsg::Stop).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn layout_order_follows_registration_not_arrival() {
        let mut h = spawn_worker();
        h.tx.send(WorkerMsg::Start).await.unwrap();

        // "screen" (order 1) arrives before "camera" (order 0); the
        // composite must still place camera in the left cell.
        let screen = frame(&h, "screen", 1, [0, 0, 255, 255], W / 2, H);
        let camera = frame(&h, "camera", 0, [255, 0, 0, 255], W / 2, H);
        h.tx.send(screen).await.unwrap();
        h.tx.send(camera).await.unwrap();

        let _first = h.composed.recv().await.unwrap();
        let both = h.composed.recv().await.unwrap();
        assert_eq!(probe(&both, W / 4, H / 2), [255, 0, 0, 255]);
        assert_eq!(probe(&both, 3 * W / 4, H / 2), [0, 0, 255, 255]);

        h.tx.send(WorkerMsg::Stop).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn slot_table_keeps_one_frame_per_source() {
        let mut h = spawn_worker();
        h.tx.send(WorkerMsg::Start).await.unwrap();

        for shade in [10u8, 20, 30] {
            let msg = frame(&h, "camera", 0, [shade, 0, 0, 255], W, H);
            h.tx.send(msg).await.unwrap();
        }
        h.tx.send(WorkerMsg::Stop).await.unwrap();

        let mut last = None;
        while let Some(bitmap) = h.composed.recv().await {
            last = Some(probe(&bitmap, W / 2, H / 2));
        }
        h.handle.await.unwrap();

        // Latest frame rendered last; slot replacement released the rest.
        assert_eq!(last, Some([30, 0, 0, 255]));
        assert!(h.ledger.is_balanced());
    }

    #[tokio::test]
    async fn remove_source_returns_layout_to_survivors() {
        let mut h = spawn_worker();
        h.tx.send(WorkerMsg::Start).await.unwrap();

        let camera = frame(&h, "camera", 0, [255, 0, 0, 255], W / 2, H);
        let screen = frame(&h, "screen", 1, [0, 0, 255, 255], W / 2, H);
        h.tx.send(camera).await.unwrap();
        h.tx.send(screen).await.unwrap();
        let _ = h.composed.recv().await.unwrap();
        let _ = h.composed.recv().await.unwrap();

        h.tx.send(WorkerMsg::RemoveSource(SourceId::from("camera")))
            .await
            .unwrap();
        let screen_again = frame(&h, "screen", 1, [0, 0, 255, 255], W, H);
        h.tx.send(screen_again).await.unwrap();

        let solo = h.composed.recv().await.unwrap();
        // Screen alone now covers the full canvas.
        assert_eq!(probe(&solo, W / 4, H / 2), [0, 0, 255, 255]);
        assert_eq!(probe(&solo, 3 * W / 4, H / 2), [0, 0, 255, 255]);

        h.tx.send(WorkerMsg::Stop).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn reorder_realigns_a_retained_slot() {
        let mut h = spawn_worker();
        h.tx.send(WorkerMsg::Start).await.unwrap();

        let camera = frame(&h, "camera", 0, [255, 0, 0, 255], W / 2, H);
        let screen = frame(&h, "screen", 1, [0, 0, 255, 255], W / 2, H);
        h.tx.send(camera).await.unwrap();
        h.tx.send(screen).await.unwrap();
        let _ = h.composed.recv().await.unwrap();
        let _ = h.composed.recv().await.unwrap();

        // A hot-swap re-registers both sources with screen first; the
        // retained slots must move before either source produces again.
        h.tx.send(WorkerMsg::Reorder {
            source: SourceId::from("screen"),
            order: 2,
        })
        .await
        .unwrap();
        h.tx.send(WorkerMsg::Reorder {
            source: SourceId::from("camera"),
            order: 3,
        })
        .await
        .unwrap();

        let camera_again = frame(&h, "camera", 3, [255, 0, 0, 255], W / 2, H);
        h.tx.send(camera_again).await.unwrap();

        let swapped = h.composed.recv().await.unwrap();
        assert_eq!(probe(&swapped, W / 4, H / 2), [0, 0, 255, 255]);
        assert_eq!(probe(&swapped, 3 * W / 4, H / 2), [255, 0, 0, 255]);

        h.tx.send(WorkerMsg::Stop).await.unwrap();
        h.handle.await.unwrap();
    }

    #[tokio::test]
    async fn stop_releases_every_pending_frame() {
        let mut h = spawn_worker();
        h.tx.send(WorkerMsg::Start).await.unwrap();
        for (i, source) in ["a", "b", "c"].iter().enumerate() {
            let msg = frame(&h, source, i as u64, [1, 2, 3, 255], W, H);
            h.tx.send(msg).await.unwrap();
        }
        h.tx.send(WorkerMsg::Stop).await.unwrap();
        h.handle.await.unwrap();

        // Drain and drop composed bitmaps, then everything is released.
        while h.composed.try_recv().is_ok() {}
        drop(h.composed);
        assert!(h.ledger.is_balanced());
    }
}
