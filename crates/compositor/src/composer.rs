//! Pipeline orchestration.
//!
//! The [`Composer`] owns the active source set, the worker task handle,
//! and the output sink. It spawns one cancellable read task per source
//! so a fast source is never held back waiting on a slow one, relays
//! composed bitmaps into timestamped output frames, and keeps the
//! output flowing across source hot-swaps.

use std::collections::HashSet;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use weave_common::{PipelineClock, PipelineConfig, TimestampGen, WeaveError, WeaveResult};
use weave_frame::{FrameLedger, SourceId};

use crate::sink::{sink_pair, SyntheticSource};
use crate::source::{FrameSource, TrackAdapter, VideoTrack};
use crate::stats::{PipelineStats, SharedStats};
use crate::surface::RenderSurface;
use crate::worker::{CompositorWorker, WorkerMsg};

use std::sync::Arc;

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No read loop active.
    Idle,
    /// Read loop active, sink open.
    Running,
}

/// One active source's read task.
struct SourceHandle {
    id: SourceId,
    order: u64,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Orchestrator for one compositing pipeline.
///
/// Construction opens the worker context and the sink pair; `start`
/// begins the read loop; `change_sources` hot-swaps inputs without
/// interrupting output; `stop` tears everything down and surfaces the
/// first fatal fault, if any, exactly once. A composer is single-shot:
/// once stopped it cannot be restarted.
pub struct Composer {
    state: PipelineState,
    config: PipelineConfig,
    ledger: Arc<FrameLedger>,
    stats: Arc<SharedStats>,

    worker_tx: mpsc::Sender<WorkerMsg>,
    worker_handle: Option<JoinHandle<()>>,
    composed_rx: Option<mpsc::Receiver<weave_frame::CompositeBitmap>>,
    relay_handle: Option<JoinHandle<()>>,
    relay_cancel: Option<watch::Sender<bool>>,

    sink: Option<crate::sink::FrameSink>,
    output: Option<SyntheticSource>,

    staged: Vec<Box<dyn FrameSource>>,
    sources: Vec<SourceHandle>,
    next_order: u64,

    clock: Option<PipelineClock>,
    fault_tx: mpsc::Sender<WeaveError>,
    fault_rx: mpsc::Receiver<WeaveError>,
    shut_down: bool,
}

impl Composer {
    /// Build a composer over the given sources.
    ///
    /// Spawns the worker context and allocates the sink pair; the read
    /// loop does not run until [`Composer::start`]. Fails if two
    /// sources share an identifier.
    pub fn new(sources: Vec<Box<dyn FrameSource>>, config: PipelineConfig) -> WeaveResult<Self> {
        check_unique_ids(sources.iter().map(|s| s.id()))?;

        let ledger = FrameLedger::new();
        let stats = SharedStats::new();

        let (worker_tx, worker_rx) = mpsc::channel(config.channels.worker_queue);
        let (composed_tx, composed_rx) = mpsc::channel(config.channels.composed_queue);
        let surface =
            RenderSurface::new(ledger.clone(), config.canvas.width, config.canvas.height);
        let worker = CompositorWorker::new(surface, composed_tx, stats.clone());
        let worker_handle = tokio::spawn(worker.run(worker_rx));

        let (sink, output) = sink_pair(SourceId::from("composite"), config.channels.sink_queue);
        let (fault_tx, fault_rx) = mpsc::channel(4);

        tracing::debug!(
            canvas_width = config.canvas.width,
            canvas_height = config.canvas.height,
            sources = sources.len(),
            "Composer constructed"
        );

        Ok(Self {
            state: PipelineState::Idle,
            config,
            ledger,
            stats,
            worker_tx,
            worker_handle: Some(worker_handle),
            composed_rx: Some(composed_rx),
            relay_handle: None,
            relay_cancel: None,
            sink: Some(sink),
            output: Some(output),
            staged: sources,
            sources: Vec::new(),
            next_order: 0,
            clock: None,
            fault_tx,
            fault_rx,
            shut_down: false,
        })
    }

    /// Build a composer directly over live tracks, one adapter each.
    pub fn from_tracks(tracks: Vec<VideoTrack>, config: PipelineConfig) -> WeaveResult<Self> {
        let sources = tracks
            .into_iter()
            .map(|t| Box::new(TrackAdapter::new(t)) as Box<dyn FrameSource>)
            .collect();
        Self::new(sources, config)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The ledger frames for this pipeline should be created against.
    pub fn ledger(&self) -> Arc<FrameLedger> {
        self.ledger.clone()
    }

    /// Snapshot of the run counters.
    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    /// Seconds since `start`, or 0 when idle.
    pub fn elapsed_secs(&self) -> f64 {
        self.clock.as_ref().map(|c| c.elapsed_secs()).unwrap_or(0.0)
    }

    /// Take the synthetic output source for the external consumer.
    ///
    /// Available from construction so a recorder can subscribe before
    /// the first composite. Returns `None` if already taken.
    pub fn take_output(&mut self) -> Option<SyntheticSource> {
        self.output.take()
    }

    /// First recorded fatal fault, if any, without stopping.
    pub fn take_fault(&mut self) -> Option<WeaveError> {
        self.fault_rx.try_recv().ok()
    }

    /// Transition `Idle -> Running`: reset the worker, start the
    /// composed-frame relay, and spawn one read task per source.
    pub async fn start(&mut self) -> WeaveResult<()> {
        if self.state == PipelineState::Running {
            return Err(WeaveError::unsupported("pipeline already running"));
        }
        if self.shut_down {
            return Err(WeaveError::unsupported("pipeline already shut down"));
        }

        let clock = PipelineClock::start();
        tracing::info!(epoch_wall = %clock.epoch_wall(), "Starting compositing pipeline");

        self.worker_tx
            .send(WorkerMsg::Start)
            .await
            .map_err(|_| WeaveError::render("compositor worker is unreachable"))?;

        // Relay: stamp each composed bitmap with a strictly increasing
        // wall-clock timestamp and hand it to the sink. Exits when the
        // worker closes the composed channel, when the sink consumer
        // goes away, or on cancellation from stop(); dropping the sink
        // on exit finalizes the output stream, and dropping the
        // composed receiver unblocks a worker stuck on a full queue.
        let mut composed_rx = self
            .composed_rx
            .take()
            .ok_or_else(|| WeaveError::render("composed channel already consumed"))?;
        let sink = self
            .sink
            .take()
            .ok_or_else(|| WeaveError::sink("sink already consumed"))?;
        let mut timestamps = TimestampGen::new(clock.clone());
        let ledger = self.ledger.clone();
        let fault_tx = self.fault_tx.clone();
        let (relay_cancel, mut relay_cancelled) = watch::channel(false);
        self.relay_handle = Some(tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = relay_cancelled.changed() => break,
                    next = composed_rx.recv() => match next {
                        Some(bitmap) => bitmap.into_output_frame(&ledger, timestamps.next_us()),
                        None => break,
                    },
                };
                // The sink can sit full behind a stalled consumer; the
                // write must stay cancellable so stop() settles.
                tokio::select! {
                    _ = relay_cancelled.changed() => break,
                    written = sink.write(frame) => {
                        if let Err(e) = written {
                            tracing::error!(error = %e, "Sink write failed; tearing down");
                            let _ = fault_tx.try_send(e);
                            break;
                        }
                    }
                }
            }
            tracing::debug!("Composed frame relay stopped");
        }));
        self.relay_cancel = Some(relay_cancel);

        for source in std::mem::take(&mut self.staged) {
            let handle = self.spawn_read_task(source);
            self.sources.push(handle);
        }

        self.clock = Some(clock);
        self.state = PipelineState::Running;
        tracing::info!(sources = self.sources.len(), "Pipeline running");
        Ok(())
    }

    /// Atomically replace the active source set.
    ///
    /// Old read tasks are cancelled and joined (their in-flight reads
    /// settle, nothing leaks), the worker evicts ids that disappeared,
    /// and new read tasks start with fresh registration order. The
    /// read loop, worker, and sink keep running throughout, so the
    /// output stream continues without a gap.
    pub async fn change_sources(
        &mut self,
        sources: Vec<Box<dyn FrameSource>>,
    ) -> WeaveResult<()> {
        check_unique_ids(sources.iter().map(|s| s.id()))?;

        if self.state == PipelineState::Idle {
            self.staged = sources;
            return Ok(());
        }

        let new_ids: HashSet<SourceId> = sources.iter().map(|s| s.id().clone()).collect();
        let old_handles = std::mem::take(&mut self.sources);
        let mut evicted = Vec::new();

        for handle in old_handles {
            let _ = handle.cancel.send(true);
            if let Err(e) = handle.task.await {
                tracing::warn!(source = %handle.id, error = %e, "Read task join failed");
            }
            if !new_ids.contains(&handle.id) {
                evicted.push(handle.id);
            }
        }

        // Eviction goes through the same ordered queue as frames, so a
        // removed source's last queued frames land before the eviction.
        for id in &evicted {
            let _ = self.worker_tx.send(WorkerMsg::RemoveSource(id.clone())).await;
        }

        let added: Vec<SourceId> = sources.iter().map(|s| s.id().clone()).collect();
        for source in sources {
            let handle = self.spawn_read_task(source);
            // A retained id keeps its pending frame across the swap;
            // re-align its slot with the new registration order now
            // instead of waiting for the source's next frame. For a
            // fresh id there is no slot yet and this is a no-op.
            let _ = self
                .worker_tx
                .send(WorkerMsg::Reorder {
                    source: handle.id.clone(),
                    order: handle.order,
                })
                .await;
            self.sources.push(handle);
        }

        tracing::info!(
            evicted = ?evicted.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            active = ?added.iter().map(|id| id.as_str()).collect::<Vec<_>>(),
            "Source set replaced"
        );
        Ok(())
    }

    /// Replace the active source set with adapters over live tracks.
    pub async fn change_tracks(&mut self, tracks: Vec<VideoTrack>) -> WeaveResult<()> {
        let sources = tracks
            .into_iter()
            .map(|t| Box::new(TrackAdapter::new(t)) as Box<dyn FrameSource>)
            .collect();
        self.change_sources(sources).await
    }

    /// Transition `Running -> Idle`: cancel every read task, stop and
    /// join the worker, finalize the sink, release all pending frames.
    ///
    /// Returns the first fatal fault recorded during the run, if any.
    /// Teardown is bounded even when the external consumer never drains
    /// the synthetic source: every send along the pipeline chain is
    /// cancellable, and the relay goes down before the worker so the
    /// chain unblocks from the downstream end.
    pub async fn stop(&mut self) -> WeaveResult<()> {
        if self.state != PipelineState::Running {
            return Err(WeaveError::unsupported("pipeline not running"));
        }

        tracing::info!("Stopping compositing pipeline");

        for handle in std::mem::take(&mut self.sources) {
            let _ = handle.cancel.send(true);
            if let Err(e) = handle.task.await {
                tracing::warn!(source = %handle.id, error = %e, "Read task join failed");
            }
        }

        // Cancelling the relay drops the composed receiver and the
        // sink, so a worker blocked on a full composed queue settles,
        // and the output stream finalizes even if its consumer stalled.
        if let Some(cancel) = self.relay_cancel.take() {
            let _ = cancel.send(true);
        }
        if let Some(handle) = self.relay_handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Relay task join failed");
            }
        }

        // With the relay gone this send either reaches the worker or
        // fails fast once the worker observes the closed composed
        // channel and exits; it cannot block indefinitely.
        let _ = self.worker_tx.send(WorkerMsg::Stop).await;
        let mut worker_fault = None;
        if let Some(handle) = self.worker_handle.take() {
            if let Err(e) = handle.await {
                worker_fault = Some(WeaveError::render(format!("worker task failed: {e}")));
            }
        }

        let elapsed = self.elapsed_secs();
        self.state = PipelineState::Idle;
        self.shut_down = true;
        self.clock = None;

        let stats = self.stats.snapshot();
        tracing::info!(
            duration_secs = elapsed,
            frames_in = stats.frames_in,
            composites_out = stats.composites_out,
            drop_rate = stats.drop_rate(),
            "Pipeline stopped"
        );

        // Surface the first fatal fault exactly once.
        if let Some(fault) = self.fault_rx.try_recv().ok().or(worker_fault) {
            return Err(fault);
        }
        Ok(())
    }

    /// Spawn the cancellable read loop for one source.
    ///
    /// The task suspends only at `next_frame` and at the worker send,
    /// and both stay cancellable, so teardown latency is bounded even
    /// when the worker queue sits full behind a stalled consumer. End
    /// of stream or a non-fatal source error evicts just this source;
    /// a fatal source error or a dead worker records a pipeline fault.
    fn spawn_read_task(&mut self, mut source: Box<dyn FrameSource>) -> SourceHandle {
        let order = self.next_order;
        self.next_order += 1;

        let id = source.id().clone();
        let (cancel, mut cancelled) = watch::channel(false);
        let worker_tx = self.worker_tx.clone();
        let fault_tx = self.fault_tx.clone();

        let task_id = id.clone();
        let task = tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = cancelled.changed() => break,
                    read = source.next_frame() => match read {
                        Ok(Some(frame)) => WorkerMsg::Frame {
                            source: task_id.clone(),
                            order,
                            frame,
                        },
                        Ok(None) => {
                            tracing::info!(source = %task_id, "Source ended");
                            WorkerMsg::RemoveSource(task_id.clone())
                        }
                        Err(e) if e.is_fatal() => {
                            tracing::error!(source = %task_id, error = %e, "Source failed fatally");
                            let _ = fault_tx.try_send(e);
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(source = %task_id, error = %e, "Source failed; evicting");
                            WorkerMsg::RemoveSource(task_id.clone())
                        }
                    },
                };
                let terminal = matches!(&msg, WorkerMsg::RemoveSource(_));

                tokio::select! {
                    _ = cancelled.changed() => break,
                    sent = worker_tx.send(msg) => {
                        if sent.is_err() {
                            let _ = fault_tx.try_send(WeaveError::render(
                                "compositor worker is unreachable",
                            ));
                            break;
                        }
                    }
                }
                if terminal {
                    break;
                }
            }
            source.close().await;
        });

        tracing::debug!(source = %id, order, "Read task started");
        SourceHandle {
            id,
            order,
            cancel,
            task,
        }
    }

    /// Canvas dimensions this composer renders at.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.config.canvas.width, self.config.canvas.height)
    }

    #[cfg(test)]
    pub(crate) fn abort_worker(&self) {
        if let Some(handle) = &self.worker_handle {
            handle.abort();
        }
    }
}

fn check_unique_ids<'a>(ids: impl Iterator<Item = &'a SourceId>) -> WeaveResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.clone()) {
            return Err(WeaveError::config(format!("duplicate source id: {id}")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::TestPatternSource;
    use std::time::Duration;
    use weave_frame::Frame;

    fn test_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.canvas.width = 64;
        config.canvas.height = 32;
        config
    }

    /// Yields one error, then end of stream.
    struct FailingSource {
        id: SourceId,
        error: Option<WeaveError>,
    }

    impl FailingSource {
        fn new(id: &str, error: WeaveError) -> Box<dyn FrameSource> {
            Box::new(Self {
                id: SourceId::from(id),
                error: Some(error),
            })
        }
    }

    #[async_trait::async_trait]
    impl FrameSource for FailingSource {
        fn id(&self) -> &SourceId {
            &self.id
        }

        async fn next_frame(&mut self) -> WeaveResult<Option<Frame>> {
            match self.error.take() {
                Some(e) => Err(e),
                None => Ok(None),
            }
        }

        async fn close(&mut self) {}
    }

    async fn wait_for_fault(composer: &mut Composer) -> Option<WeaveError> {
        let mut waited = Duration::ZERO;
        while waited < Duration::from_secs(2) {
            if let Some(fault) = composer.take_fault() {
                return Some(fault);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }
        None
    }

    #[tokio::test]
    async fn start_is_rejected_while_running() {
        let mut composer = Composer::new(Vec::new(), test_config()).unwrap();
        composer.start().await.unwrap();
        assert_eq!(composer.state(), PipelineState::Running);
        assert!(composer.start().await.is_err());
        composer.stop().await.unwrap();
        assert_eq!(composer.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn stop_requires_running() {
        let mut composer = Composer::new(Vec::new(), test_config()).unwrap();
        assert!(composer.stop().await.is_err());
    }

    #[tokio::test]
    async fn composer_is_single_shot() {
        let mut composer = Composer::new(Vec::new(), test_config()).unwrap();
        composer.start().await.unwrap();
        composer.stop().await.unwrap();
        let err = composer.start().await.unwrap_err();
        assert!(err.to_string().contains("shut down"));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let ledger = FrameLedger::new();
        let sources: Vec<Box<dyn FrameSource>> = vec![
            Box::new(TestPatternSource::new("camera", ledger.clone(), 8, 8, 30)),
            Box::new(TestPatternSource::new("camera", ledger.clone(), 8, 8, 30)),
        ];
        assert!(matches!(
            Composer::new(sources, test_config()),
            Err(WeaveError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn fatal_source_error_records_a_pipeline_fault() {
        let source = FailingSource::new("camera", WeaveError::render("gpu context lost"));
        let mut composer = Composer::new(vec![source], test_config()).unwrap();
        let _output = composer.take_output().unwrap();
        composer.start().await.unwrap();

        let fault = wait_for_fault(&mut composer).await.expect("fault recorded");
        assert!(matches!(fault, WeaveError::Render { .. }));

        // The fault was already consumed, so stop itself succeeds.
        composer.stop().await.unwrap();
        assert_eq!(composer.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn non_fatal_source_error_only_evicts() {
        let source = FailingSource::new("camera", WeaveError::source("device unplugged"));
        let mut composer = Composer::new(vec![source], test_config()).unwrap();
        let _output = composer.take_output().unwrap();
        composer.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(composer.take_fault().is_none());
        composer.stop().await.unwrap();
    }

    #[tokio::test]
    async fn dead_worker_is_a_fatal_fault() {
        let mut composer = Composer::new(Vec::new(), test_config()).unwrap();
        let ledger = composer.ledger();
        let mut output = composer.take_output().unwrap();
        composer.start().await.unwrap();

        // Consume the output the way a recorder would.
        let drain = tokio::spawn(async move { while output.next_frame().await.unwrap().is_some() {} });

        composer.abort_worker();
        let source: Box<dyn FrameSource> =
            Box::new(TestPatternSource::new("pattern", ledger, 8, 8, 200));
        composer.change_sources(vec![source]).await.unwrap();

        // The read task hits the dead worker and records the fault.
        let mut waited = Duration::ZERO;
        while composer.take_fault().is_none() && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }

        let err = composer.stop().await.unwrap_err();
        assert!(matches!(err, WeaveError::Render { .. }));
        assert_eq!(composer.state(), PipelineState::Idle);
        drain.await.unwrap();
    }
}
