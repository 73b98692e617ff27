//! Weave Compositor
//!
//! Real-time compositing pipeline: N live frame sources in, one
//! composite frame stream out.
//!
//! # Pipeline Architecture
//!
//! ```text
//! camera ──┐                                  ┌──────────────┐
//!          ├── read task ── frame(id) ──────► │  worker task  │
//! screen ──┤                                  │  slot table   │
//!          └── read task ── frame(id) ──────► │  render pass  │
//!                                             └──────┬───────┘
//!                                          composed bitmap
//!                                                    │
//!                                       relay: stamp + wrap
//!                                                    │
//!                                                    ▼
//!                                         FrameSink ──► SyntheticSource
//!                                                        (external encoder)
//! ```
//!
//! Render passes are triggered by frame arrival, not by a timer: the
//! composite cadence follows whichever source has new visual data.
//! Per-source backpressure is newest-frame-wins — a slot holds at most
//! one pending frame, and a slow renderer drops intermediates instead
//! of queueing them.

pub mod composer;
pub mod layout;
pub mod sink;
pub mod source;
pub mod stats;
pub mod surface;
mod worker;

pub use composer::{Composer, PipelineState};
pub use layout::{compute_layout, fit_rect, Rect};
pub use sink::{sink_pair, FrameSink, SyntheticSource};
pub use source::{video_track, FrameSource, TestPatternSource, TrackAdapter, TrackHandle, VideoTrack};
pub use stats::PipelineStats;
