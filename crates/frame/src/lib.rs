//! Weave Frame Model
//!
//! Value types that move through the compositing pipeline:
//! - [`SourceId`]: stable identifier for one input source
//! - [`Frame`]: a single RGBA image with a timestamp, single-owner
//! - [`CompositeBitmap`]: one rendered snapshot of the canvas, single-use
//! - [`FrameLedger`]: create/release accounting used by leak tests and
//!   the teardown guard
//!
//! Ownership discipline: a frame has exactly one owner at any time and
//! transfers between tasks by move. Release is `Drop`, which reports to
//! the ledger, so dropping a channel full of frames during teardown
//! still balances the books.

mod frame;
mod ledger;

pub use frame::*;
pub use ledger::*;
