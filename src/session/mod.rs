//! Per-call session state
//!
//! This module provides the pieces both relay directions share:
//! - `CallContext`: who the call is for and what the assistant should say
//! - `CallSession`: stream id, telephony clock, playback/barge-in bookkeeping
//! - `MarkTracker`: FIFO of unacknowledged playback marks
//! - `TranscriptRecorder`: append-only transcript persisted to the call store

mod context;
mod interruption;
mod marks;
mod snapshot;
mod state;
mod transcript;

pub use context::CallContext;
pub use interruption::{InterruptionState, PlaybackState, Truncation};
pub use marks::MarkTracker;
pub use snapshot::SessionSnapshot;
pub use state::{CallSession, MARK_PREFIX};
pub use transcript::{TranscriptEntry, TranscriptRecorder, TranscriptRole};
