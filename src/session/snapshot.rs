use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::interruption::InterruptionState;

/// Live view of a relayed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub call_id: Option<String>,

    pub user_id: String,

    /// Telephony stream id, once `start` has arrived
    pub stream_sid: Option<String>,

    /// When the relay accepted the call
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Latest telephony media timestamp
    pub latest_timestamp_ms: u64,

    pub response_start_ms: Option<u64>,

    /// Marks sent to telephony and not yet acknowledged
    pub pending_marks: usize,

    pub interruption_state: InterruptionState,

    /// Number of transcript entries recorded so far
    pub transcript_entries: usize,

    pub completed: bool,
}
