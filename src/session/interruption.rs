use serde::{Deserialize, Serialize};

use super::marks::MarkTracker;

/// Barge-in state of the assistant's playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptionState {
    /// No live assistant response
    #[default]
    Idle,
    /// Audio for a response has been forwarded to telephony
    AssistantSpeaking,
    /// Barge-in accepted; truncate and clear are being sent
    Interrupted,
}

/// Playback bookkeeping owned by the outbound direction
#[derive(Debug, Default)]
pub struct PlaybackState {
    pub state: InterruptionState,
    /// Telephony timestamp when the first chunk of the live response was forwarded
    pub response_start_ms: Option<u64>,
    /// Item id of the live assistant response
    pub last_assistant_item: Option<String>,
    pub marks: MarkTracker,
}

/// What to cut once a barge-in is accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    pub item_id: String,
    /// Audio the remote party actually heard, in milliseconds
    pub audio_end_ms: u64,
}

impl PlaybackState {
    /// Accept or ignore a barge-in at telephony time `now_ms`
    ///
    /// Nothing is interrupted unless marks are outstanding, a response start is
    /// anchored, and a live item exists. On acceptance the state moves to
    /// `Interrupted` until `finish_interruption` runs.
    pub fn begin_interruption(&mut self, now_ms: u64) -> Option<Truncation> {
        if self.marks.is_empty() {
            return None;
        }
        let start_ms = self.response_start_ms?;
        let item_id = self.last_assistant_item.clone()?;

        self.state = InterruptionState::Interrupted;

        Some(Truncation {
            item_id,
            audio_end_ms: now_ms.saturating_sub(start_ms),
        })
    }

    /// Drop pending marks and the live response; back to `Idle`
    pub fn finish_interruption(&mut self) -> usize {
        let drained = self.marks.drain();
        self.last_assistant_item = None;
        self.response_start_ms = None;
        self.state = InterruptionState::Idle;
        drained
    }

    /// Record a forwarded audio chunk; returns true when it anchored a new response
    pub fn record_audio_chunk(&mut self, now_ms: u64, item_id: Option<&str>) -> bool {
        let anchored = self.response_start_ms.is_none();
        if anchored {
            self.response_start_ms = Some(now_ms);
        }
        if let Some(id) = item_id {
            self.last_assistant_item = Some(id.to_string());
        }
        self.state = InterruptionState::AssistantSpeaking;
        anchored
    }

    /// Forget the live response when telephony starts a new call leg
    pub fn reset_for_new_stream(&mut self) {
        self.response_start_ms = None;
        self.last_assistant_item = None;
        self.state = InterruptionState::Idle;
    }
}
