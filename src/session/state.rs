use super::context::CallContext;
use super::interruption::{InterruptionState, PlaybackState, Truncation};
use super::snapshot::SessionSnapshot;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Name prefix for playback marks sent to telephony
pub const MARK_PREFIX: &str = "responsePart";

/// Mutable state of one relayed call, shared by both bridge directions
///
/// Writers per field:
/// - stream id, latest timestamp: inbound bridge
/// - playback (response start, live item, marks): outbound bridge and the
///   interruption controller running inline with it; inbound only pops marks
pub struct CallSession {
    context: CallContext,

    /// When the relay accepted the call
    started_at: chrono::DateTime<chrono::Utc>,

    /// Monotonic origin for activity tracking
    created: Instant,

    /// Telephony stream id, fixed by the first `start` event
    stream_sid: RwLock<Option<String>>,

    /// Latest telephony media timestamp (ms)
    latest_timestamp_ms: AtomicU64,

    /// Milliseconds since `created` at which the last telephony frame arrived
    last_activity_ms: AtomicU64,

    playback: Mutex<PlaybackState>,

    /// Sequence for mark names
    mark_sequence: AtomicU64,

    completed: AtomicBool,
}

impl CallSession {
    pub fn new(context: CallContext) -> Self {
        info!("Creating call session: {}", context.session_id);

        Self {
            context,
            started_at: Utc::now(),
            created: Instant::now(),
            stream_sid: RwLock::new(None),
            latest_timestamp_ms: AtomicU64::new(0),
            last_activity_ms: AtomicU64::new(0),
            playback: Mutex::new(PlaybackState::default()),
            mark_sequence: AtomicU64::new(0),
            completed: AtomicBool::new(false),
        }
    }

    pub fn context(&self) -> &CallContext {
        &self.context
    }

    /// Handle a telephony `start`: fix the stream id and reset timing for the new leg
    ///
    /// Returns false when a stream id was already set; the original id is kept.
    pub async fn set_on_start(&self, stream_sid: &str) -> bool {
        let first = {
            let mut current = self.stream_sid.write().await;
            match current.as_deref() {
                None => {
                    *current = Some(stream_sid.to_string());
                    true
                }
                Some(existing) => {
                    if existing != stream_sid {
                        warn!(
                            "Ignoring stream id {} for session {}; already bound to {}",
                            stream_sid, self.context.session_id, existing
                        );
                    }
                    false
                }
            }
        };

        self.latest_timestamp_ms.store(0, Ordering::SeqCst);
        self.playback.lock().await.reset_for_new_stream();

        first
    }

    pub async fn stream_sid(&self) -> Option<String> {
        self.stream_sid.read().await.clone()
    }

    /// Move the telephony clock forward; it never goes backwards within a leg
    pub fn advance_timestamp(&self, ms: u64) {
        let previous = self.latest_timestamp_ms.fetch_max(ms, Ordering::SeqCst);
        if ms < previous {
            debug!("Media timestamp {}ms behind latest {}ms", ms, previous);
        }
    }

    pub fn current_timestamp(&self) -> u64 {
        self.latest_timestamp_ms.load(Ordering::SeqCst)
    }

    /// Flag the session completed; true only for the first caller
    pub fn mark_as_completed(&self) -> bool {
        !self.completed.swap(true, Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Note that a telephony frame just arrived
    pub fn touch(&self) {
        let elapsed = self.created.elapsed().as_millis() as u64;
        self.last_activity_ms.store(elapsed, Ordering::SeqCst);
    }

    /// Time since the last telephony frame (or since creation)
    pub fn idle_for(&self) -> Duration {
        let now = self.created.elapsed().as_millis() as u64;
        let last = self.last_activity_ms.load(Ordering::SeqCst);
        Duration::from_millis(now.saturating_sub(last))
    }

    /// Record a forwarded assistant audio chunk at the current telephony time
    ///
    /// Returns the response start anchor when this chunk set it.
    pub async fn record_audio_chunk(&self, item_id: Option<&str>) -> Option<u64> {
        let now = self.current_timestamp();
        let mut playback = self.playback.lock().await;
        if playback.record_audio_chunk(now, item_id) {
            playback.response_start_ms
        } else {
            None
        }
    }

    /// Allocate a mark name and queue it as pending
    pub async fn push_mark(&self) -> String {
        let seq = self.mark_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("{}-{}", MARK_PREFIX, seq);
        self.playback.lock().await.marks.push(name.clone());
        name
    }

    pub async fn acknowledge_mark(&self, name: &str) -> Option<String> {
        self.playback.lock().await.marks.acknowledge(name)
    }

    pub async fn pending_marks(&self) -> usize {
        self.playback.lock().await.marks.len()
    }

    pub async fn begin_interruption(&self) -> Option<Truncation> {
        let now = self.current_timestamp();
        self.playback.lock().await.begin_interruption(now)
    }

    pub async fn finish_interruption(&self) -> usize {
        self.playback.lock().await.finish_interruption()
    }

    pub async fn interruption_state(&self) -> InterruptionState {
        self.playback.lock().await.state
    }

    pub async fn response_start_ms(&self) -> Option<u64> {
        self.playback.lock().await.response_start_ms
    }

    pub async fn last_assistant_item(&self) -> Option<String> {
        self.playback.lock().await.last_assistant_item.clone()
    }

    /// Point-in-time view for status queries
    pub async fn snapshot(&self, transcript_entries: usize) -> SessionSnapshot {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let (pending_marks, interruption_state, response_start_ms) = {
            let playback = self.playback.lock().await;
            (
                playback.marks.len(),
                playback.state,
                playback.response_start_ms,
            )
        };

        SessionSnapshot {
            session_id: self.context.session_id.clone(),
            call_id: self.context.call_id.clone(),
            user_id: self.context.user_id.clone(),
            stream_sid: self.stream_sid().await,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            latest_timestamp_ms: self.current_timestamp(),
            response_start_ms,
            pending_marks,
            interruption_state,
            transcript_entries,
            completed: self.is_completed(),
        }
    }
}
