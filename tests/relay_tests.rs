use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use call_relay::relay::{CallRelay, RelayIo, RelaySink};
use call_relay::session::{CallContext, InterruptionState, TranscriptRole};
use call_relay::speech::SpeechInstruction;
use call_relay::store::{CallKey, CallStore, Fields, MemoryStore};
use call_relay::telephony::TelephonyCommand;
use call_relay::{Config, RelayError, RelayResult};
use futures::channel::mpsc as frames;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Store that keeps every write so tests can count status transitions
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    writes: Mutex<Vec<(CallKey, Fields)>>,
    /// Delay applied to in-progress transcript writes
    transcript_delay: Option<Duration>,
}

impl RecordingStore {
    fn statuses(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, fields)| fields.get("status").and_then(Value::as_str).map(String::from))
            .collect()
    }

    fn count(&self, status: &str) -> usize {
        self.statuses().iter().filter(|s| *s == status).count()
    }
}

#[async_trait]
impl CallStore for RecordingStore {
    async fn upsert(&self, key: &CallKey, fields: Fields, merge: bool) -> Result<()> {
        let in_progress = fields.get("status").and_then(Value::as_str) == Some("CALL_INPROGRESS");
        if let Some(delay) = self.transcript_delay {
            if in_progress && fields.contains_key("transcripts") {
                tokio::time::sleep(delay).await;
            }
        }

        self.writes
            .lock()
            .unwrap()
            .push((key.clone(), fields.clone()));
        self.inner.upsert(key, fields, merge).await
    }

    async fn get(&self, key: &CallKey) -> Result<Option<Fields>> {
        self.inner.get(key).await
    }
}

struct Harness {
    relay: Arc<CallRelay>,
    store: Arc<RecordingStore>,
    telephony_in: Option<frames::UnboundedSender<RelayResult<String>>>,
    speech_in: Option<frames::UnboundedSender<RelayResult<String>>>,
    telephony_out: mpsc::UnboundedReceiver<TelephonyCommand>,
    speech_out: mpsc::UnboundedReceiver<SpeechInstruction>,
    task: JoinHandle<RelayResult<()>>,
}

impl Harness {
    fn start(idle_timeout_secs: Option<u64>) -> Self {
        Self::start_with_store(idle_timeout_secs, RecordingStore::default())
    }

    fn start_with_store(idle_timeout_secs: Option<u64>, store: RecordingStore) -> Self {
        let mut config = Config::from_toml_str("").unwrap();
        config.speech.idle_timeout_secs = idle_timeout_secs;

        let store = Arc::new(store);
        let context = CallContext::new(Some("CA1".into()), "user-1", "Be brief", "Hello there");
        let relay = Arc::new(CallRelay::new(
            context,
            store.clone() as Arc<dyn CallStore>,
            config.speech.clone(),
        ));

        let (telephony_tx, telephony_rx) = frames::unbounded();
        let (speech_tx, speech_rx) = frames::unbounded();
        let (telephony, telephony_out) = RelaySink::new("telephony");
        let (speech, speech_out) = RelaySink::new("speech");

        let task = {
            let relay = relay.clone();
            tokio::spawn(async move {
                relay
                    .run(RelayIo {
                        telephony_frames: telephony_rx,
                        speech_events: speech_rx,
                        telephony,
                        speech,
                    })
                    .await
            })
        };

        Self {
            relay,
            store,
            telephony_in: Some(telephony_tx),
            speech_in: Some(speech_tx),
            telephony_out,
            speech_out,
            task,
        }
    }

    fn telephony(&self, frame: Value) {
        self.telephony_in
            .as_ref()
            .unwrap()
            .unbounded_send(Ok(frame.to_string()))
            .unwrap();
    }

    fn speech(&self, event: Value) {
        self.speech_in
            .as_ref()
            .unwrap()
            .unbounded_send(Ok(event.to_string()))
            .unwrap();
    }

    async fn next_speech(&mut self) -> SpeechInstruction {
        tokio::time::timeout(Duration::from_secs(2), self.speech_out.recv())
            .await
            .expect("timed out waiting for speech instruction")
            .expect("speech sink closed")
    }

    async fn next_telephony(&mut self) -> TelephonyCommand {
        tokio::time::timeout(Duration::from_secs(2), self.telephony_out.recv())
            .await
            .expect("timed out waiting for telephony command")
            .expect("telephony sink closed")
    }

    /// Consume session.update, the greeting item and response.create
    async fn skip_priming(&mut self) {
        for _ in 0..3 {
            self.next_speech().await;
        }
    }

    /// End the speech stream and wait for the relay to finish
    async fn close_speech(&mut self) -> RelayResult<()> {
        self.speech_in.take();
        tokio::time::timeout(Duration::from_secs(2), &mut self.task)
            .await
            .expect("relay did not finish")
            .unwrap()
    }
}

fn start_frame(stream_sid: &str) -> Value {
    json!({"event": "start", "start": {"streamSid": stream_sid, "callSid": "CA1"}})
}

fn media_frame(timestamp: &str, payload: &str) -> Value {
    json!({"event": "media", "media": {"timestamp": timestamp, "payload": payload}})
}

fn audio_delta(item_id: &str) -> Value {
    json!({"type": "response.audio.delta", "delta": "AAAA", "item_id": item_id})
}

fn speech_started() -> Value {
    json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 120})
}

#[tokio::test]
async fn test_priming_instructions() {
    let mut h = Harness::start(None);

    match h.next_speech().await {
        SpeechInstruction::SessionUpdate { session } => {
            assert_eq!(session.voice, "alloy");
            assert_eq!(session.instructions, "Be brief");
            assert_eq!(session.input_audio_format, "g711_ulaw");
            assert_eq!(session.output_audio_format, "g711_ulaw");
            assert_eq!(session.modalities, vec!["text", "audio"]);
            assert_eq!(session.turn_detection.kind, "server_vad");
        }
        other => panic!("expected session.update, got {:?}", other),
    }
    assert_eq!(
        h.next_speech().await,
        SpeechInstruction::assistant_message("Hello there")
    );
    assert_eq!(h.next_speech().await, SpeechInstruction::ResponseCreate);

    h.close_speech().await.unwrap();
}

#[tokio::test]
async fn test_barge_in_truncates_and_clears() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.telephony(start_frame("abc"));
    h.telephony(media_frame("0", "AQID"));
    assert_eq!(
        h.next_speech().await,
        SpeechInstruction::append_audio("AQID".to_string())
    );

    h.speech(audio_delta("x1"));
    assert_eq!(
        h.next_telephony().await,
        TelephonyCommand::media(Some("abc".into()), "AAAA".into())
    );
    assert_eq!(
        h.next_telephony().await,
        TelephonyCommand::mark(Some("abc".into()), "responsePart-1")
    );

    h.speech(speech_started());
    assert_eq!(h.next_speech().await, SpeechInstruction::truncate("x1", 0));
    assert_eq!(
        h.next_telephony().await,
        TelephonyCommand::clear(Some("abc".into()))
    );

    h.close_speech().await.unwrap();

    let session = h.relay.session();
    assert_eq!(session.pending_marks().await, 0);
    assert_eq!(session.response_start_ms().await, None);
    assert_eq!(session.last_assistant_item().await, None);
    assert_eq!(session.interruption_state().await, InterruptionState::Idle);
}

#[tokio::test]
async fn test_truncation_uses_elapsed_playback() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.telephony(start_frame("abc"));
    h.telephony(media_frame("100", "AQID"));
    h.next_speech().await;

    h.speech(audio_delta("x1"));
    h.next_telephony().await;
    h.next_telephony().await;

    h.telephony(media_frame("340", "AQID"));
    h.next_speech().await;

    h.speech(speech_started());
    assert_eq!(h.next_speech().await, SpeechInstruction::truncate("x1", 240));

    h.close_speech().await.unwrap();
}

#[tokio::test]
async fn test_barge_in_without_marks_is_noop() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    // Audio before any stream id: forwarded, but no mark can be sent
    h.speech(audio_delta("x1"));
    assert_eq!(
        h.next_telephony().await,
        TelephonyCommand::media(None, "AAAA".into())
    );
    h.speech(speech_started());

    h.close_speech().await.unwrap();

    assert!(h.speech_out.recv().await.is_none());
    assert!(h.telephony_out.recv().await.is_none());
    assert_eq!(h.relay.session().last_assistant_item().await.as_deref(), Some("x1"));
}

#[tokio::test]
async fn test_mark_acks_pop_oldest_first() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.telephony(start_frame("abc"));
    h.telephony(media_frame("0", "AQID"));
    h.next_speech().await;

    h.speech(audio_delta("x1"));
    h.speech(audio_delta("x1"));
    for _ in 0..4 {
        h.next_telephony().await;
    }
    assert_eq!(h.relay.session().pending_marks().await, 2);

    h.telephony(json!({"event": "mark", "mark": {"name": "responsePart-1"}}));
    // A later media frame proves the ack ahead of it was handled
    h.telephony(media_frame("20", "AQID"));
    h.next_speech().await;
    assert_eq!(h.relay.session().pending_marks().await, 1);

    h.close_speech().await.unwrap();
}

#[tokio::test]
async fn test_speech_close_finalizes_once() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.close_speech().await.unwrap();

    assert!(h.relay.session().is_completed());
    assert!(h.telephony_out.recv().await.is_none());
    assert!(h.speech_out.recv().await.is_none());
    assert_eq!(h.store.count("CALL_COMPLETED"), 1);

    h.relay.finalize().await;
    assert_eq!(h.store.count("CALL_COMPLETED"), 1);
}

#[tokio::test]
async fn test_telephony_stop_ends_relay() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.telephony(start_frame("abc"));
    h.telephony(json!({"event": "stop"}));

    tokio::time::timeout(Duration::from_secs(2), &mut h.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert!(h.relay.session().is_completed());
    assert!(h.speech_out.recv().await.is_none());
    assert_eq!(h.store.count("CALL_COMPLETED"), 1);
}

#[tokio::test]
async fn test_transcripts_persisted_in_arrival_order() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.speech(json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "in1",
        "transcript": "How much for a two bedroom?"
    }));
    h.speech(json!({
        "type": "response.done",
        "response": {
            "output": [
                {"role": "assistant", "content": [{"type": "audio", "transcript": "About five hundred."}]}
            ]
        }
    }));
    h.close_speech().await.unwrap();

    let entries = h.relay.recorder().entries().await;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].role, TranscriptRole::RemoteParty);
    assert_eq!(entries[1].role, TranscriptRole::Assistant);

    let record = h
        .store
        .get(&CallKey::new("user-1", "CA1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["status"], "CALL_COMPLETED");

    let transcripts = record["transcripts"].as_array().unwrap();
    assert_eq!(transcripts.len(), 2);
    assert_eq!(transcripts[0]["role"], "user");
    assert_eq!(transcripts[0]["message"], "How much for a two bedroom?");
    assert_eq!(transcripts[1]["role"], "assistant");
    assert_eq!(transcripts[1]["message"], "About five hundred.");
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.telephony_in
        .as_ref()
        .unwrap()
        .unbounded_send(Ok("not json".to_string()))
        .unwrap();
    h.telephony(json!({"event": "media", "media": {"timestamp": "5", "payload": "%%%"}}));
    h.speech(json!({"type": "response.done", "response": {"status": "completed"}}));
    h.telephony(media_frame("10", "AQID"));

    assert_eq!(
        h.next_speech().await,
        SpeechInstruction::append_audio("AQID".to_string())
    );
    assert_eq!(h.relay.session().current_timestamp(), 10);

    h.close_speech().await.unwrap();
    assert!(h.relay.recorder().entries().await.is_empty());
}

#[tokio::test]
async fn test_latest_timestamp_tracks_last_media() {
    let mut h = Harness::start(None);
    h.skip_priming().await;

    h.telephony(start_frame("abc"));
    for ts in ["20", "40", "60"] {
        h.telephony(media_frame(ts, "AQID"));
        h.next_speech().await;
    }
    assert_eq!(h.relay.session().current_timestamp(), 60);
    assert_eq!(h.relay.session().stream_sid().await.as_deref(), Some("abc"));

    h.close_speech().await.unwrap();
}

#[tokio::test]
async fn test_idle_telephony_times_out() {
    let mut h = Harness::start(Some(1));
    h.skip_priming().await;

    let outcome = tokio::time::timeout(Duration::from_secs(5), &mut h.task)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, Err(RelayError::IdleTimeout(_))));
    assert!(h.relay.session().is_completed());
    assert_eq!(h.store.count("CALL_COMPLETED"), 1);
}

#[tokio::test]
async fn test_hangup_during_transcript_write_keeps_entry() {
    let store = RecordingStore {
        transcript_delay: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let mut h = Harness::start_with_store(None, store);
    h.skip_priming().await;

    h.speech(json!({
        "type": "conversation.item.input_audio_transcription.completed",
        "item_id": "in1",
        "transcript": "Goodbye"
    }));
    // Hang up while that entry's store write is still pending
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.telephony(json!({"event": "stop"}));

    tokio::time::timeout(Duration::from_secs(2), &mut h.task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(h.relay.recorder().len().await, 1);

    let record = h
        .store
        .get(&CallKey::new("user-1", "CA1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record["status"], "CALL_COMPLETED");

    let transcripts = record["transcripts"].as_array().unwrap();
    assert_eq!(transcripts.len(), 1);
    assert_eq!(transcripts[0]["role"], "user");
    assert_eq!(transcripts[0]["message"], "Goodbye");
    assert_eq!(h.store.count("CALL_COMPLETED"), 1);
}
