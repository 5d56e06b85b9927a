use call_relay::speech::{assistant_transcripts, session_settings, SpeechEvent, SpeechInstruction};
use call_relay::{Config, RelayError};
use serde_json::json;

#[test]
fn test_session_update_serialization() {
    let config = Config::from_toml_str("").unwrap();
    let instruction = SpeechInstruction::SessionUpdate {
        session: session_settings(&config.speech, "Ask about pricing"),
    };

    let value = serde_json::to_value(&instruction).unwrap();
    assert_eq!(value["type"], "session.update");
    assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
    assert_eq!(value["session"]["input_audio_format"], "g711_ulaw");
    assert_eq!(value["session"]["output_audio_format"], "g711_ulaw");
    assert_eq!(value["session"]["voice"], "alloy");
    assert_eq!(value["session"]["instructions"], "Ask about pricing");
    assert_eq!(value["session"]["modalities"], json!(["text", "audio"]));
    assert_eq!(value["session"]["input_audio_transcription"]["model"], "whisper-1");
}

#[test]
fn test_conversation_instructions_serialization() {
    assert_eq!(
        serde_json::to_value(SpeechInstruction::assistant_message("Hello!")).unwrap(),
        json!({
            "type": "conversation.item.create",
            "item": {
                "type": "message",
                "role": "assistant",
                "content": [{"type": "input_text", "text": "Hello!"}]
            }
        })
    );
    assert_eq!(
        serde_json::to_value(SpeechInstruction::ResponseCreate).unwrap(),
        json!({"type": "response.create"})
    );
    assert_eq!(
        serde_json::to_value(SpeechInstruction::truncate("item_9", 1500)).unwrap(),
        json!({
            "type": "conversation.item.truncate",
            "item_id": "item_9",
            "content_index": 0,
            "audio_end_ms": 1500
        })
    );
    assert_eq!(
        serde_json::to_value(SpeechInstruction::append_audio("AAAA".into())).unwrap(),
        json!({"type": "input_audio_buffer.append", "audio": "AAAA"})
    );
}

#[test]
fn test_relevant_events_deserialize() {
    let delta = SpeechEvent::decode(
        r#"{"type": "response.audio.delta", "event_id": "e1", "response_id": "r1",
            "item_id": "item_1", "output_index": 0, "content_index": 0, "delta": "AAAA"}"#,
    )
    .unwrap();
    assert_eq!(
        delta,
        SpeechEvent::AudioDelta {
            delta: "AAAA".into(),
            item_id: Some("item_1".into())
        }
    );

    let started = SpeechEvent::decode(
        r#"{"type": "input_audio_buffer.speech_started", "audio_start_ms": 1000, "item_id": "item_2"}"#,
    )
    .unwrap();
    assert!(matches!(
        started,
        SpeechEvent::SpeechStarted {
            audio_start_ms: Some(1000),
            ..
        }
    ));

    let transcript = SpeechEvent::decode(
        r#"{"type": "conversation.item.input_audio_transcription.completed",
            "item_id": "item_2", "content_index": 0, "transcript": "Hi"}"#,
    )
    .unwrap();
    assert_eq!(transcript.kind(), "conversation.item.input_audio_transcription.completed");

    assert_eq!(
        SpeechEvent::decode(r#"{"type": "transcript.final", "text": "Bye"}"#).unwrap(),
        SpeechEvent::TranscriptFinal { text: "Bye".into() }
    );
}

#[test]
fn test_lifecycle_and_unknown_events() {
    let created = SpeechEvent::decode(r#"{"type": "session.created", "session": {"id": "s1"}}"#).unwrap();
    assert_eq!(created, SpeechEvent::SessionCreated {});

    let limits = SpeechEvent::decode(r#"{"type": "rate_limits.updated", "rate_limits": []}"#).unwrap();
    assert_eq!(limits.kind(), "rate_limits.updated");

    let unknown = SpeechEvent::decode(r#"{"type": "response.audio_transcript.delta", "delta": "He"}"#).unwrap();
    assert_eq!(unknown, SpeechEvent::Unhandled);
}

#[test]
fn test_undecodable_event_is_decode_error() {
    let err = SpeechEvent::decode(r#"{"type": "response.audio.delta"}"#).unwrap_err();
    assert!(matches!(err, RelayError::Decode { .. }));
}

#[test]
fn test_completed_response_transcripts() {
    let response = json!({
        "id": "resp_1",
        "status": "completed",
        "output": [{
            "id": "item_3",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "audio", "transcript": "We have Tuesday open."}]
        }]
    });

    assert_eq!(
        assistant_transcripts(&response).unwrap(),
        vec!["We have Tuesday open.".to_string()]
    );
    assert!(assistant_transcripts(&json!({"output": []})).unwrap().is_empty());
}
