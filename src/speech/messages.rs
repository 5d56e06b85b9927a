use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RelayError, RelayResult};

/// Instruction sent to the speech service
///
/// `InputAudioBufferAppend` carries a base64 audio blob; log `kind()` rather
/// than the `Debug` form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SpeechInstruction {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionSettings },

    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,

    /// Drop the part of an assistant item's audio the remote party never heard
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        item_id: String,
        content_index: u32,
        audio_end_ms: u64,
    },
}

impl SpeechInstruction {
    pub fn append_audio(audio: String) -> Self {
        Self::InputAudioBufferAppend { audio }
    }

    pub fn truncate(item_id: impl Into<String>, audio_end_ms: u64) -> Self {
        Self::ConversationItemTruncate {
            item_id: item_id.into(),
            content_index: 0,
            audio_end_ms,
        }
    }

    /// Seed the conversation with an assistant-authored opening line
    pub fn assistant_message(text: impl Into<String>) -> Self {
        Self::ConversationItemCreate {
            item: ConversationItem {
                kind: "message".to_string(),
                role: "assistant".to_string(),
                content: vec![ContentPart {
                    kind: "input_text".to_string(),
                    text: text.into(),
                }],
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
            Self::ConversationItemTruncate { .. } => "conversation.item.truncate",
        }
    }
}

/// Session configuration sent once the speech connection opens
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSettings {
    pub turn_detection: TurnDetection,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub voice: String,
    pub instructions: String,
    pub modalities: Vec<String>,
    pub temperature: f32,
    pub input_audio_transcription: InputAudioTranscription,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnDetection {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputAudioTranscription {
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

/// Event received from the speech service
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum SpeechEvent {
    /// The remote party's speech was transcribed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        transcript: String,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Nested output is parsed separately so a malformed payload only loses its transcript
    #[serde(rename = "response.done")]
    ResponseDone { response: Value },

    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        delta: String,
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Barge-in signal
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
        #[serde(default)]
        item_id: Option<String>,
    },

    #[serde(rename = "response.text")]
    ResponseText { text: String },

    #[serde(rename = "transcript.final")]
    TranscriptFinal { text: String },

    #[serde(rename = "error")]
    Error { error: Value },

    #[serde(rename = "session.created")]
    SessionCreated {},

    #[serde(rename = "session.updated")]
    SessionUpdated {},

    #[serde(rename = "input_audio_buffer.committed")]
    InputAudioBufferCommitted {},

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {},

    #[serde(rename = "response.content.done")]
    ResponseContentDone {},

    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {},

    #[serde(other)]
    Unhandled,
}

impl SpeechEvent {
    pub fn decode(text: &str) -> RelayResult<Self> {
        serde_json::from_str(text).map_err(|e| RelayError::decode("speech", e))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InputTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::ResponseDone { .. } => "response.done",
            Self::AudioDelta { .. } => "response.audio.delta",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::ResponseText { .. } => "response.text",
            Self::TranscriptFinal { .. } => "transcript.final",
            Self::Error { .. } => "error",
            Self::SessionCreated {} => "session.created",
            Self::SessionUpdated {} => "session.updated",
            Self::InputAudioBufferCommitted {} => "input_audio_buffer.committed",
            Self::SpeechStopped {} => "input_audio_buffer.speech_stopped",
            Self::ResponseContentDone {} => "response.content.done",
            Self::RateLimitsUpdated {} => "rate_limits.updated",
            Self::Unhandled => "unhandled",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletedResponse {
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(default)]
    transcript: Option<String>,
}

/// Collect every assistant-authored transcript segment from a `response.done` payload, in order
pub fn assistant_transcripts(response: &Value) -> RelayResult<Vec<String>> {
    let parsed = CompletedResponse::deserialize(response)
        .map_err(|e| RelayError::Structure(e.to_string()))?;

    Ok(parsed
        .output
        .into_iter()
        .filter(|item| item.role.as_deref() == Some("assistant"))
        .flat_map(|item| item.content)
        .filter_map(|content| content.transcript)
        .filter(|transcript| !transcript.is_empty())
        .collect())
}
