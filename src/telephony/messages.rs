use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{RelayError, RelayResult};

/// Frame received from the telephony media stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyEvent {
    /// Sent once when the websocket is established, before `start`
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    Start { start: StartPayload },
    Media { media: MediaPayload },
    /// Playback acknowledgment for a mark we sent
    Mark { mark: MarkPayload },
    Stop {},
}

impl TelephonyEvent {
    pub fn decode(text: &str) -> RelayResult<Self> {
        serde_json::from_str(text).map_err(|e| RelayError::decode("telephony", e))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub stream_sid: String,
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Milliseconds since the stream started, on the telephony clock
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: u64,
    /// Base64 audio in the negotiated codec
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

/// Frame sent back to the telephony media stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyCommand {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: Option<String>,
        media: OutboundMedia,
    },
    Mark {
        #[serde(rename = "streamSid")]
        stream_sid: Option<String>,
        mark: MarkPayload,
    },
    /// Flush everything queued for playback on the stream
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: Option<String>,
    },
}

impl TelephonyCommand {
    pub fn media(stream_sid: Option<String>, payload: String) -> Self {
        Self::Media {
            stream_sid,
            media: OutboundMedia { payload },
        }
    }

    pub fn mark(stream_sid: Option<String>, name: impl Into<String>) -> Self {
        Self::Mark {
            stream_sid,
            mark: MarkPayload { name: name.into() },
        }
    }

    pub fn clear(stream_sid: Option<String>) -> Self {
        Self::Clear { stream_sid }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Media { .. } => "media",
            Self::Mark { .. } => "mark",
            Self::Clear { .. } => "clear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    pub payload: String,
}

/// Telephony sends the media timestamp as a decimal string; accept plain numbers too
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(ms) => Ok(ms),
        Raw::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {:?}: {}", text, e))),
    }
}
