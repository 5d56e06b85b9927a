use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::store::{CallKey, CallStatus, CallStore, Fields};

/// Who spoke a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptRole {
    /// The person on the phone
    #[serde(rename = "user")]
    RemoteParty,
    #[serde(rename = "assistant")]
    Assistant,
}

/// One utterance, in arrival order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub message: String,
    /// Position in the call transcript (0-indexed)
    pub sequence: usize,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
}

/// Append-only transcript that persists a full snapshot after every entry
pub struct TranscriptRecorder {
    key: CallKey,
    store: Arc<dyn CallStore>,
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl TranscriptRecorder {
    pub fn new(key: CallKey, store: Arc<dyn CallStore>) -> Self {
        Self {
            key,
            store,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Append an entry and write the whole transcript to the store
    ///
    /// Store failures are logged and not retried; the entry stays recorded locally.
    pub async fn record(&self, role: TranscriptRole, message: impl Into<String>) -> TranscriptEntry {
        let (entry, snapshot) = {
            let mut entries = self.entries.lock().await;
            let entry = TranscriptEntry {
                role,
                message: message.into(),
                sequence: entries.len(),
                timestamp: Utc::now(),
            };
            entries.push(entry.clone());
            (entry, entries.clone())
        };

        match role {
            TranscriptRole::RemoteParty => info!("Remote party said: {}", entry.message),
            TranscriptRole::Assistant => info!("Assistant said: {}", entry.message),
        }

        let fields = transcript_fields(CallStatus::InProgress, &snapshot);
        if let Err(e) = self.store.upsert(&self.key, fields, true).await {
            error!("Failed to persist transcript for {}: {:#}", self.key.path(), e);
        }

        entry
    }

    /// Store document with `status` and every entry recorded so far
    pub async fn document(&self, status: CallStatus) -> Fields {
        let entries = self.entries.lock().await;
        if entries.is_empty() {
            status.to_fields()
        } else {
            transcript_fields(status, &entries)
        }
    }

    pub async fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn transcript_fields(status: CallStatus, entries: &[TranscriptEntry]) -> Fields {
    let mut fields = status.to_fields();
    fields.insert("transcripts".to_string(), serde_json::json!(entries));
    fields
}
