//! Call record persistence
//!
//! Records live under `users/<user_id>/calls/<call_id>` and are written with
//! upsert semantics. The relay only ever merges `status` and `transcripts`
//! into a record; everything else in it belongs to other collaborators.

mod file;
mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use file::JsonFileStore;
pub use memory::MemoryStore;

pub type Fields = Map<String, Value>;

/// Address of one call record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallKey {
    pub user_id: String,
    pub call_id: String,
}

impl CallKey {
    pub fn new(user_id: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            call_id: call_id.into(),
        }
    }

    pub fn path(&self) -> String {
        format!("users/{}/calls/{}", self.user_id, self.call_id)
    }
}

/// Persisted call status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallStatus {
    #[serde(rename = "CALL_INITIATED")]
    Initiated,
    #[serde(rename = "CALL_INPROGRESS")]
    InProgress,
    #[serde(rename = "CALL_COMPLETED")]
    Completed,
}

impl CallStatus {
    pub fn to_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), serde_json::json!(self));
        fields
    }
}

#[async_trait]
pub trait CallStore: Send + Sync {
    /// Write `fields` into the record; with `merge` existing top-level fields not named survive
    async fn upsert(&self, key: &CallKey, fields: Fields, merge: bool) -> Result<()>;

    async fn get(&self, key: &CallKey) -> Result<Option<Fields>>;
}

fn apply_upsert(existing: Option<Fields>, fields: Fields, merge: bool) -> Fields {
    match existing {
        Some(mut current) if merge => {
            current.extend(fields);
            current
        }
        _ => fields,
    }
}
