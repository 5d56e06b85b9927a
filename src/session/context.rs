use serde::{Deserialize, Serialize};

use crate::config::SpeechConfig;
use crate::store::CallKey;

const ANONYMOUS_USER: &str = "anonymous";

/// Everything the relay needs to know about one call before audio flows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallContext {
    /// Unique per relay session (e.g. "session-6f1c…")
    pub session_id: String,

    /// Telephony call id, when the call was placed through this service
    pub call_id: Option<String>,

    /// Owner of the call record
    pub user_id: String,

    /// System instructions for the speech session
    pub instructions: String,

    /// Opening line the assistant speaks first
    pub greeting: String,
}

impl CallContext {
    pub fn new(
        call_id: Option<String>,
        user_id: impl Into<String>,
        instructions: impl Into<String>,
        greeting: impl Into<String>,
    ) -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            call_id,
            user_id: user_id.into(),
            instructions: instructions.into(),
            greeting: greeting.into(),
        }
    }

    /// Context for a stream nobody registered, using the configured defaults
    pub fn fallback(call_id: Option<String>, speech: &SpeechConfig) -> Self {
        Self::new(
            call_id,
            ANONYMOUS_USER,
            speech.instructions.clone(),
            speech.greeting.clone(),
        )
    }

    /// Record key; sessions without a call id are stored under their session id
    pub fn store_key(&self) -> CallKey {
        let call_id = self
            .call_id
            .clone()
            .unwrap_or_else(|| self.session_id.clone());
        CallKey::new(self.user_id.clone(), call_id)
    }
}
