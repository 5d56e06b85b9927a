//! Outbound call placement
//!
//! A call placed here gets its context (owner, instructions, greeting)
//! registered under the telephony call id, so the media stream that later
//! connects for that call is relayed with the right settings.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::Config;
use crate::session::CallContext;
use crate::store::{CallKey, CallStatus, CallStore, Fields};
use crate::telephony::{CallLegStatus, TelephonyClient};

pub const TWIML_PATH: &str = "/outgoing-call-twiml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRequest {
    /// Destination number
    pub to: String,
    pub user_id: String,
    /// Overrides the configured default instructions
    pub instructions: Option<String>,
    /// Overrides the configured default greeting
    pub greeting: Option<String>,
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("missing 'to' number")]
    MissingDestination,
    #[error("missing 'from' number; set telephony.from_number")]
    MissingCaller,
    #[error("failed to place call: {0:#}")]
    Telephony(anyhow::Error),
}

/// Contexts of calls placed by this process, keyed by call id
#[derive(Default)]
pub struct CallRegistry {
    contexts: RwLock<HashMap<String, CallContext>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, call_id: &str, context: CallContext) {
        self.contexts
            .write()
            .await
            .insert(call_id.to_string(), context);
    }

    pub async fn lookup(&self, call_id: &str) -> Option<CallContext> {
        self.contexts.read().await.get(call_id).cloned()
    }

    pub async fn forget(&self, call_id: &str) -> Option<CallContext> {
        self.contexts.write().await.remove(call_id)
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }
}

pub struct CallService {
    config: Arc<Config>,
    telephony: Arc<dyn TelephonyClient>,
    store: Arc<dyn CallStore>,
    registry: Arc<CallRegistry>,
}

impl CallService {
    pub fn new(
        config: Arc<Config>,
        telephony: Arc<dyn TelephonyClient>,
        store: Arc<dyn CallStore>,
        registry: Arc<CallRegistry>,
    ) -> Self {
        Self {
            config,
            telephony,
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    /// Place a call and register its context; returns the telephony call id
    pub async fn initiate_call(&self, request: CallRequest) -> Result<String, PlacementError> {
        let to = request.to.trim();
        if to.is_empty() {
            return Err(PlacementError::MissingDestination);
        }
        let from = self.config.telephony.from_number.trim();
        if from.is_empty() {
            return Err(PlacementError::MissingCaller);
        }

        let speech = &self.config.speech;
        let instructions = request
            .instructions
            .unwrap_or_else(|| speech.instructions.clone());
        let greeting = request.greeting.unwrap_or_else(|| speech.greeting.clone());

        info!("Initiating call to {} for user {}", to, request.user_id);

        let callback_url = format!("{}{}", self.config.public_url(), TWIML_PATH);
        let call_id = self
            .telephony
            .place_call(to, from, &callback_url)
            .await
            .map_err(PlacementError::Telephony)?;

        let context = CallContext::new(
            Some(call_id.clone()),
            request.user_id,
            instructions,
            greeting,
        );
        let key = context.store_key();
        self.registry.register(&call_id, context).await;

        if let Err(e) = self
            .store
            .upsert(&key, CallStatus::Initiated.to_fields(), true)
            .await
        {
            error!("Failed to store initiated status for {}: {:#}", key.path(), e);
        }

        Ok(call_id)
    }

    pub async fn call_status(&self, call_id: &str) -> Result<CallLegStatus> {
        self.telephony.fetch_status(call_id).await
    }

    pub async fn call_record(&self, user_id: &str, call_id: &str) -> Result<Option<Fields>> {
        self.store.get(&CallKey::new(user_id, call_id)).await
    }

    /// Context for a media stream: the registered one, or configured defaults
    pub async fn context_for_stream(&self, call_id: Option<String>) -> CallContext {
        if let Some(id) = call_id.as_deref() {
            if let Some(context) = self.registry.lookup(id).await {
                return context;
            }
        }
        CallContext::fallback(call_id, &self.config.speech)
    }
}
