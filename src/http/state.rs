use crate::calls::{CallRegistry, CallService};
use crate::config::Config;
use crate::relay::CallRelay;
use crate::store::CallStore;
use crate::telephony::TelephonyClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Arc<dyn CallStore>,

    /// Call placement, status lookup and per-call context registry
    pub calls: Arc<CallService>,

    /// Relays currently serving a media stream
    pub relays: ActiveRelays,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn CallStore>,
        telephony: Arc<dyn TelephonyClient>,
    ) -> Self {
        let config = Arc::new(config);
        let calls = CallService::new(
            Arc::clone(&config),
            telephony,
            Arc::clone(&store),
            Arc::new(CallRegistry::new()),
        );

        Self {
            config,
            store,
            calls: Arc::new(calls),
            relays: ActiveRelays::default(),
        }
    }
}

/// Active relays (call_id, or session_id for unannounced streams → relay)
///
/// A reconnecting stream for the same call replaces the entry; the relay it
/// replaced must not remove its successor when it ends.
#[derive(Clone, Default)]
pub struct ActiveRelays {
    relays: Arc<RwLock<HashMap<String, Arc<CallRelay>>>>,
}

impl ActiveRelays {
    /// Register `relay` under `key`, returning the relay it displaced
    pub async fn insert(&self, key: &str, relay: Arc<CallRelay>) -> Option<Arc<CallRelay>> {
        self.relays.write().await.insert(key.to_string(), relay)
    }

    pub async fn get(&self, key: &str) -> Option<Arc<CallRelay>> {
        self.relays.read().await.get(key).cloned()
    }

    /// Remove the entry for `key` only while it still points at `relay`
    pub async fn remove_if_current(&self, key: &str, relay: &Arc<CallRelay>) -> bool {
        let mut relays = self.relays.write().await;
        match relays.get(key) {
            Some(current) if Arc::ptr_eq(current, relay) => {
                relays.remove(key);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.relays.read().await.len()
    }
}
