use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{apply_upsert, CallKey, CallStore, Fields};

/// Process-local store; records vanish on restart
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<CallKey, Fields>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn upsert(&self, key: &CallKey, fields: Fields, merge: bool) -> Result<()> {
        let mut records = self.records.write().await;
        let existing = records.remove(key);
        records.insert(key.clone(), apply_upsert(existing, fields, merge));
        Ok(())
    }

    async fn get(&self, key: &CallKey) -> Result<Option<Fields>> {
        Ok(self.records.read().await.get(key).cloned())
    }
}
