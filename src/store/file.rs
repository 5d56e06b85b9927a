use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{apply_upsert, CallKey, CallStore, Fields};

/// One JSON document per call under `<root>/users/<user_id>/calls/<call_id>.json`
pub struct JsonFileStore {
    root: PathBuf,
    /// Serialises read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create store directory: {:?}", root))?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn document_path(&self, key: &CallKey) -> Result<PathBuf> {
        for segment in [&key.user_id, &key.call_id] {
            if segment.is_empty()
                || segment.contains(['/', '\\'])
                || segment == "."
                || segment == ".."
            {
                anyhow::bail!("Invalid record key segment: {:?}", segment);
            }
        }

        Ok(self
            .root
            .join("users")
            .join(&key.user_id)
            .join("calls")
            .join(format!("{}.json", key.call_id)))
    }

    async fn read_document(path: &Path) -> Result<Option<Fields>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let fields = serde_json::from_slice(&bytes)
                    .with_context(|| format!("Corrupt call record: {:?}", path))?;
                Ok(Some(fields))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read call record: {:?}", path)),
        }
    }
}

#[async_trait]
impl CallStore for JsonFileStore {
    async fn upsert(&self, key: &CallKey, fields: Fields, merge: bool) -> Result<()> {
        let path = self.document_path(key)?;
        let _guard = self.write_lock.lock().await;

        let existing = Self::read_document(&path).await?;
        let document = apply_upsert(existing, fields, merge);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create record directory")?;
        }

        let bytes = serde_json::to_vec_pretty(&document)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("Failed to write call record: {:?}", tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace call record: {:?}", path))?;

        debug!("Stored {}", key.path());
        Ok(())
    }

    async fn get(&self, key: &CallKey) -> Result<Option<Fields>> {
        let path = self.document_path(key)?;
        Self::read_document(&path).await
    }
}
