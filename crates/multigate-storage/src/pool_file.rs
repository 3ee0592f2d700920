use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use multigate_provider_core::pool::PoolDocument;

use crate::{StorageError, StorageResult};

/// Loads and persists the pool document at `PROVIDER_POOLS_FILE_PATH`
/// (spec.md §4.E, §6). Writes go to a sibling temp file and are renamed
/// into place so a reader never observes a partially written document.
pub struct PoolFileStore {
    path: PathBuf,
}

impl PoolFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file reads as an empty document; bootstrap treats an empty
    /// pool as a valid (if useless) starting state rather than an error.
    pub async fn load(&self) -> StorageResult<PoolDocument> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(PoolDocument::default()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    pub async fn store(&self, document: &PoolDocument) -> StorageResult<()> {
        let body = serde_json::to_vec_pretty(document)?;
        let temp = temp_path(&self.path);

        tokio::fs::write(&temp, &body).await.map_err(StorageError::Io)?;
        if let Err(err) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(StorageError::Io(err));
        }
        Ok(())
    }
}

fn temp_path(target: &Path) -> PathBuf {
    let pid = std::process::id();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let file_name = target
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("pool");
    target.with_file_name(format!("{file_name}.{pid}.{nanos}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use multigate_provider_core::credential::Credential;
    use multigate_provider_core::pool::ProviderEntry;

    #[tokio::test]
    async fn missing_file_loads_as_empty_document() {
        let dir = std::env::temp_dir().join(format!("multigate-storage-test-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let store = PoolFileStore::new(dir.join("does-not-exist.json"));

        let document = store.load().await.unwrap();
        assert!(document.entries.is_empty());
    }

    #[tokio::test]
    async fn store_then_load_round_trips() {
        let dir = std::env::temp_dir().join(format!("multigate-storage-test-{}-rt", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let store = PoolFileStore::new(dir.join("pool.json"));

        let mut document = PoolDocument::default();
        document.entries.insert(
            "openai-custom".to_string(),
            vec![ProviderEntry::new(
                "openai-custom",
                Credential::ApiKey { api_key: "sk-test".to_string(), base_url: None },
            )],
        );

        store.store(&document).await.unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.entries.get("openai-custom").unwrap().len(), 1);

        // no leftover temp file
        let mut entries = tokio::fs::read_dir(&dir).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["pool.json".to_string()]);
    }

    #[tokio::test]
    async fn persisted_document_uses_camel_case_field_names() {
        let dir = std::env::temp_dir().join(format!("multigate-storage-test-{}-shape", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let store = PoolFileStore::new(dir.join("pool.json"));

        let mut document = PoolDocument::default();
        document.entries.insert(
            "claude-custom".to_string(),
            vec![ProviderEntry::new(
                "claude-custom",
                Credential::ApiKey { api_key: "sk-test".to_string(), base_url: None },
            )],
        );
        store.store(&document).await.unwrap();

        let raw = tokio::fs::read_to_string(store.path()).await.unwrap();
        assert!(raw.contains("\"isHealthy\""));
        assert!(raw.contains("\"usageCount\""));
        assert!(!raw.contains("\"entries\""));
    }
}
