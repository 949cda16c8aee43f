pub mod fs;
pub mod s3;

use crate::records::VideoRecord;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

pub use fs::FileStore;
pub use s3::{S3Config, S3Store};

/// Key-value persistence for video records, one JSON document per video id.
///
/// Both backends share these semantics:
/// - `get` returns `None` for a missing, unreadable or unparseable entry
/// - `set` replaces the whole document; readers never observe a partial write
/// - `list` skips entries that fail to parse, order is unspecified
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<VideoRecord>>;

    async fn set(&self, key: &str, record: &VideoRecord) -> Result<()>;

    async fn list(&self) -> Result<Vec<VideoRecord>>;

    /// Short name for status output, e.g. "file" or "s3".
    fn backend_name(&self) -> &'static str;
}

/// Keys double as file names and object names, so only the identifier
/// alphabet is accepted.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    File { data_dir: PathBuf },
    S3(S3Config),
}

impl StoreConfig {
    pub fn backend_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::S3(_) => "s3",
        }
    }
}

pub async fn open_store(config: StoreConfig) -> Result<Arc<dyn RecordStore>> {
    info!("Opening {} record store", config.backend_name());
    match config {
        StoreConfig::File { data_dir } => {
            Ok(Arc::new(FileStore::new(data_dir).await?))
        }
        StoreConfig::S3(s3_config) => {
            Ok(Arc::new(S3Store::new(s3_config).await))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_keys_use_identifier_alphabet() {
        assert!(is_valid_key("abc12345678"));
        assert!(is_valid_key("a-b_c"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("../secret"));
        assert!(!is_valid_key("abc.json"));
    }

    #[tokio::test]
    async fn open_store_creates_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested").join("data");
        let store = open_store(StoreConfig::File {
            data_dir: data_dir.clone(),
        })
        .await
        .unwrap();

        assert_eq!(store.backend_name(), "file");
        assert!(data_dir.is_dir());
    }
}
