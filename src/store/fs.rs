use crate::records::VideoRecord;
use crate::store::{is_valid_key, RecordStore};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Stores each record as `<data_dir>/<id>.json`.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub async fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir).await.with_context(|| {
            format!("create data directory {}", data_dir.display())
        })?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl RecordStore for FileStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<VideoRecord>> {
        if !is_valid_key(key) {
            debug!("Rejecting malformed key");
            return Ok(None);
        }
        let path = self.record_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("Treating unreadable {} as absent: {}", path.display(), e);
                return Ok(None);
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring corrupt record {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, record))]
    async fn set(&self, key: &str, record: &VideoRecord) -> Result<()> {
        if !is_valid_key(key) {
            return Err(anyhow!("invalid record key: {key:?}"));
        }
        let body = serde_json::to_vec_pretty(record)?;
        let dir = self.data_dir.clone();
        let path = self.record_path(key);

        // Write beside the target and rename so readers see old or new.
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .with_context(|| format!("temp file in {}", dir.display()))?;
            tmp.write_all(&body)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&path)
                .map_err(|e| anyhow!("persist {}: {}", path.display(), e))?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<VideoRecord>> {
        let mut entries = tokio::fs::read_dir(&self.data_dir)
            .await
            .with_context(|| format!("list {}", self.data_dir.display()))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(key) = name.strip_suffix(".json") {
                keys.push(key.to_string());
            }
        }

        let records = join_all(keys.iter().map(|key| self.get(key))).await;
        let mut out = Vec::with_capacity(records.len());
        for (key, record) in keys.iter().zip(records) {
            match record {
                Ok(Some(record)) => out.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping record {}: {:#}", key, e),
            }
        }
        debug!("Listed {} records", out.len());
        Ok(out)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
