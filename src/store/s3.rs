//! Managed blob store backend.
//!
//! Records live as `<prefix><id>.json` objects in one bucket. Credentials
//! and region come from the standard AWS provider chain, an explicit
//! endpoint allows S3 compatible services such as MinIO.

use crate::records::VideoRecord;
use crate::store::{is_valid_key, RecordStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures::future::join_all;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct S3Config {
    pub bucket: String,
    /// Prepended to every object key, e.g. "video-analysis/".
    pub prefix: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: "video-analysis/".to_string(),
            region: None,
            endpoint: None,
        }
    }
}

pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    pub async fn new(config: S3Config) -> Self {
        let mut loader =
            aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region.clone() {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket,
            prefix: config.prefix,
        }
    }

    fn object_key(&self, key: &str) -> String {
        object_key(&self.prefix, key)
    }
}

fn object_key(prefix: &str, key: &str) -> String {
    format!("{prefix}{key}.json")
}

/// Inverse of `object_key`; `None` for objects that are not records.
fn record_key<'a>(prefix: &str, object_key: &'a str) -> Option<&'a str> {
    object_key
        .strip_prefix(prefix)?
        .strip_suffix(".json")
        .filter(|key| is_valid_key(key))
}

#[async_trait]
impl RecordStore for S3Store {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<VideoRecord>> {
        if !is_valid_key(key) {
            return Ok(None);
        }
        let object_key = self.object_key(key);
        let response = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_no_such_key()) =>
            {
                return Ok(None)
            }
            Err(e) => {
                warn!("Treating unreadable {} as absent: {:?}", object_key, e);
                return Ok(None);
            }
        };

        let bytes = match response.body.collect().await {
            Ok(body) => body.into_bytes(),
            Err(e) => {
                warn!("Treating unreadable {} as absent: {}", object_key, e);
                return Ok(None);
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring corrupt record {}: {}", object_key, e);
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, record))]
    async fn set(&self, key: &str, record: &VideoRecord) -> Result<()> {
        if !is_valid_key(key) {
            return Err(anyhow!("invalid record key: {key:?}"));
        }
        let object_key = self.object_key(key);
        let body = serde_json::to_vec(record)?;

        // A single put replaces the object atomically.
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| anyhow!("S3 put_object {object_key}: {e:?}"))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<VideoRecord>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&self.prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| anyhow!("S3 list_objects_v2: {e:?}"))?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|obj| obj.key())
                    .filter_map(|k| record_key(&self.prefix, k))
                    .map(str::to_string),
            );

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
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
        "s3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_to_video_analysis_prefix() {
        let config = S3Config::new("civic-bucket");
        assert_eq!(config.bucket, "civic-bucket");
        assert_eq!(config.prefix, "video-analysis/");
        assert_eq!(config.endpoint, None);
    }

    #[test]
    fn object_keys_round_trip_through_prefix() {
        let key = object_key("video-analysis/", "abc12345678");
        assert_eq!(key, "video-analysis/abc12345678.json");
        assert_eq!(record_key("video-analysis/", &key), Some("abc12345678"));
    }

    #[test]
    fn foreign_objects_are_not_records() {
        let prefix = "video-analysis/";
        assert_eq!(record_key(prefix, "other/abc12345678.json"), None);
        assert_eq!(record_key(prefix, "video-analysis/readme.txt"), None);
        assert_eq!(record_key(prefix, "video-analysis/a/b.json"), None);
    }

    #[tokio::test]
    async fn store_uses_configured_prefix() {
        let config = S3Config {
            bucket: "test-bucket".to_string(),
            prefix: "meetings/".to_string(),
            region: Some("us-east-1".to_string()),
            endpoint: Some("http://localhost:9000".to_string()),
        };
        let store = S3Store::new(config).await;
        assert_eq!(store.object_key("abc12345678"), "meetings/abc12345678.json");
        assert_eq!(store.backend_name(), "s3");
    }
}
