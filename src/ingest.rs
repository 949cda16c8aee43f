use crate::error::PipelineError;
use crate::records::{VideoRecord, VideoStatus};
use crate::transcripts::TranscriptProviderTrait;
use crate::video_id::extract_video_id;
use crate::AppState;
use anyhow::anyhow;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

pub const INVALID_URL: &str = "Invalid URL";
pub const NO_TRANSCRIPT: &str = "No transcript found";

/// Outcome for one submitted URL, serialized flat so a cache hit is the
/// stored record plus `"cached": true`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IngestResult {
    Cached {
        #[serde(flatten)]
        record: VideoRecord,
        cached: bool,
    },
    Stored(VideoRecord),
    Invalid {
        url: String,
        status: VideoStatus,
        error: String,
    },
}

impl IngestResult {
    fn cached(record: VideoRecord) -> Self {
        IngestResult::Cached {
            record,
            cached: true,
        }
    }

    fn invalid(url: &str) -> Self {
        IngestResult::Invalid {
            url: url.to_string(),
            status: VideoStatus::Error,
            error: INVALID_URL.to_string(),
        }
    }

    pub fn status(&self) -> VideoStatus {
        match self {
            IngestResult::Cached { record, .. } | IngestResult::Stored(record) => {
                record.status
            }
            IngestResult::Invalid { status, .. } => *status,
        }
    }

    pub fn record(&self) -> Option<&VideoRecord> {
        match self {
            IngestResult::Cached { record, .. } | IngestResult::Stored(record) => {
                Some(record)
            }
            IngestResult::Invalid { .. } => None,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, IngestResult::Cached { .. })
    }
}

/// Ingests `urls` one after another, reusing the shared transcript
/// provider. Per URL failures become error results (persisted when a video
/// id was found); only a failing store aborts the batch.
#[instrument(skip(state, urls), fields(count = urls.len()), err)]
pub async fn ingest_urls(
    state: &AppState,
    urls: &[String],
) -> Result<Vec<IngestResult>, PipelineError> {
    let provider = state.transcript_provider.as_deref().ok_or_else(|| {
        PipelineError::Internal(anyhow!("Transcript provider not configured"))
    })?;

    let mut results = Vec::with_capacity(urls.len());
    for url in urls {
        results.push(ingest_url(state, provider, url).await?);
    }

    info!(
        "Ingested {} urls ({} cached)",
        results.len(),
        results.iter().filter(|r| r.is_cached()).count()
    );
    Ok(results)
}

#[instrument(skip(state, provider))]
async fn ingest_url(
    state: &AppState,
    provider: &dyn TranscriptProviderTrait,
    url: &str,
) -> Result<IngestResult, PipelineError> {
    let Some(video_id) = extract_video_id(url) else {
        warn!("No video id in url");
        return Ok(IngestResult::invalid(url));
    };

    if let Some(existing) = state.store.get(&video_id).await? {
        if existing.status == VideoStatus::Analyzed {
            info!("Serving analyzed video {} from cache", video_id);
            return Ok(IngestResult::cached(existing));
        }
    }

    let record = match provider.fetch_transcript(&video_id).await {
        Ok(transcript) => {
            let text = transcript.text();
            if text.is_empty() {
                VideoRecord::failed(
                    &video_id,
                    url,
                    transcript.title,
                    Some(text),
                    NO_TRANSCRIPT,
                )
            } else {
                VideoRecord::fetched(&video_id, url, transcript.title, text)
            }
        }
        Err(e) => {
            error!("Error processing {}: {:#}", video_id, e);
            VideoRecord::failed(&video_id, url, None, None, e.to_string())
        }
    };

    state.store.set(&video_id, &record).await?;
    info!("Stored {} as {}", video_id, record.status.as_str());
    Ok(IngestResult::Stored(record))
}
