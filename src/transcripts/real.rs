use crate::transcripts::{
    TranscriptProviderTrait, TranscriptSegment, VideoTranscript,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use yt_transcript_rs::api::YouTubeTranscriptApi;

/// Fetches captions straight from YouTube.
pub struct YouTubeTranscriptProvider {
    api: YouTubeTranscriptApi,
    languages: Vec<String>,
}

impl YouTubeTranscriptProvider {
    pub fn new(languages: Vec<String>) -> Result<Self> {
        // No proxy and no cookie jar.
        let api = YouTubeTranscriptApi::new(None, None, None).map_err(|e| {
            anyhow!("Failed to create YouTube transcript client: {}", e)
        })?;
        let languages = if languages.is_empty() {
            vec!["en".to_string()]
        } else {
            languages
        };
        Ok(Self { api, languages })
    }
}

pub fn maybe_create_transcript_provider(
    languages: Vec<String>,
) -> Option<Arc<dyn TranscriptProviderTrait>> {
    match YouTubeTranscriptProvider::new(languages) {
        Ok(provider) => Some(Arc::new(provider)),
        Err(e) => {
            warn!("Transcript provider unavailable: {:#}", e);
            None
        }
    }
}

#[async_trait]
impl TranscriptProviderTrait for YouTubeTranscriptProvider {
    #[instrument(skip(self), err)]
    async fn fetch_transcript(&self, video_id: &str) -> Result<VideoTranscript> {
        let details = self
            .api
            .fetch_video_details(video_id)
            .await
            .map_err(|e| anyhow!("{}", e))?;

        let languages: Vec<&str> =
            self.languages.iter().map(String::as_str).collect();
        let fetched = self
            .api
            .fetch_transcript(video_id, &languages, false)
            .await
            .map_err(|e| anyhow!("{}", e))?;

        info!(
            "Fetched {} snippets ({}) for {}",
            fetched.snippets.len(),
            fetched.language_code,
            video_id
        );

        Ok(VideoTranscript {
            title: Some(details.title).filter(|t| !t.is_empty()),
            segments: fetched
                .snippets
                .into_iter()
                .map(|s| TranscriptSegment::new(s.text, s.start, s.duration))
                .collect(),
        })
    }
}
