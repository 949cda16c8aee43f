use crate::transcripts::{
    TranscriptProviderTrait, TranscriptSegment, VideoTranscript,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted transcript provider for tests.
///
/// Each video id maps to either a transcript or an error message. Ids
/// that were never scripted fail like a video without captions. Every
/// call is recorded in `requests`.
pub struct FakeTranscriptProvider {
    videos: Mutex<HashMap<String, Result<VideoTranscript, String>>>,
    pub requests: Mutex<Vec<String>>,
}

impl Default for FakeTranscriptProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTranscriptProvider {
    pub fn new() -> Self {
        Self {
            videos: Mutex::new(HashMap::new()),
            requests: Mutex::new(vec![]),
        }
    }

    /// Serve `texts` as consecutive segments for `video_id`.
    pub fn with_video(
        self,
        video_id: &str,
        title: Option<&str>,
        texts: &[&str],
    ) -> Self {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, text)| TranscriptSegment::new(*text, i as f64, 1.0))
            .collect();
        self.videos.lock().unwrap().insert(
            video_id.to_string(),
            Ok(VideoTranscript {
                title: title.map(String::from),
                segments,
            }),
        );
        self
    }

    /// Fail every fetch of `video_id` with `message`.
    pub fn with_error(self, video_id: &str, message: &str) -> Self {
        self.videos
            .lock()
            .unwrap()
            .insert(video_id.to_string(), Err(message.to_string()));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl TranscriptProviderTrait for FakeTranscriptProvider {
    async fn fetch_transcript(&self, video_id: &str) -> Result<VideoTranscript> {
        self.requests.lock().unwrap().push(video_id.to_string());
        match self.videos.lock().unwrap().get(video_id) {
            Some(Ok(transcript)) => Ok(transcript.clone()),
            Some(Err(message)) => Err(anyhow!("{}", message)),
            None => Err(anyhow!("Transcript is disabled for {}", video_id)),
        }
    }
}
