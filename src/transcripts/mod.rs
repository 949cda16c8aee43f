pub mod fake;
pub mod real;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One timed caption snippet, in playback order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoTranscript {
    pub title: Option<String>,
    pub segments: Vec<TranscriptSegment>,
}

impl VideoTranscript {
    /// Segment texts joined by single spaces, in original order.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Source of titles and captions for a video id.
///
/// Implementations report provider failures (captions disabled, video
/// unavailable, network errors) as `Err`; callers decide whether that is
/// fatal. One instance is shared by every request.
#[async_trait]
pub trait TranscriptProviderTrait: Send + Sync {
    async fn fetch_transcript(&self, video_id: &str) -> Result<VideoTranscript>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_segments_with_single_spaces() {
        let transcript = VideoTranscript {
            title: None,
            segments: vec![
                TranscriptSegment::new("Hello", 0.0, 1.0),
                TranscriptSegment::new("world", 1.0, 1.0),
            ],
        };
        assert_eq!(transcript.text(), "Hello world");
    }

    #[test]
    fn empty_transcript_has_empty_text() {
        assert_eq!(VideoTranscript::default().text(), "");
    }
}
