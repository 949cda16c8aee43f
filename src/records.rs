use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_with_macros::skip_serializing_none;

/// Reads an explicit `null` the same as a missing field. Models emit
/// `null` for anything they could not determine.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lifecycle of a stored video. `Analyzed` is terminal; `Error` can be
/// reached from any earlier state and is only left by re-ingesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Queued,
    Fetched,
    Analyzed,
    Error,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Queued => "queued",
            VideoStatus::Fetched => "fetched",
            VideoStatus::Analyzed => "analyzed",
            VideoStatus::Error => "error",
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    pub category: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
}

/// Structured result extracted from a transcript by the LLM.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<Issue>,
    pub meeting_date: Option<String>,
    pub meeting_type: Option<String>,
    pub location: Option<Location>,
}

impl Analysis {
    pub fn has_category(&self, category: &str) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.category.as_deref() == Some(category))
    }
}

/// One stored document per video. Records are only ever replaced whole;
/// use the constructors so that `analysis` is set exactly when the status
/// is `Analyzed` and `error` exactly when it is `Error`.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    #[serde(rename = "videoId", alias = "id")]
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub transcript: Option<String>,
    pub analysis: Option<Analysis>,
    pub status: VideoStatus,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn fetched(
        id: impl Into<String>,
        url: impl Into<String>,
        title: Option<String>,
        transcript: String,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title,
            transcript: Some(transcript),
            analysis: None,
            status: VideoStatus::Fetched,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// A failed ingestion. Title and transcript are kept when the provider
    /// returned them, e.g. a video whose captions came back empty.
    pub fn failed(
        id: impl Into<String>,
        url: impl Into<String>,
        title: Option<String>,
        transcript: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title,
            transcript,
            analysis: None,
            status: VideoStatus::Error,
            error: Some(message.into()),
            updated_at: Utc::now(),
        }
    }

    /// Consumes a fetched record and returns its analyzed successor.
    pub fn into_analyzed(self, analysis: Analysis) -> Self {
        Self {
            analysis: Some(analysis),
            status: VideoStatus::Analyzed,
            error: None,
            updated_at: Utc::now(),
            ..self
        }
    }

    pub fn is_analyzed(&self) -> bool {
        self.status == VideoStatus::Analyzed && self.analysis.is_some()
    }

    pub fn has_transcript(&self) -> bool {
        self.transcript.as_deref().is_some_and(|t| !t.is_empty())
    }
}
