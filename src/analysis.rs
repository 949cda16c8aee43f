use crate::error::PipelineError;
use crate::openai::{complete_prompt, OpenAIClientTrait};
use crate::prompts::{render_analysis_prompt, render_quick_analysis_prompt};
use crate::records::{null_as_default, Analysis, VideoRecord, VideoStatus};
use crate::video_id::extract_video_id;
use crate::AppState;
use anyhow::anyhow;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

pub const TRANSCRIPT_NOT_FOUND: &str =
    "Transcript not found. Please ingest first.";

/// Removes the Markdown code fences the model tends to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// First `limit` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Parses a model reply into `T` after fence stripping. Anything that is
/// not the expected JSON object is a parse failure, never a default.
pub fn parse_model_json<T: DeserializeOwned>(
    reply: &str,
) -> Result<T, PipelineError> {
    let value: serde_json::Value =
        serde_json::from_str(&strip_code_fences(reply))?;
    if !value.is_object() {
        return Err(PipelineError::Parse(serde::de::Error::custom(
            "expected a JSON object",
        )));
    }
    Ok(serde_json::from_value(value)?)
}

fn llm_client(state: &AppState) -> Result<&dyn OpenAIClientTrait, PipelineError> {
    state
        .openai_client
        .as_deref()
        .ok_or(PipelineError::LlmUnavailable)
}

/// Runs the LLM over a stored transcript and persists the analyzed record.
///
/// Already analyzed videos are returned as stored without calling the
/// model again. Concurrent calls for the same id may both reach the model;
/// the last write wins.
#[instrument(skip(state), err)]
pub async fn analyze_video(
    state: &AppState,
    video_id: &str,
) -> Result<VideoRecord, PipelineError> {
    let record = match state.store.get(video_id).await? {
        Some(record) if record.has_transcript() => record,
        _ => {
            return Err(PipelineError::NotFound(
                TRANSCRIPT_NOT_FOUND.to_string(),
            ))
        }
    };

    if record.status == VideoStatus::Analyzed {
        info!("Video {} already analyzed", video_id);
        return Ok(record);
    }

    let client = llm_client(state)?;
    let transcript = record.transcript.as_deref().unwrap_or_default();
    let prompt = render_analysis_prompt(truncate_chars(
        transcript,
        state.transcript_char_limit,
    ));

    info!(
        "Analyzing {} with {} ({} transcript chars)",
        video_id,
        state.analysis_model,
        transcript.chars().count()
    );
    let reply = complete_prompt(client, &state.analysis_model, &prompt)
        .await
        .map_err(PipelineError::ExternalService)?;
    let analysis: Analysis = parse_model_json(&reply).inspect_err(|e| {
        error!("Unparseable analysis for {}: {}", video_id, e);
    })?;

    let updated = record.into_analyzed(analysis);
    state.store.set(video_id, &updated).await?;
    info!("Stored analysis for {}", video_id);
    Ok(updated)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickIssue {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

/// Result of the stateless single-URL analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<QuickIssue>,
}

/// Fetches and analyzes one video without touching the store.
#[instrument(skip(state), err)]
pub async fn quick_analyze(
    state: &AppState,
    url: &str,
) -> Result<QuickAnalysis, PipelineError> {
    if url.trim().is_empty() {
        return Err(PipelineError::InvalidInput("URL is required".to_string()));
    }
    let video_id = extract_video_id(url).ok_or_else(|| {
        PipelineError::InvalidInput("Invalid YouTube URL".to_string())
    })?;

    let provider = state.transcript_provider.as_deref().ok_or_else(|| {
        PipelineError::Internal(anyhow!("Transcript provider not configured"))
    })?;
    let transcript = match provider.fetch_transcript(&video_id).await {
        Ok(transcript) => transcript.text(),
        Err(e) => {
            error!("Transcript fetch error for {}: {:#}", video_id, e);
            return Err(PipelineError::NoCaptions);
        }
    };
    if transcript.is_empty() {
        return Err(PipelineError::NoCaptions);
    }

    let client = llm_client(state)?;
    let prompt = render_quick_analysis_prompt(truncate_chars(
        &transcript,
        state.transcript_char_limit,
    ));
    let reply = complete_prompt(client, &state.analysis_model, &prompt)
        .await
        .map_err(PipelineError::ExternalService)?;
    parse_model_json(&reply)
}
