use crate::error::PipelineError;
use crate::openai::complete_prompt;
use crate::prompts::render_report_prompt;
use crate::records::{Analysis, Issue, VideoRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, instrument};

use crate::AppState;

pub const NO_ANALYZED_VIDEOS: &str = "No analyzed videos found.";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilters {
    pub category: Option<String>,
}

impl ReportFilters {
    /// The category to filter on; an empty string means no filter.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref().filter(|c| !c.is_empty())
    }
}

fn analysis_of(record: &VideoRecord) -> &Analysis {
    static EMPTY: Analysis = Analysis {
        summary: String::new(),
        issues: Vec::new(),
        meeting_date: None,
        meeting_type: None,
        location: None,
    };
    record.analysis.as_ref().unwrap_or(&EMPTY)
}

/// "state" followed by "city", empty strings for whatever is missing.
fn location_key(record: &VideoRecord) -> String {
    let location = analysis_of(record).location.as_ref();
    let state = location.and_then(|l| l.state.as_deref()).unwrap_or("");
    let city = location.and_then(|l| l.city.as_deref()).unwrap_or("");
    format!("{state}{city}")
}

fn meeting_date(record: &VideoRecord) -> &str {
    analysis_of(record).meeting_date.as_deref().unwrap_or("")
}

/// Location ascending, then most recent meeting first.
pub fn compare_records(a: &VideoRecord, b: &VideoRecord) -> Ordering {
    location_key(a)
        .cmp(&location_key(b))
        .then_with(|| meeting_date(b).cmp(meeting_date(a)))
}

/// Analyzed records, optionally restricted to those with at least one
/// issue in `category`, in report order.
pub fn select_records(
    records: Vec<VideoRecord>,
    category: Option<&str>,
) -> Vec<VideoRecord> {
    let mut selected: Vec<VideoRecord> = records
        .into_iter()
        .filter(VideoRecord::is_analyzed)
        .filter(|record| {
            category.map_or(true, |c| analysis_of(record).has_category(c))
        })
        .collect();
    selected.sort_by(compare_records);
    selected
}

fn issue_line(issue: &Issue) -> String {
    format!(
        "- [{}] {}: {}",
        issue.category.as_deref().unwrap_or("Uncategorized"),
        issue.title,
        issue.description
    )
}

/// Plain text block describing one meeting for the report prompt. With a
/// category only the matching issues are listed.
pub fn render_meeting_block(
    record: &VideoRecord,
    category: Option<&str>,
) -> String {
    let analysis = analysis_of(record);
    let location = match &analysis.location {
        Some(loc) => format!(
            "{}, {}",
            loc.city.as_deref().unwrap_or(""),
            loc.state.as_deref().unwrap_or("")
        ),
        None => "Unknown Location".to_string(),
    };
    let issues: Vec<String> = analysis
        .issues
        .iter()
        .filter(|issue| {
            category.map_or(true, |c| issue.category.as_deref() == Some(c))
        })
        .map(issue_line)
        .collect();

    format!(
        "Meeting: {}\nDate: {}\nLocation: {}\nType: {}\nIssues:\n{}",
        record.title.as_deref().unwrap_or("Untitled Meeting"),
        analysis.meeting_date.as_deref().unwrap_or("Unknown Date"),
        location,
        analysis.meeting_type.as_deref().unwrap_or("Unknown Type"),
        issues.join("\n")
    )
}

pub fn render_digest(records: &[VideoRecord], category: Option<&str>) -> String {
    records
        .iter()
        .map(|record| render_meeting_block(record, category))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the Markdown dashboard over every analyzed meeting.
///
/// Fails with `NotFound` before contacting the model when no video has been
/// analyzed yet. A category that matches none of them still produces a
/// report, written from an empty digest.
#[instrument(skip(state), err)]
pub async fn generate_report(
    state: &AppState,
    filters: &ReportFilters,
) -> Result<String, PipelineError> {
    let category = filters.category();

    let all = state.store.list().await?;
    let total = all.len();
    let analyzed: Vec<VideoRecord> =
        all.into_iter().filter(VideoRecord::is_analyzed).collect();
    info!("Found {} analyzed of {} videos", analyzed.len(), total);
    if analyzed.is_empty() {
        return Err(PipelineError::NotFound(NO_ANALYZED_VIDEOS.to_string()));
    }

    let relevant = select_records(analyzed, category);

    let digest = render_digest(&relevant, category);
    info!(
        "Reporting on {} videos, digest is {} bytes",
        relevant.len(),
        digest.len()
    );

    let client = state
        .openai_client
        .as_deref()
        .ok_or(PipelineError::LlmUnavailable)?;
    let prompt = render_report_prompt(&digest, category);
    complete_prompt(client, &state.report_model, &prompt)
        .await
        .map_err(PipelineError::ExternalService)
}
