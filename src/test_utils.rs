use crate::records::{Analysis, Issue, Location, VideoRecord};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize test logging in a thread-safe way.
/// Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .finish();

        // Another harness may already have installed one.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

pub fn issue(title: &str, category: &str) -> Issue {
    Issue {
        title: title.to_string(),
        description: format!("{title} discussed"),
        category: Some(category.to_string()),
    }
}

pub fn location(city: &str, state: &str) -> Location {
    Location {
        city: Some(city.to_string()),
        county: None,
        state: Some(state.to_string()),
    }
}

/// An analyzed record as the pipeline would have stored it.
pub fn analyzed_record(id: &str, analysis: Analysis) -> VideoRecord {
    VideoRecord::fetched(
        id,
        format!("https://youtu.be/{id}"),
        Some(format!("Meeting {id}")),
        "transcript text".to_string(),
    )
    .into_analyzed(analysis)
}

/// Shorthand for an analyzed meeting at a place and date.
pub fn meeting(
    id: &str,
    place: Option<Location>,
    date: Option<&str>,
    issues: Vec<Issue>,
) -> VideoRecord {
    analyzed_record(
        id,
        Analysis {
            summary: format!("Summary of {id}"),
            issues,
            meeting_date: date.map(String::from),
            meeting_type: Some("City Council".to_string()),
            location: place,
        },
    )
}
