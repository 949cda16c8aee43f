use crate::openai::{real::maybe_create_openai_client, OpenAIClientTrait};
use crate::store::{FileStore, RecordStore};
use crate::transcripts::{
    real::maybe_create_transcript_provider, TranscriptProviderTrait,
};
use std::sync::Arc;
use tracing::{info, warn};

pub mod analysis;
pub mod app;
pub mod error;
pub mod ingest;
pub mod openai;
pub mod prompts;
pub mod records;
pub mod report;
pub mod store;
pub mod transcripts;
pub mod video_id;

pub mod test_utils;

pub use error::PipelineError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_TRANSCRIPT_CHAR_LIMIT: usize = 30_000;

// Shared by every request; the store is the only mutable state.
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub transcript_provider: Option<Arc<dyn TranscriptProviderTrait>>,
    pub openai_client: Option<Arc<dyn OpenAIClientTrait>>,
    pub analysis_model: String,
    pub report_model: String,
    pub transcript_char_limit: usize,
    // Keeps the test data directory alive as long as the state
    #[allow(dead_code)]
    temp_data_dir: Option<tempfile::TempDir>,
}

impl AppState {
    pub async fn new_for_testing() -> Self {
        Self::new_for_testing_with_clients(None, None).await
    }

    /// Test state backed by a file store in a fresh temporary directory.
    pub async fn new_for_testing_with_clients(
        openai_client: Option<Arc<dyn OpenAIClientTrait>>,
        transcript_provider: Option<Arc<dyn TranscriptProviderTrait>>,
    ) -> Self {
        let temp_dir =
            tempfile::tempdir().expect("Failed to create temporary data dir");
        let store = FileStore::new(temp_dir.path())
            .await
            .expect("Failed to create file store");

        Self {
            store: Arc::new(store),
            transcript_provider,
            openai_client,
            analysis_model: "test-analysis-model".to_string(),
            report_model: "test-report-model".to_string(),
            transcript_char_limit: DEFAULT_TRANSCRIPT_CHAR_LIMIT,
            temp_data_dir: Some(temp_dir),
        }
    }
}

// Create a config struct to hold AppState configuration
pub struct AppConfig {
    pub store: Arc<dyn RecordStore>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub transcript_languages: Vec<String>,
    pub analysis_model: String,
    pub report_model: String,
    pub transcript_char_limit: usize,
}

pub fn create_app_state(config: AppConfig) -> Arc<AppState> {
    let openai_client = match maybe_create_openai_client(
        config.openai_api_key,
        config.openai_api_base,
    ) {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Failed to create OpenAI client: {}", e);
            None
        }
    };

    let transcript_provider =
        maybe_create_transcript_provider(config.transcript_languages);

    info!(
        "Using {} store, analysis model {}, report model {}",
        config.store.backend_name(),
        config.analysis_model,
        config.report_model
    );

    Arc::new(AppState {
        store: config.store,
        transcript_provider,
        openai_client,
        analysis_model: config.analysis_model,
        report_model: config.report_model,
        transcript_char_limit: config.transcript_char_limit,
        temp_data_dir: None,
    })
}
