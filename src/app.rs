use crate::analysis;
use crate::error::PipelineError;
use crate::ingest::{self, IngestResult};
use crate::records::VideoStatus;
use crate::report::{self, ReportFilters};
use crate::store::{open_store, S3Config, StoreConfig};
use crate::AppState;
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::compression::predicate::SizeAbove;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{prelude::*, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

// Add build-time information
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// Blob store when a bucket is configured, files otherwise
    Auto,
    File,
    S3,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "civic_digest_server")]
#[command(about = "Meeting transcript ingestion, analysis and reporting")]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3010)]
    pub port: u16,

    /// Where records are kept
    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Auto)]
    pub store_backend: StoreBackend,

    /// Directory for the file store
    #[arg(long, env = "DATA_DIR", default_value = ".data")]
    pub data_dir: PathBuf,

    /// Bucket for the blob store
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix inside the bucket
    #[arg(long, env = "S3_PREFIX", default_value = "video-analysis/")]
    pub s3_prefix: String,

    /// Region of the bucket, defaults to the AWS provider chain
    #[arg(long, env = "AWS_REGION")]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO server
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// API key for the OpenAI compatible LLM endpoint
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI compatible LLM endpoint
    #[arg(long, env = "OPENAI_API_BASE")]
    pub openai_api_base: Option<String>,

    /// Model used to analyze transcripts
    #[arg(long, env = "ANALYSIS_MODEL", default_value = crate::DEFAULT_MODEL)]
    pub analysis_model: String,

    /// Model used to write reports
    #[arg(long, env = "REPORT_MODEL", default_value = crate::DEFAULT_MODEL)]
    pub report_model: String,

    /// Transcript characters sent to the model
    #[arg(long, env = "TRANSCRIPT_CHAR_LIMIT", default_value_t = crate::DEFAULT_TRANSCRIPT_CHAR_LIMIT)]
    pub transcript_char_limit: usize,

    /// Preferred caption languages, most preferred first
    #[arg(
        long,
        env = "TRANSCRIPT_LANGUAGES",
        value_delimiter = ',',
        default_value = "en"
    )]
    pub transcript_languages: Vec<String>,

    /// Also append JSON log lines to this file
    #[arg(long, env = "REQUEST_LOG")]
    pub request_log: Option<PathBuf>,
}

impl Args {
    /// Picks the store backend once, from flags and environment.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let use_s3 = match self.store_backend {
            StoreBackend::Auto => self.s3_bucket.is_some(),
            StoreBackend::File => false,
            StoreBackend::S3 => true,
        };
        if !use_s3 {
            return Ok(StoreConfig::File {
                data_dir: self.data_dir.clone(),
            });
        }
        let bucket = self.s3_bucket.clone().ok_or_else(|| {
            anyhow!("--s3-bucket is required for the s3 store backend")
        })?;
        Ok(StoreConfig::S3(S3Config {
            bucket,
            prefix: self.s3_prefix.clone(),
            region: self.s3_region.clone(),
            endpoint: self.s3_endpoint.clone(),
        }))
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("Request failed: {:#}", self);
            "Internal Server Error".to_string()
        } else {
            debug!("Request rejected: {}", self);
            self.to_string()
        };
        let mut body = json!({ "error": message });
        if let Some(code) = self.code() {
            body["code"] = json!(code);
        }
        (status, Json(body)).into_response()
    }
}

/// Decodes a JSON request body; an empty body yields the default value.
fn parse_body<T: DeserializeOwned + Default>(
    body: &Bytes,
) -> Result<T, PipelineError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        PipelineError::InvalidInput(format!("Invalid JSON body: {}", e))
    })
}

// Health check endpoint
#[instrument]
pub async fn health_check() -> &'static str {
    debug!("Health check requested");
    "OK"
}

#[derive(Debug, Default, Deserialize)]
struct IngestRequest {
    urls: Option<Value>,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    results: Vec<IngestResult>,
}

fn urls_from_request(request: IngestRequest) -> Result<Vec<String>, PipelineError> {
    let invalid = || {
        PipelineError::InvalidInput(
            "Invalid input: 'urls' must be an array".to_string(),
        )
    };
    match request.urls {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(url) => Ok(url),
                _ => Err(invalid()),
            })
            .collect(),
        _ => Err(invalid()),
    }
}

#[axum::debug_handler]
async fn ingest_videos(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, PipelineError> {
    let urls = urls_from_request(parse_body(&body)?)?;
    let results = ingest::ingest_urls(&state, &urls).await?;
    Ok(Json(IngestResponse { results }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    video_id: Option<String>,
}

#[axum::debug_handler]
async fn analyze_video(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, PipelineError> {
    let request: AnalyzeRequest = parse_body(&body)?;
    let video_id = request
        .video_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::InvalidInput("Video ID is required".to_string())
        })?;
    let record = analysis::analyze_video(&state, &video_id).await?;
    Ok(Json(record))
}

#[derive(Debug, Default, Deserialize)]
struct ReportRequest {
    #[serde(default)]
    filters: Option<ReportFilters>,
    #[serde(default)]
    html: bool,
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    report: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<String>,
}

#[axum::debug_handler]
async fn generate_report(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ReportResponse>, PipelineError> {
    let request: ReportRequest = parse_body(&body)?;
    let filters = request.filters.unwrap_or_default();
    let report = report::generate_report(&state, &filters).await?;
    let html = request.html.then(|| markdown::to_html(&report));
    Ok(Json(ReportResponse { report, html }))
}

#[derive(Debug, Default, Deserialize)]
struct QuickAnalyzeRequest {
    url: Option<String>,
}

#[axum::debug_handler]
async fn quick_analyze(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, PipelineError> {
    let request: QuickAnalyzeRequest = parse_body(&body)?;
    let url = request.url.unwrap_or_default();
    let result = analysis::quick_analyze(&state, &url).await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    version: &'static str,
    commit: Option<&'static str>,
    store_backend: &'static str,
    total: usize,
    by_status: BTreeMap<&'static str, usize>,
}

#[axum::debug_handler]
async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, PipelineError> {
    let records = state.store.list().await?;
    let mut by_status: BTreeMap<&'static str, usize> = [
        VideoStatus::Queued,
        VideoStatus::Fetched,
        VideoStatus::Analyzed,
        VideoStatus::Error,
    ]
    .iter()
    .map(|status| (status.as_str(), 0))
    .collect();
    for record in &records {
        *by_status.entry(record.status.as_str()).or_default() += 1;
    }

    Ok(Json(StatusResponse {
        version: built_info::PKG_VERSION,
        commit: built_info::GIT_COMMIT_HASH_SHORT,
        store_backend: state.store.backend_name(),
        total: records.len(),
        by_status,
    }))
}

pub fn routes(state: Arc<AppState>) -> Router {
    // Reports and transcripts compress well, tiny error bodies don't.
    let compression_layer = CompressionLayer::new()
        .br(true)
        .deflate(true)
        .gzip(true)
        .zstd(true)
        .compress_when(SizeAbove::new(256));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/analyze", post(quick_analyze))
        .route("/api/research/ingest", post(ingest_videos))
        .route("/api/research/analyze", post(analyze_video))
        .route("/api/research/generate-report", post(generate_report))
        .layer(compression_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Hierarchical console logging, plus JSON lines in `request_log` when
/// given.
pub fn init_tracing(request_log: Option<&Path>) -> Result<()> {
    let json_layer = match request_log {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(json_layer)
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

pub async fn serve() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.request_log.as_deref())?;

    info!("Starting civic digest service");

    let store = open_store(args.store_config()?).await?;
    let state = crate::create_app_state(crate::AppConfig {
        store,
        openai_api_key: args.openai_api_key,
        openai_api_base: args.openai_api_base,
        transcript_languages: args.transcript_languages,
        analysis_model: args.analysis_model,
        report_model: args.report_model,
        transcript_char_limit: args.transcript_char_limit,
    });

    let app = routes(state);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL-C, shutting down");
            }
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
