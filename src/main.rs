// Main entry point for the manga overlay reader

use manga_overlay::{
    core::Config,
    orchestration::{ReaderSnapshot, Scheduler},
    services::chapter::{DEFAULT_END_PAGE, DEFAULT_START_PAGE},
    services::{
        load_chapter, ApiClient, ChapterResolver, ChapterSource, ComickResolver, HttpImageRelay,
        RegionExtractor, TesseractEngine, TranslationBatch,
    },
    utils::{layout_overlay, DisplayScale, Metrics, OverlayBox},
    ChapterError, PagePipeline, PageRecord, PageStatus, SchedulerError,
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    scheduler: Scheduler,
    resolver: Arc<dyn ChapterResolver>,
    metrics: Metrics,
}

type ApiError = (StatusCode, String);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().context("Failed to load configuration")?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "manga_overlay={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== MANGA OVERLAY READER ===");
    info!(
        "Config: OCR={} ({}) Model={} Target={}",
        config.ocr.tesseract_path,
        config.ocr_language(),
        config.translation_model(),
        config.target_language()
    );
    if !config.has_api_key() {
        warn!("GEMINI_API_KEY is not set, every page with text will fail to translate");
    }

    // Initialize metrics
    let metrics = Metrics::new();

    // Wire the page pipeline
    let relay = Arc::new(HttpImageRelay::new(&config.relay).context("Failed to build image relay")?);
    let extractor = RegionExtractor::new(
        Arc::new(TesseractEngine::new(&config.ocr)),
        config.ocr_language(),
    );
    let translator = TranslationBatch::new(Arc::new(
        ApiClient::new(config.translation.clone(), Some(metrics.clone()))
            .context("Failed to build translation client")?,
    ));
    let pipeline = Arc::new(PagePipeline::new(relay, extractor, translator, metrics.clone()));

    let resolver: Arc<dyn ChapterResolver> = Arc::new(
        ComickResolver::new(&config.chapter, &config.relay)
            .context("Failed to build chapter resolver")?,
    );

    let state = AppState {
        config: config.clone(),
        scheduler: Scheduler::spawn(pipeline, metrics.clone()),
        resolver,
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/chapter", post(load_chapter_endpoint))
        .route("/navigate", post(navigate_endpoint))
        .route("/pages", get(pages_endpoint))
        .route("/pages/{index}", get(page_endpoint))
        .route("/pages/{index}/retry", post(retry_endpoint))
        .route("/pages/{index}/overlay", get(overlay_endpoint))
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                     - Root endpoint");
    info!("  GET  /health               - Health check");
    info!("  GET  /metrics              - Prometheus metrics");
    info!("  GET  /stats                - Detailed statistics");
    info!("  POST /chapter              - Load a chapter (pattern or chapter URL)");
    info!("  POST /navigate             - Set the current page");
    info!("  GET  /pages                - Page statuses");
    info!("  GET  /pages/:index         - Full page record");
    info!("  POST /pages/:index/retry   - Re-run a failed page");
    info!("  GET  /pages/:index/overlay - Overlay layout for a displayed width");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Manga Overlay Reader"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "translation_configured": state.config.has_api_key(),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.metrics.record_endpoint_request("/stats");
    let snapshot = state.metrics.snapshot();

    serde_json::to_value(&snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

#[derive(Debug, Deserialize)]
struct LoadChapterRequest {
    input: String,
    start_page: Option<u32>,
    end_page: Option<u32>,
}

#[derive(Debug, Serialize)]
struct LoadChapterResponse {
    pages: usize,
}

async fn load_chapter_endpoint(
    State(state): State<AppState>,
    Json(request): Json<LoadChapterRequest>,
) -> Result<Json<LoadChapterResponse>, ApiError> {
    state.metrics.record_endpoint_request("/chapter");

    let source = ChapterSource::parse(
        &request.input,
        request.start_page.unwrap_or(DEFAULT_START_PAGE),
        request.end_page.unwrap_or(DEFAULT_END_PAGE),
    )
    .map_err(chapter_error)?;

    let chapter = match load_chapter(&source, state.resolver.as_ref()).await {
        Ok(chapter) => {
            state.metrics.record_chapter_loaded(true);
            chapter
        }
        Err(e) => {
            state.metrics.record_chapter_loaded(false);
            error!("Chapter load failed: {}", e);
            return Err(chapter_error(e));
        }
    };

    let pages = chapter.len();
    state.scheduler.load_chapter(chapter).map_err(unavailable)?;
    Ok(Json(LoadChapterResponse { pages }))
}

#[derive(Debug, Deserialize)]
struct NavigateRequest {
    index: usize,
}

async fn navigate_endpoint(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<StatusCode, ApiError> {
    state.metrics.record_endpoint_request("/navigate");
    state.scheduler.navigate(request.index).map_err(unavailable)?;
    Ok(StatusCode::ACCEPTED)
}

async fn retry_endpoint(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<StatusCode, ApiError> {
    state.metrics.record_endpoint_request("/pages/retry");
    state.scheduler.retry(index).map_err(unavailable)?;
    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Serialize)]
struct PageSummary {
    index: usize,
    status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    regions: Option<usize>,
}

#[derive(Debug, Serialize)]
struct PagesResponse {
    generation: u64,
    current: usize,
    pages: Vec<PageSummary>,
}

/// Statuses only; image payloads are served per page.
async fn pages_endpoint(State(state): State<AppState>) -> Json<PagesResponse> {
    state.metrics.record_endpoint_request("/pages");
    let snapshot = state.scheduler.snapshot();

    Json(PagesResponse {
        generation: snapshot.generation,
        current: snapshot.current,
        pages: snapshot
            .pages
            .iter()
            .enumerate()
            .map(|(index, record)| PageSummary {
                index,
                status: record.status,
                regions: record.region_count(),
            })
            .collect(),
    })
}

async fn page_endpoint(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<PageRecord>, ApiError> {
    state.metrics.record_endpoint_request("/pages/index");
    let snapshot = state.scheduler.snapshot();
    page_record(&snapshot, index).cloned().map(Json)
}

#[derive(Debug, Deserialize)]
struct OverlayQuery {
    displayed_width: f64,
}

#[derive(Debug, Serialize)]
struct OverlayResponse {
    scale: f64,
    boxes: Vec<OverlayBox>,
}

async fn overlay_endpoint(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Query(query): Query<OverlayQuery>,
) -> Result<Json<OverlayResponse>, ApiError> {
    state.metrics.record_endpoint_request("/pages/overlay");
    let snapshot = state.scheduler.snapshot();
    let record = page_record(&snapshot, index)?;

    let (Some(regions), Some(native_width)) = (record.regions.as_ref(), record.native_width) else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Page {} is {:?}, no overlay yet", index, record.status),
        ));
    };

    // nothing to render until both widths are usable
    let Some(scale) = DisplayScale::from_widths(query.displayed_width, native_width) else {
        return Ok(Json(OverlayResponse {
            scale: 0.0,
            boxes: Vec::new(),
        }));
    };

    Ok(Json(OverlayResponse {
        scale: scale.factor(),
        boxes: layout_overlay(regions, scale),
    }))
}

fn page_record(snapshot: &ReaderSnapshot, index: usize) -> Result<&PageRecord, ApiError> {
    snapshot
        .page(index)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No page at index {}", index)))
}

fn chapter_error(e: ChapterError) -> ApiError {
    let status = match e {
        ChapterError::Resolution(_) => StatusCode::BAD_GATEWAY,
        ChapterError::NoPages => StatusCode::UNPROCESSABLE_ENTITY,
        ChapterError::EmptyInput
        | ChapterError::InvalidRange { .. }
        | ChapterError::RangeTooLarge { .. } => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

fn unavailable(e: SchedulerError) -> ApiError {
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
}
