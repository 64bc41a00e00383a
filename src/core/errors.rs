// Error types for the reader core
//
// Collaborator failures (fetch, resolution, OCR, translation) each get their
// own enum. A page pipeline collapses them into a single PipelineError that
// remembers the stage it failed in.

use thiserror::Error;

use crate::core::types::PipelineStage;

/// Image relay errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Image request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Image host responded with status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Invalid image URL: {0}")]
    InvalidUrl(String),
}

/// Chapter resolver errors
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("Could not extract chapter identifier from URL")]
    MissingIdentifier,

    #[error("Malformed chapter API response: {0}")]
    MalformedResponse(String),

    #[error("Chapter API request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// OCR engine errors
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Failed to start OCR engine: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("OCR engine exited with code {code:?}: {stderr}")]
    EngineFailed { code: Option<i32>, stderr: String },

    #[error("Unreadable OCR output: {0}")]
    InvalidOutput(String),

    #[error("OCR engine I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Translation engine errors
#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("Translation batch must contain at least one text")]
    EmptyBatch,

    #[error("No translation API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Translation API responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed translation response: {0}")]
    MalformedResponse(String),
}

/// Native dimension probing errors
#[derive(Debug, Error)]
pub enum ImageProbeError {
    #[error("Could not read image header: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine image dimensions: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image probe task failed: {0}")]
    Join(String),
}

/// Any failure that can end a page pipeline run
#[derive(Debug, Error)]
pub enum PageFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Image(#[from] ImageProbeError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Translation(#[from] TranslationError),
}

/// A failed page pipeline run. Partial results are never attached.
#[derive(Debug, Error)]
#[error("Page {page_index} failed while {stage}: {source}")]
pub struct PipelineError {
    pub page_index: usize,
    pub stage: PipelineStage,
    #[source]
    pub source: PageFailure,
}

impl PipelineError {
    pub fn new(page_index: usize, stage: PipelineStage, source: impl Into<PageFailure>) -> Self {
        Self {
            page_index,
            stage,
            source: source.into(),
        }
    }
}

/// Outcome error delivered to the scheduler when a run settles
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Pipeline task for page {index} aborted: {reason}")]
    Aborted { index: usize, reason: String },
}

/// Chapter load errors. These abort the load before any page record exists.
#[derive(Debug, Error)]
pub enum ChapterError {
    #[error("Chapter input is empty")]
    EmptyInput,

    #[error("Start page {start} is after end page {end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("Page range {start}..={end} exceeds the limit of {max} pages")]
    RangeTooLarge { start: u32, end: u32, max: u32 },

    #[error("Could not generate or find any image URLs")]
    NoPages,

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// Scheduler handle errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler coordinator has stopped")]
    Stopped,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Server port must be non-zero")]
    InvalidPort,

    #[error("{0} must be greater than zero")]
    InvalidTimeout(&'static str),

    #[error("{0} must not be empty")]
    EmptyValue(&'static str),

    #[error("{key} is not a valid URL: {value}")]
    InvalidUrl { key: &'static str, value: String },
}

pub type FetchResult<T> = Result<T, FetchError>;
pub type OcrResult<T> = Result<T, OcrError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
