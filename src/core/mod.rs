pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ChapterError, ConfigError, FetchError, OcrError, PageFailure, PipelineError,
    ResolutionError, RunError, SchedulerError, TranslationError,
};
pub use types::{
    BoundingBox, Chapter, PageData, PageRecord, PageStatus, PageUrl, PipelineStage, TextRegion,
    TranslatedRegion,
};
