// Library exports for the manga overlay reader
//
// core: configuration, errors and the data model
// services: external collaborators (image relay, chapter resolver, OCR, translation)
// pipeline: per-page processing
// orchestration: page table and prefetch scheduler

pub mod core;
pub mod orchestration;
pub mod pipeline;
pub mod services;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types and functions
pub use core::{
    config::Config,
    errors::{
        ChapterError, ConfigError, FetchError, OcrError, PipelineError, ResolutionError,
        RunError, SchedulerError, TranslationError,
    },
    types::{Chapter, PageData, PageRecord, PageStatus, PageUrl, TranslatedRegion},
};

pub use orchestration::{ReaderSnapshot, Scheduler};
pub use pipeline::PagePipeline;

pub use services::{
    ApiClient, ChapterSource, ComickResolver, HttpImageRelay, RegionExtractor, TesseractEngine,
    TranslationBatch,
};

pub use utils::{layout_overlay, DisplayScale, Metrics, OverlayBox};
