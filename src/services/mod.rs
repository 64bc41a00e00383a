pub mod chapter;
pub mod ocr;
pub mod relay;
pub mod translation;

// Re-export commonly used services
pub use chapter::{load_chapter, ChapterResolver, ChapterSource, ComickResolver};
pub use ocr::{OcrEngine, RegionExtractor, TesseractEngine};
pub use relay::{HttpImageRelay, ImageRelay};
pub use translation::{ApiClient, TranslationBatch, TranslationEngine};
