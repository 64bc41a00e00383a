// Data model for chapters, page records and recognized text regions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::core::errors::ChapterError;

/// Source image location of one page. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageUrl(String);

impl PageUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered, non-empty list of page URLs. Index order is navigation order.
///
/// A chapter is never mutated after construction; loading another chapter
/// replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chapter {
    pages: Arc<[PageUrl]>,
}

impl Chapter {
    pub fn new(pages: Vec<PageUrl>) -> Result<Self, ChapterError> {
        if pages.is_empty() {
            return Err(ChapterError::NoPages);
        }
        Ok(Self {
            pages: pages.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PageUrl> {
        self.pages.get(index)
    }

    pub fn pages(&self) -> &[PageUrl] {
        &self.pages
    }
}

/// Axis-aligned box in native image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    /// Returns `None` for degenerate boxes (`x0 >= x1` or `y0 >= y1`).
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Option<Self> {
        if x0 < x1 && y0 < y1 {
            Some(Self { x0, y0, x1, y1 })
        } else {
            None
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Raw block reported by an OCR engine, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrBlock {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Recognized block of source-language text. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRegion {
    text: String,
    bbox: BoundingBox,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Option<Self> {
        let text = text.into();
        if text.is_empty() {
            None
        } else {
            Some(Self { text, bbox })
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// A text region paired with its translation (possibly empty).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslatedRegion {
    pub text: String,
    pub bbox: BoundingBox,
    pub translation: String,
}

impl TranslatedRegion {
    pub fn new(region: TextRegion, translation: String) -> Self {
        Self {
            text: region.text,
            bbox: region.bbox,
            translation,
        }
    }
}

/// Image bytes as returned by the image relay.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Result of one successful page pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    /// `data:` URI of the original image
    pub original_image: String,
    pub regions: Vec<TranslatedRegion>,
    pub native_width: u32,
    pub native_height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    Pending,
    Loading,
    Done,
    Error,
}

/// Per-page state owned by the scheduler.
///
/// Records are replaced whole, never patched field by field. The payload
/// fields are only present for `Done`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRecord {
    pub status: PageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_image: Option<Arc<str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Arc<[TranslatedRegion]>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_height: Option<u32>,
}

impl PageRecord {
    fn bare(status: PageStatus) -> Self {
        Self {
            status,
            original_image: None,
            regions: None,
            native_width: None,
            native_height: None,
        }
    }

    pub fn pending() -> Self {
        Self::bare(PageStatus::Pending)
    }

    pub fn loading() -> Self {
        Self::bare(PageStatus::Loading)
    }

    pub fn error() -> Self {
        Self::bare(PageStatus::Error)
    }

    pub fn done(data: PageData) -> Self {
        Self {
            status: PageStatus::Done,
            original_image: Some(data.original_image.into()),
            regions: Some(data.regions.into()),
            native_width: Some(data.native_width),
            native_height: Some(data.native_height),
        }
    }

    pub fn region_count(&self) -> Option<usize> {
        self.regions.as_ref().map(|r| r.len())
    }
}

/// Stages of a single page pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Fetching,
    Extracting,
    Translating,
    Assembling,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Fetching => "fetching",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Translating => "translating",
            PipelineStage::Assembling => "assembling",
        };
        f.write_str(name)
    }
}
