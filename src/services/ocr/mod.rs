// OCR Service Module - engine interface and region extraction

pub mod tesseract;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::errors::OcrResult;
use crate::core::types::{OcrBlock, TextRegion};

pub use tesseract::TesseractEngine;

/// Recognizes text blocks in an encoded page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &[u8], language: &str) -> OcrResult<Vec<OcrBlock>>;
}

/// Runs the OCR engine once per page and normalizes what it reports.
///
/// Manga dialogue has no meaningful whitespace, so every whitespace
/// character is removed; blocks left empty are dropped.
#[derive(Clone)]
pub struct RegionExtractor {
    engine: Arc<dyn OcrEngine>,
    language: String,
}

impl RegionExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, language: impl Into<String>) -> Self {
        Self {
            engine,
            language: language.into(),
        }
    }

    /// A page without text yields an empty list, not an error.
    #[instrument(skip(self, image), fields(bytes = image.len(), language = %self.language))]
    pub async fn extract(&self, image: &[u8]) -> OcrResult<Vec<TextRegion>> {
        let blocks = self.engine.recognize(image, &self.language).await?;
        let total = blocks.len();

        let regions: Vec<TextRegion> = blocks
            .into_iter()
            .filter_map(|block| TextRegion::new(normalize_text(&block.text), block.bbox))
            .collect();

        debug!("Kept {} of {} OCR blocks", regions.len(), total);
        Ok(regions)
    }
}

pub fn normalize_text(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::OcrError;
    use crate::core::types::BoundingBox;

    struct CannedEngine(Vec<OcrBlock>);

    #[async_trait]
    impl OcrEngine for CannedEngine {
        async fn recognize(&self, _image: &[u8], _language: &str) -> OcrResult<Vec<OcrBlock>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenEngine;

    #[async_trait]
    impl OcrEngine for BrokenEngine {
        async fn recognize(&self, _image: &[u8], _language: &str) -> OcrResult<Vec<OcrBlock>> {
            Err(OcrError::InvalidOutput("corrupt image".to_string()))
        }
    }

    fn block(text: &str, x0: f64) -> OcrBlock {
        OcrBlock {
            text: text.to_string(),
            bbox: BoundingBox::new(x0, 0.0, x0 + 10.0, 10.0).unwrap(),
        }
    }

    #[test]
    fn test_normalize_strips_all_whitespace() {
        assert_eq!(normalize_text(" こん にちは\n"), "こんにちは");
        // ideographic space
        assert_eq!(normalize_text("え\u{3000}っ"), "えっ");
        assert_eq!(normalize_text(" \t\n"), "");
    }

    #[tokio::test]
    async fn test_extract_drops_empty_blocks_and_keeps_order() {
        let engine = CannedEngine(vec![block("な に", 0.0), block("  ", 20.0), block("よ", 40.0)]);
        let extractor = RegionExtractor::new(Arc::new(engine), "jpn");

        let regions = extractor.extract(b"img").await.unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].text(), "なに");
        assert_eq!(regions[1].text(), "よ");
        assert_eq!(regions[1].bbox().x0, 40.0);
    }

    #[tokio::test]
    async fn test_extract_no_text_is_empty_list() {
        let extractor = RegionExtractor::new(Arc::new(CannedEngine(Vec::new())), "jpn");
        assert!(extractor.extract(b"img").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_propagates() {
        let extractor = RegionExtractor::new(Arc::new(BrokenEngine), "jpn");
        assert!(matches!(
            extractor.extract(b"img").await,
            Err(OcrError::InvalidOutput(_))
        ));
    }
}
