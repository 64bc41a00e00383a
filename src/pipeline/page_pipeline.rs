// Page Pipeline: fetch -> extract -> translate -> assemble for a single page

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::core::errors::{PipelineError, PipelineResult};
use crate::core::types::{PageData, PageUrl, PipelineStage, TranslatedRegion};
use crate::services::ocr::RegionExtractor;
use crate::services::relay::ImageRelay;
use crate::services::translation::TranslationBatch;
use crate::utils::{encode_data_uri, probe_dimensions_async, Metrics};

/// Turns one page URL into fully translated page data.
///
/// A run either yields complete [`PageData`] or a single [`PipelineError`]
/// naming the stage that failed. The pipeline holds no per-page state, so one
/// instance serves every run concurrently.
pub struct PagePipeline {
    relay: Arc<dyn ImageRelay>,
    extractor: RegionExtractor,
    translator: TranslationBatch,
    metrics: Metrics,
}

impl PagePipeline {
    pub fn new(
        relay: Arc<dyn ImageRelay>,
        extractor: RegionExtractor,
        translator: TranslationBatch,
        metrics: Metrics,
    ) -> Self {
        Self {
            relay,
            extractor,
            translator,
            metrics,
        }
    }

    #[instrument(skip(self), fields(url = %url))]
    pub async fn run(&self, index: usize, url: &PageUrl) -> PipelineResult<PageData> {
        let run_start = Instant::now();

        // Stage 1: fetch and probe native dimensions
        let stage_start = Instant::now();
        let image = self
            .relay
            .fetch(url)
            .await
            .map_err(|e| PipelineError::new(index, PipelineStage::Fetching, e))?;
        let content_type = image.content_type;
        let bytes = Arc::new(image.bytes);
        let (native_width, native_height) = probe_dimensions_async(bytes.clone())
            .await
            .map_err(|e| PipelineError::new(index, PipelineStage::Fetching, e))?;
        self.metrics
            .record_stage_duration(PipelineStage::Fetching, stage_start.elapsed());
        debug!(
            "Page {}: fetched {} bytes, {}x{}",
            index,
            bytes.len(),
            native_width,
            native_height
        );

        // Stage 2: OCR
        let stage_start = Instant::now();
        let regions = self
            .extractor
            .extract(&bytes)
            .await
            .map_err(|e| PipelineError::new(index, PipelineStage::Extracting, e))?;
        self.metrics
            .record_stage_duration(PipelineStage::Extracting, stage_start.elapsed());
        debug!("Page {}: {} text regions", index, regions.len());

        // Stage 3: translation, skipped for pages without text
        let translations = if regions.is_empty() {
            Vec::new()
        } else {
            let stage_start = Instant::now();
            let texts: Vec<String> = regions.iter().map(|r| r.text().to_string()).collect();
            let translations = self
                .translator
                .translate(&texts)
                .await
                .map_err(|e| PipelineError::new(index, PipelineStage::Translating, e))?;
            self.metrics
                .record_stage_duration(PipelineStage::Translating, stage_start.elapsed());
            translations
        };

        // Stage 4: assemble
        let regions: Vec<TranslatedRegion> = regions
            .into_iter()
            .zip(translations.into_iter().chain(std::iter::repeat(String::new())))
            .map(|(region, translation)| TranslatedRegion::new(region, translation))
            .collect();

        info!(
            "Page {} done in {:.2}s ({} regions)",
            index,
            run_start.elapsed().as_secs_f64(),
            regions.len()
        );

        Ok(PageData {
            original_image: encode_data_uri(&content_type, &bytes),
            regions,
            native_width,
            native_height,
        })
    }
}
