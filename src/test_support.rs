// In-memory collaborators for unit tests

use async_trait::async_trait;
use dashmap::DashMap;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::core::errors::{
    FetchError, FetchResult, OcrError, OcrResult, TranslationError, TranslationResult,
};
use crate::core::types::{BoundingBox, FetchedImage, OcrBlock, PageUrl};
use crate::pipeline::PagePipeline;
use crate::services::ocr::{OcrEngine, RegionExtractor};
use crate::services::relay::ImageRelay;
use crate::services::translation::{TranslationBatch, TranslationEngine};
use crate::utils::Metrics;

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([255, 255, 255, 255]),
    ));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

pub fn block(text: &str, x0: f64, y0: f64) -> OcrBlock {
    OcrBlock {
        text: text.to_string(),
        bbox: BoundingBox::new(x0, y0, x0 + 50.0, y0 + 20.0).unwrap(),
    }
}

pub fn page_urls(n: usize) -> Vec<PageUrl> {
    (0..n)
        .map(|i| PageUrl::new(format!("https://img.test/{}.png", i)))
        .collect()
}

/// Serves a generated PNG for every URL. URLs can be made to fail or to
/// block until released.
#[derive(Default)]
pub struct FakeRelay {
    failing: DashMap<String, ()>,
    gates: DashMap<String, Arc<Notify>>,
    calls: DashMap<String, usize>,
    total: AtomicUsize,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, url: &PageUrl) {
        self.failing.insert(url.to_string(), ());
    }

    pub fn heal(&self, url: &PageUrl) {
        self.failing.remove(url.as_str());
    }

    /// Hold fetches of `url` until the returned handle is notified.
    pub fn gate(&self, url: &PageUrl) -> Arc<Notify> {
        self.gates
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    pub fn calls(&self, url: &PageUrl) -> usize {
        self.calls.get(url.as_str()).map(|c| *c).unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageRelay for FakeRelay {
    async fn fetch(&self, url: &PageUrl) -> FetchResult<FetchedImage> {
        *self.calls.entry(url.to_string()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.get(url.as_str()).map(|g| g.clone());
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.contains_key(url.as_str()) {
            return Err(FetchError::Status {
                status: 404,
                url: url.to_string(),
            });
        }

        Ok(FetchedImage {
            bytes: png_bytes(200, 300),
            content_type: "image/png".to_string(),
        })
    }
}

pub struct FakeOcr {
    pub blocks: Vec<OcrBlock>,
    pub fail: bool,
}

impl FakeOcr {
    pub fn with_blocks(blocks: Vec<OcrBlock>) -> Self {
        Self {
            blocks,
            fail: false,
        }
    }
}

#[async_trait]
impl OcrEngine for FakeOcr {
    async fn recognize(&self, _image: &[u8], _language: &str) -> OcrResult<Vec<OcrBlock>> {
        if self.fail {
            return Err(OcrError::EngineFailed {
                code: Some(1),
                stderr: "fake engine failure".to_string(),
            });
        }
        Ok(self.blocks.clone())
    }
}

/// Prefixes every text with `EN:`. `keep` limits how many translations come back.
#[derive(Default)]
pub struct FakeTranslator {
    pub keep: Option<usize>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeTranslator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationEngine for FakeTranslator {
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TranslationError::MalformedResponse("fake".to_string()));
        }
        let keep = self.keep.unwrap_or(texts.len());
        Ok(texts.iter().take(keep).map(|t| format!("EN:{}", t)).collect())
    }
}

pub fn pipeline(
    relay: Arc<FakeRelay>,
    ocr: FakeOcr,
    translator: Arc<FakeTranslator>,
    metrics: Metrics,
) -> PagePipeline {
    PagePipeline::new(
        relay,
        RegionExtractor::new(Arc::new(ocr), "jpn"),
        TranslationBatch::new(translator),
        metrics,
    )
}
