//! One-shot page run: fetch, OCR and translate a single page image.
//! Run with: cargo run --release --bin translate_page -- <image_url>

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use manga_overlay::{
    core::Config,
    services::{ApiClient, HttpImageRelay, RegionExtractor, TesseractEngine, TranslationBatch},
    utils::Metrics,
    PagePipeline, PageUrl,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("manga_overlay=debug")
        .with_target(false)
        .init();

    let url = std::env::args()
        .nth(1)
        .context("usage: translate_page <image_url>")?;

    let config = Config::new().context("Failed to load configuration")?;
    let metrics = Metrics::new();

    let pipeline = PagePipeline::new(
        Arc::new(HttpImageRelay::new(&config.relay)?),
        RegionExtractor::new(
            Arc::new(TesseractEngine::new(&config.ocr)),
            config.ocr_language(),
        ),
        TranslationBatch::new(Arc::new(ApiClient::new(
            config.translation.clone(),
            Some(metrics.clone()),
        )?)),
        metrics,
    );

    info!("Running page pipeline for {}", url);
    let page = pipeline.run(0, &PageUrl::new(url)).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "native_width": page.native_width,
            "native_height": page.native_height,
            "regions": page.regions,
        }))?
    );

    Ok(())
}
