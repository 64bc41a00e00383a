// Comick chapter resolver: chapter page URL -> page image URLs

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use super::ChapterResolver;
use crate::core::config::{ChapterConfig, RelayConfig};
use crate::core::errors::ResolutionError;
use crate::core::types::PageUrl;

/// Segment marker of the chapter id, e.g. `/comic/slug/AbC12-chapter-3-en`
const CHAPTER_ID_MARKER: &str = "-chapter-";

pub struct ComickResolver {
    http_client: reqwest::Client,
    api_base: String,
    image_base_url: String,
}

impl ComickResolver {
    pub fn new(config: &ChapterConfig, relay: &RelayConfig) -> Result<Self, ResolutionError> {
        let http_client = reqwest::Client::builder()
            .user_agent(relay.user_agent.clone())
            .timeout(relay.fetch_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            image_base_url: config.image_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChapterResolver for ComickResolver {
    #[instrument(skip(self))]
    async fn resolve(&self, chapter_url: &str) -> Result<Vec<PageUrl>, ResolutionError> {
        let chapter_id = extract_chapter_id(chapter_url).ok_or(ResolutionError::MissingIdentifier)?;
        let api_url = format!("{}/chapter/{}", self.api_base, chapter_id);
        debug!("Requesting chapter data from {}", api_url);

        let response = self.http_client.get(&api_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ResolutionError::MalformedResponse(format!(
                "chapter API responded with status {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ResolutionError::MalformedResponse(e.to_string()))?;

        image_urls_from_response(&body, &self.image_base_url)
    }
}

/// Path segment carrying the chapter id.
pub fn extract_chapter_id(chapter_url: &str) -> Option<&str> {
    chapter_url
        .split('/')
        .find(|segment| segment.contains(CHAPTER_ID_MARKER))
}

/// Read `chapter.md_images[].b2key` and prefix each key with the image host.
pub fn image_urls_from_response(
    body: &Value,
    image_base_url: &str,
) -> Result<Vec<PageUrl>, ResolutionError> {
    let images = body["chapter"]["md_images"].as_array().ok_or_else(|| {
        ResolutionError::MalformedResponse("missing chapter.md_images array".to_string())
    })?;

    images
        .iter()
        .map(|image| {
            let key = image["b2key"].as_str().ok_or_else(|| {
                ResolutionError::MalformedResponse("image entry without b2key".to_string())
            })?;
            let key = key.trim_start_matches('/');
            Ok(PageUrl::new(format!("{}/{}", image_base_url, key)))
        })
        .collect()
}
