// Image relay: fetches page images the way a browser would

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::Url;
use tracing::{debug, instrument};

use crate::core::config::RelayConfig;
use crate::core::errors::{FetchError, FetchResult};
use crate::core::types::{FetchedImage, PageUrl};
use crate::utils::image_ops::guess_content_type;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Fetches raw image bytes for a page URL.
#[async_trait]
pub trait ImageRelay: Send + Sync {
    async fn fetch(&self, url: &PageUrl) -> FetchResult<FetchedImage>;
}

/// reqwest-backed relay sending browser-like headers.
///
/// Image hosts commonly refuse hotlinked requests, so every request carries a
/// desktop `User-Agent` and a `Referer` pointing at the image's own origin.
pub struct HttpImageRelay {
    http_client: reqwest::Client,
}

impl HttpImageRelay {
    pub fn new(config: &RelayConfig) -> FetchResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .pool_max_idle_per_host(4)
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageRelay for HttpImageRelay {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &PageUrl) -> FetchResult<FetchedImage> {
        let parsed = Url::parse(url.as_str())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;

        let response = self
            .http_client
            .get(parsed.clone())
            .header(REFERER, referer_for(&parsed))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        let content_type = header_type
            .or_else(|| guess_content_type(&bytes).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        debug!("Fetched {} bytes ({})", bytes.len(), content_type);
        Ok(FetchedImage {
            bytes,
            content_type,
        })
    }
}

/// Origin of the image URL with a trailing slash.
pub fn referer_for(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}
