pub mod api_client;
pub mod batch;

use async_trait::async_trait;

use crate::core::errors::TranslationResult;

pub use api_client::ApiClient;
pub use batch::{normalize_translations, TranslationBatch};

/// Translates an ordered batch of source texts in one call.
///
/// Implementations return one entry per input where they can; the caller
/// reconciles the length.
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>>;
}
