use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::TranslationEngine;
use crate::core::config::TranslationConfig;
use crate::core::errors::{TranslationError, TranslationResult};
use crate::utils::Metrics;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini `generateContent` client translating a page's texts in one request
pub struct ApiClient {
    config: TranslationConfig,
    http_client: reqwest::Client,
    metrics: Option<Metrics>,
}

impl ApiClient {
    pub fn new(config: TranslationConfig, metrics: Option<Metrics>) -> TranslationResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.api_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            http_client,
            metrics,
        })
    }

    /// The key travels in the `x-goog-api-key` header, never in the URL
    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Request body for one batch of texts
    pub fn build_request(&self, texts: &[String]) -> Value {
        let prompt = format!(
            "You are an expert manga translator. Translate the following text blocks into \
             natural-sounding {}. Maintain the original order and provide the translation in a \
             clean JSON array of strings, with no other text or markdown.",
            self.config.target_language
        );

        json!({
            "system_instruction": {
                "parts": [{"text": prompt}]
            },
            "contents": [{
                "role": "user",
                "parts": [{"text": Value::from(texts.to_vec()).to_string()}]
            }],
            "generationConfig": {
                "response_mime_type": "application/json",
                "response_schema": {
                    "type": "array",
                    "items": {"type": "string"}
                }
            },
            "safetySettings": [
                {"category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_NONE"},
                {"category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_NONE"}
            ]
        })
    }

    async fn send(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(TranslationError::MissingApiKey)?;

        let response = self
            .http_client
            .post(self.endpoint())
            .header(API_KEY_HEADER, api_key)
            .json(&self.build_request(texts))
            .send()
            .await
            .map_err(|e| TranslationError::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranslationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::MalformedResponse(e.to_string()))?;

        let text = body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| {
                TranslationError::MalformedResponse("missing candidate text".to_string())
            })?;

        parse_translation_array(text)
    }
}

#[async_trait]
impl TranslationEngine for ApiClient {
    #[instrument(skip(self, texts), fields(count = texts.len(), model = %self.config.model))]
    async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        let start = Instant::now();
        let result = self.send(texts).await;

        if let Some(ref m) = self.metrics {
            m.record_translation_call(result.is_ok());
        }

        match &result {
            Ok(translations) => debug!(
                "Translated {} texts in {:.2}s",
                translations.len(),
                start.elapsed().as_secs_f64()
            ),
            Err(e) => warn!("Translation request failed: {}", e),
        }

        result
    }
}

/// Parse the model's reply, tolerating a markdown code fence around it.
/// Non-string elements become empty translations.
pub fn parse_translation_array(text: &str) -> TranslationResult<Vec<String>> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let value: Value = serde_json::from_str(cleaned.trim())
        .map_err(|e| TranslationError::MalformedResponse(e.to_string()))?;

    let items = value.as_array().ok_or_else(|| {
        TranslationError::MalformedResponse("expected a JSON array of strings".to_string())
    })?;

    Ok(items
        .iter()
        .map(|item| item.as_str().unwrap_or_default().to_string())
        .collect())
}
