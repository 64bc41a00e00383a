// Page-level translation: one engine call per page, aligned by index

use std::sync::Arc;
use tracing::{instrument, warn};

use super::TranslationEngine;
use crate::core::errors::{TranslationError, TranslationResult};

#[derive(Clone)]
pub struct TranslationBatch {
    engine: Arc<dyn TranslationEngine>,
}

impl TranslationBatch {
    pub fn new(engine: Arc<dyn TranslationEngine>) -> Self {
        Self { engine }
    }

    /// Translate all of a page's texts together. The result always has
    /// exactly `texts.len()` entries.
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    pub async fn translate(&self, texts: &[String]) -> TranslationResult<Vec<String>> {
        if texts.is_empty() {
            return Err(TranslationError::EmptyBatch);
        }

        let raw = self.engine.translate(texts).await?;
        Ok(normalize_translations(raw, texts.len()))
    }
}

/// Pad missing entries with empty strings and drop extras.
pub fn normalize_translations(mut raw: Vec<String>, expected: usize) -> Vec<String> {
    if raw.len() != expected {
        warn!(
            "Translation count mismatch: expected {}, got {}",
            expected,
            raw.len()
        );
        raw.resize(expected, String::new());
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: Vec<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TranslationEngine for Canned {
        async fn translate(&self, _texts: &[String]) -> TranslationResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn texts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{}", i)).collect()
    }

    #[test]
    fn test_normalize_pads_and_truncates() {
        let short = normalize_translations(vec!["a".into()], 3);
        assert_eq!(short, vec!["a".to_string(), String::new(), String::new()]);

        let long = normalize_translations(vec!["a".into(), "b".into(), "c".into()], 2);
        assert_eq!(long, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_single_call_per_batch() {
        let engine = Arc::new(Canned {
            reply: vec!["A".into(), "B".into()],
            calls: AtomicUsize::new(0),
        });
        let batch = TranslationBatch::new(engine.clone());

        let out = batch.translate(&texts(2)).await.unwrap();
        assert_eq!(out, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected_without_call() {
        let engine = Arc::new(Canned {
            reply: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let batch = TranslationBatch::new(engine.clone());

        assert!(matches!(
            batch.translate(&[]).await,
            Err(TranslationError::EmptyBatch)
        ));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }
}
