use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::PipelineStage;

/// Process-wide metrics for chapter loads, pipeline runs and external calls.
///
/// Cheap to clone; every clone records into the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Chapter Metrics
    chapters_loaded: AtomicUsize,
    chapter_load_failures: AtomicUsize,

    // Pipeline Metrics
    runs_started: AtomicUsize,
    runs_succeeded: AtomicUsize,
    runs_failed: AtomicUsize,
    regions_extracted: AtomicUsize,
    run_duration_ms: RwLock<Vec<u64>>,

    // Stage Metrics
    fetch_duration_ms: RwLock<Vec<u64>>,
    extract_duration_ms: RwLock<Vec<u64>>,
    translate_duration_ms: RwLock<Vec<u64>>,

    // Translation API Metrics
    translation_calls_total: AtomicUsize,
    translation_calls_failed: AtomicUsize,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                chapters_loaded: AtomicUsize::new(0),
                chapter_load_failures: AtomicUsize::new(0),
                runs_started: AtomicUsize::new(0),
                runs_succeeded: AtomicUsize::new(0),
                runs_failed: AtomicUsize::new(0),
                regions_extracted: AtomicUsize::new(0),
                run_duration_ms: RwLock::new(Vec::new()),
                fetch_duration_ms: RwLock::new(Vec::new()),
                extract_duration_ms: RwLock::new(Vec::new()),
                translate_duration_ms: RwLock::new(Vec::new()),
                translation_calls_total: AtomicUsize::new(0),
                translation_calls_failed: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Chapter Metrics
    pub fn record_chapter_loaded(&self, success: bool) {
        if success {
            self.inner.chapters_loaded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.chapter_load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Pipeline Metrics
    pub fn record_run_started(&self) {
        self.inner.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_finished(&self, success: bool, duration: Duration, regions: usize) {
        if success {
            self.inner.runs_succeeded.fetch_add(1, Ordering::Relaxed);
            self.inner.regions_extracted.fetch_add(regions, Ordering::Relaxed);
        } else {
            self.inner.runs_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.run_duration_ms.write().push(duration.as_millis() as u64);
    }

    pub fn record_stage_duration(&self, stage: PipelineStage, duration: Duration) {
        let bucket = match stage {
            PipelineStage::Fetching => &self.inner.fetch_duration_ms,
            PipelineStage::Extracting => &self.inner.extract_duration_ms,
            PipelineStage::Translating => &self.inner.translate_duration_ms,
            // assembly is in-memory, not worth tracking
            PipelineStage::Assembling => return,
        };
        bucket.write().push(duration.as_millis() as u64);
    }

    // Translation API Metrics
    pub fn record_translation_call(&self, success: bool) {
        self.inner.translation_calls_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.translation_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Endpoint Metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let run_durations = self.inner.run_duration_ms.read();
        let run_avg = avg(&run_durations);
        let run_p50 = percentile(&run_durations, 0.5);
        let run_p95 = percentile(&run_durations, 0.95);
        drop(run_durations);

        let fetch_avg = avg(&self.inner.fetch_duration_ms.read());
        let extract_avg = avg(&self.inner.extract_duration_ms.read());
        let translate_avg = avg(&self.inner.translate_duration_ms.read());

        let endpoint_requests = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            chapters_loaded: self.inner.chapters_loaded.load(Ordering::Relaxed),
            chapter_load_failures: self.inner.chapter_load_failures.load(Ordering::Relaxed),
            runs_started: self.inner.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.inner.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.inner.runs_failed.load(Ordering::Relaxed),
            regions_extracted: self.inner.regions_extracted.load(Ordering::Relaxed),
            run_avg_ms: run_avg,
            run_p50_ms: run_p50,
            run_p95_ms: run_p95,
            fetch_avg_ms: fetch_avg,
            extract_avg_ms: extract_avg,
            translate_avg_ms: translate_avg,
            translation_calls_total: self.inner.translation_calls_total.load(Ordering::Relaxed),
            translation_calls_failed: self.inner.translation_calls_failed.load(Ordering::Relaxed),
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP chapters_loaded_total Chapters loaded successfully
# TYPE chapters_loaded_total counter
chapters_loaded_total {{}} {}

# HELP chapter_load_failures_total Chapter loads that produced no pages
# TYPE chapter_load_failures_total counter
chapter_load_failures_total {{}} {}

# HELP page_runs_total Page pipeline runs by outcome
# TYPE page_runs_total counter
page_runs_total {{outcome="started"}} {}
page_runs_total {{outcome="succeeded"}} {}
page_runs_total {{outcome="failed"}} {}

# HELP regions_extracted_total Text regions on successfully processed pages
# TYPE regions_extracted_total counter
regions_extracted_total {{}} {}

# HELP page_run_avg_ms Average page pipeline duration in milliseconds
# TYPE page_run_avg_ms gauge
page_run_avg_ms {{}} {}

# HELP stage_avg_duration_ms Average stage duration in milliseconds
# TYPE stage_avg_duration_ms gauge
stage_avg_duration_ms {{stage="fetching"}} {}
stage_avg_duration_ms {{stage="extracting"}} {}
stage_avg_duration_ms {{stage="translating"}} {}

# HELP translation_calls_total Translation API calls
# TYPE translation_calls_total counter
translation_calls_total {{}} {}

# HELP translation_calls_failed Failed translation API calls
# TYPE translation_calls_failed counter
translation_calls_failed {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.chapters_loaded,
            snapshot.chapter_load_failures,
            snapshot.runs_started,
            snapshot.runs_succeeded,
            snapshot.runs_failed,
            snapshot.regions_extracted,
            snapshot.run_avg_ms,
            snapshot.fetch_avg_ms,
            snapshot.extract_avg_ms,
            snapshot.translate_avg_ms,
            snapshot.translation_calls_total,
            snapshot.translation_calls_failed,
            snapshot.uptime_seconds,
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chapters_loaded: usize,
    pub chapter_load_failures: usize,
    pub runs_started: usize,
    pub runs_succeeded: usize,
    pub runs_failed: usize,
    pub regions_extracted: usize,
    pub run_avg_ms: u64,
    pub run_p50_ms: u64,
    pub run_p95_ms: u64,
    pub fetch_avg_ms: u64,
    pub extract_avg_ms: u64,
    pub translate_avg_ms: u64,
    pub translation_calls_total: usize,
    pub translation_calls_failed: usize,
    pub endpoint_requests: std::collections::BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
