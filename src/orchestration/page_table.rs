// Page table: per-page status records for the loaded chapter

use serde::Serialize;
use tracing::debug;

use crate::core::errors::RunError;
use crate::core::types::{Chapter, PageData, PageRecord, PageStatus, PageUrl};

/// How many pages past the current one are prefetched.
pub const PREFETCH_DEPTH: usize = 1;

/// Immutable view of the reader state handed to observers.
#[derive(Debug, Clone, Serialize)]
pub struct ReaderSnapshot {
    pub generation: u64,
    pub current: usize,
    pub chapter: Option<Chapter>,
    pub pages: Vec<PageRecord>,
}

impl ReaderSnapshot {
    pub fn page(&self, index: usize) -> Option<&PageRecord> {
        self.pages.get(index)
    }

    pub fn status(&self, index: usize) -> Option<PageStatus> {
        self.page(index).map(|r| r.status)
    }
}

/// State machine behind the scheduler. Owned by a single task; every change
/// replaces a whole record.
///
/// `generation` increases with each loaded chapter so completions of runs
/// started for an earlier chapter can be recognized and dropped.
#[derive(Debug, Default)]
pub struct PageTable {
    generation: u64,
    current: usize,
    chapter: Option<Chapter>,
    records: Vec<PageRecord>,
}

impl PageTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a run dispatched under `generation` still belongs to the loaded chapter
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn records(&self) -> &[PageRecord] {
        &self.records
    }

    /// Replace the chapter. Every page starts PENDING and the cursor returns
    /// to the first page.
    pub fn load(&mut self, chapter: Chapter) -> u64 {
        self.generation += 1;
        self.current = 0;
        self.records = vec![PageRecord::pending(); chapter.len()];
        self.chapter = Some(chapter);
        self.generation
    }

    /// Move the cursor, clamped to the last page. `None` without a chapter.
    pub fn navigate(&mut self, index: usize) -> Option<usize> {
        let last = self.records.len().checked_sub(1)?;
        self.current = index.min(last);
        Some(self.current)
    }

    /// Reset a failed page so the trigger can pick it up again.
    pub fn retry(&mut self, index: usize) -> bool {
        match self.records.get_mut(index) {
            Some(record) if record.status == PageStatus::Error => {
                *record = PageRecord::pending();
                true
            }
            _ => false,
        }
    }

    /// Mark the current page and its prefetch window LOADING and return the
    /// pages that need a run. Only PENDING pages are claimed.
    pub fn claim_due(&mut self) -> Vec<(usize, PageUrl)> {
        let Some(chapter) = self.chapter.as_ref() else {
            return Vec::new();
        };

        let mut due = Vec::new();
        for index in self.current..=self.current + PREFETCH_DEPTH {
            let (Some(record), Some(url)) = (self.records.get_mut(index), chapter.get(index)) else {
                continue;
            };
            if record.status == PageStatus::Pending {
                *record = PageRecord::loading();
                due.push((index, url.clone()));
            }
        }
        due
    }

    /// Record the outcome of a run. Returns false when the completion is
    /// stale and was dropped.
    pub fn complete(
        &mut self,
        generation: u64,
        index: usize,
        outcome: Result<PageData, RunError>,
    ) -> bool {
        if !self.is_current(generation) {
            debug!(
                "Dropping completion for page {} of generation {} (current {})",
                index, generation, self.generation
            );
            return false;
        }

        match self.records.get_mut(index) {
            Some(record) if record.status == PageStatus::Loading => {
                *record = match outcome {
                    Ok(data) => PageRecord::done(data),
                    Err(_) => PageRecord::error(),
                };
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> ReaderSnapshot {
        ReaderSnapshot {
            generation: self.generation,
            current: self.current,
            chapter: self.chapter.clone(),
            pages: self.records.clone(),
        }
    }
}
