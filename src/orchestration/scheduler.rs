//! Scheduler / prefetch controller.
//!
//! A single coordinator task owns the [`PageTable`] and consumes
//! [`SchedulerEvent`]s in order. After each event it starts pipeline runs for
//! the current page and the next one if they are still PENDING, then
//! publishes a fresh [`ReaderSnapshot`]. Runs execute on their own tasks and
//! report back through the same queue; navigation never cancels them.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::page_table::{PageTable, ReaderSnapshot};
use crate::core::errors::{RunError, SchedulerError};
use crate::core::types::{Chapter, PageData, PageUrl};
use crate::pipeline::PagePipeline;
use crate::utils::Metrics;

#[derive(Debug)]
pub enum SchedulerEvent {
    LoadChapter(Chapter),
    Navigate(usize),
    Retry(usize),
    RunFinished {
        generation: u64,
        index: usize,
        outcome: Result<PageData, RunError>,
    },
}

/// Cloneable handle to the coordinator. The coordinator stops once every
/// handle is dropped and no run is still in flight.
#[derive(Clone)]
pub struct Scheduler {
    events: mpsc::UnboundedSender<SchedulerEvent>,
    snapshots: watch::Receiver<Arc<ReaderSnapshot>>,
}

impl Scheduler {
    /// Start the coordinator on the current tokio runtime.
    pub fn spawn(pipeline: Arc<PagePipeline>, metrics: Metrics) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let table = PageTable::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(table.snapshot()));

        let coordinator = Coordinator {
            table,
            pipeline,
            metrics,
            events: events_tx.downgrade(),
            snapshots: snapshot_tx,
        };
        tokio::spawn(coordinator.run(events_rx));

        Self {
            events: events_tx,
            snapshots: snapshot_rx,
        }
    }

    fn send(&self, event: SchedulerEvent) -> Result<(), SchedulerError> {
        self.events.send(event).map_err(|_| SchedulerError::Stopped)
    }

    pub fn load_chapter(&self, chapter: Chapter) -> Result<(), SchedulerError> {
        self.send(SchedulerEvent::LoadChapter(chapter))
    }

    pub fn navigate(&self, index: usize) -> Result<(), SchedulerError> {
        self.send(SchedulerEvent::Navigate(index))
    }

    pub fn retry(&self, index: usize) -> Result<(), SchedulerError> {
        self.send(SchedulerEvent::Retry(index))
    }

    /// Latest published state.
    pub fn snapshot(&self) -> Arc<ReaderSnapshot> {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ReaderSnapshot>> {
        self.snapshots.clone()
    }

    /// Wait for the first published snapshot satisfying `predicate`,
    /// including the one already current.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<Arc<ReaderSnapshot>, SchedulerError>
    where
        F: FnMut(&ReaderSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot.as_ref()))
            .await
            .map_err(|_| SchedulerError::Stopped)?;
        Ok(snapshot.clone())
    }
}

struct Coordinator {
    table: PageTable,
    pipeline: Arc<PagePipeline>,
    metrics: Metrics,
    // weak so that dropping every handle ends the loop
    events: mpsc::WeakUnboundedSender<SchedulerEvent>,
    snapshots: watch::Sender<Arc<ReaderSnapshot>>,
}

impl Coordinator {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SchedulerEvent>) {
        info!("Scheduler started");
        while let Some(event) = events.recv().await {
            self.handle(event);
            self.dispatch();
            self.snapshots.send_replace(Arc::new(self.table.snapshot()));
        }
        info!("Scheduler stopped");
    }

    fn handle(&mut self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::LoadChapter(chapter) => {
                let pages = chapter.len();
                let generation = self.table.load(chapter);
                info!("Loaded chapter with {} pages (generation {})", pages, generation);
            }
            SchedulerEvent::Navigate(index) => match self.table.navigate(index) {
                Some(current) => debug!("Current page is now {}", current),
                None => warn!("Navigation to page {} ignored: no chapter loaded", index),
            },
            SchedulerEvent::Retry(index) => {
                if self.table.retry(index) {
                    info!("Page {} queued for retry", index);
                } else {
                    debug!("Retry of page {} ignored: page has not failed", index);
                }
            }
            SchedulerEvent::RunFinished {
                generation,
                index,
                outcome,
            } => {
                if !self.table.is_current(generation) {
                    debug!(
                        "Dropping result for page {} from generation {} (ok: {})",
                        index,
                        generation,
                        outcome.is_ok()
                    );
                    return;
                }
                if let Err(ref e) = outcome {
                    error!("Page {} failed: {}", index, e);
                }
                self.table.complete(generation, index, outcome);
            }
        }
    }

    /// Start runs for whatever the trigger marks due.
    fn dispatch(&mut self) {
        let Some(events) = self.events.upgrade() else {
            return;
        };

        let generation = self.table.generation();
        for (index, url) in self.table.claim_due() {
            debug!("Dispatching page {} (generation {})", index, generation);
            self.spawn_run(events.clone(), generation, index, url);
        }
    }

    fn spawn_run(
        &self,
        events: mpsc::UnboundedSender<SchedulerEvent>,
        generation: u64,
        index: usize,
        url: PageUrl,
    ) {
        let pipeline = Arc::clone(&self.pipeline);
        let metrics = self.metrics.clone();
        metrics.record_run_started();

        tokio::spawn(async move {
            let start = Instant::now();
            // inner task so a panicking run still settles its page
            let run = tokio::spawn(async move { pipeline.run(index, &url).await });

            let outcome = match run.await {
                Ok(Ok(data)) => Ok(data),
                Ok(Err(e)) => Err(RunError::Pipeline(e)),
                Err(e) => Err(RunError::Aborted {
                    index,
                    reason: e.to_string(),
                }),
            };

            let regions = outcome.as_ref().map(|d| d.regions.len()).unwrap_or(0);
            metrics.record_run_finished(outcome.is_ok(), start.elapsed(), regions);

            let _ = events.send(SchedulerEvent::RunFinished {
                generation,
                index,
                outcome,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::PageStatus;
    use crate::test_support::{block, page_urls, pipeline, FakeOcr, FakeRelay, FakeTranslator};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn scheduler(relay: Arc<FakeRelay>, metrics: Metrics) -> Scheduler {
        let pipeline = pipeline(
            relay,
            FakeOcr::with_blocks(vec![block("こんにちは", 10.0, 10.0)]),
            Arc::new(FakeTranslator::default()),
            metrics.clone(),
        );
        Scheduler::spawn(Arc::new(pipeline), metrics)
    }

    fn chapter(urls: &[PageUrl]) -> Chapter {
        Chapter::new(urls.to_vec()).unwrap()
    }

    async fn wait_for<F>(scheduler: &Scheduler, predicate: F) -> Arc<ReaderSnapshot>
    where
        F: FnMut(&ReaderSnapshot) -> bool,
    {
        timeout(WAIT, scheduler.wait_until(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .unwrap()
    }

    async fn wait_for_runs(metrics: &Metrics, finished: usize) {
        timeout(WAIT, async {
            loop {
                let s = metrics.snapshot();
                if s.runs_succeeded + s.runs_failed >= finished {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for runs");
    }

    #[tokio::test]
    async fn test_load_prefetches_first_two_pages_only() {
        let relay = Arc::new(FakeRelay::new());
        let urls = page_urls(4);
        let scheduler = scheduler(relay.clone(), Metrics::new());

        scheduler.load_chapter(chapter(&urls)).unwrap();
        let snapshot = wait_for(&scheduler, |s| {
            s.status(0) == Some(PageStatus::Done) && s.status(1) == Some(PageStatus::Done)
        })
        .await;

        assert_eq!(snapshot.status(2), Some(PageStatus::Pending));
        assert_eq!(snapshot.status(3), Some(PageStatus::Pending));
        assert_eq!(relay.total_calls(), 2);

        let page = snapshot.page(0).unwrap();
        assert_eq!(page.native_width, Some(200));
        assert_eq!(page.regions.as_ref().unwrap()[0].translation, "EN:こんにちは");
    }

    #[tokio::test]
    async fn test_no_duplicate_dispatch_while_loading() {
        let relay = Arc::new(FakeRelay::new());
        let urls = page_urls(3);
        let gate0 = relay.gate(&urls[0]);
        let gate1 = relay.gate(&urls[1]);
        let scheduler = scheduler(relay.clone(), Metrics::new());

        scheduler.load_chapter(chapter(&urls)).unwrap();
        scheduler.navigate(0).unwrap();
        scheduler.navigate(0).unwrap();
        scheduler.navigate(1).unwrap();
        wait_for(&scheduler, |s| s.status(2) == Some(PageStatus::Done)).await;

        gate0.notify_one();
        gate1.notify_one();
        wait_for(&scheduler, |s| {
            s.pages.iter().all(|p| p.status == PageStatus::Done)
        })
        .await;

        for url in &urls {
            assert_eq!(relay.calls(url), 1);
        }
    }

    #[tokio::test]
    async fn test_navigation_does_not_cancel_runs() {
        let relay = Arc::new(FakeRelay::new());
        let urls = page_urls(4);
        let gate0 = relay.gate(&urls[0]);
        let scheduler = scheduler(relay.clone(), Metrics::new());

        scheduler.load_chapter(chapter(&urls)).unwrap();
        scheduler.navigate(3).unwrap();
        let snapshot = wait_for(&scheduler, |s| s.status(3) == Some(PageStatus::Done)).await;
        assert_eq!(snapshot.current, 3);
        assert_eq!(snapshot.status(0), Some(PageStatus::Loading));
        assert_eq!(snapshot.status(2), Some(PageStatus::Pending));

        gate0.notify_one();
        wait_for(&scheduler, |s| s.status(0) == Some(PageStatus::Done)).await;
        assert_eq!(relay.calls(&urls[0]), 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_retryable() {
        let relay = Arc::new(FakeRelay::new());
        let urls = page_urls(2);
        relay.fail(&urls[0]);
        let metrics = Metrics::new();
        let scheduler = scheduler(relay.clone(), metrics.clone());

        scheduler.load_chapter(chapter(&urls)).unwrap();
        let snapshot = wait_for(&scheduler, |s| {
            s.status(0) == Some(PageStatus::Error) && s.status(1) == Some(PageStatus::Done)
        })
        .await;
        assert!(snapshot.page(0).unwrap().regions.is_none());

        // navigating back to a failed page does not re-run it; dispatch
        // happens before publishing, so a re-run would show as Loading here
        scheduler.navigate(1).unwrap();
        wait_for(&scheduler, |s| s.current == 1).await;
        scheduler.navigate(0).unwrap();
        let snapshot = wait_for(&scheduler, |s| s.current == 0).await;
        assert_eq!(snapshot.status(0), Some(PageStatus::Error));
        assert_eq!(metrics.snapshot().runs_started, 2);
        assert_eq!(relay.calls(&urls[0]), 1);

        relay.heal(&urls[0]);
        scheduler.retry(0).unwrap();
        wait_for(&scheduler, |s| s.status(0) == Some(PageStatus::Done)).await;
        assert_eq!(relay.calls(&urls[0]), 2);

        let stats = metrics.snapshot();
        assert_eq!(stats.runs_started, 3);
        assert_eq!(stats.runs_failed, 1);
    }

    #[tokio::test]
    async fn test_completion_from_previous_chapter_discarded() {
        let relay = Arc::new(FakeRelay::new());
        let metrics = Metrics::new();
        let old_urls = page_urls(1);
        let new_urls = vec![
            PageUrl::new("https://img.test/b0.png"),
            PageUrl::new("https://img.test/b1.png"),
            PageUrl::new("https://img.test/b2.png"),
        ];
        let old_gate = relay.gate(&old_urls[0]);
        let new_gate = relay.gate(&new_urls[0]);
        let scheduler = scheduler(relay.clone(), metrics.clone());

        scheduler.load_chapter(chapter(&old_urls)).unwrap();
        wait_for(&scheduler, |s| s.status(0) == Some(PageStatus::Loading)).await;

        scheduler.load_chapter(chapter(&new_urls)).unwrap();
        wait_for(&scheduler, |s| {
            s.generation == 2 && s.status(1) == Some(PageStatus::Done)
        })
        .await;

        // old run finishes while the new page 0 is still loading
        old_gate.notify_one();
        wait_for_runs(&metrics, 2).await;
        scheduler.navigate(1).unwrap();
        let snapshot = wait_for(&scheduler, |s| s.status(2) == Some(PageStatus::Done)).await;
        assert_eq!(snapshot.status(0), Some(PageStatus::Loading));

        new_gate.notify_one();
        wait_for(&scheduler, |s| s.status(0) == Some(PageStatus::Done)).await;
    }

    #[tokio::test]
    async fn test_failure_from_previous_chapter_discarded() {
        let relay = Arc::new(FakeRelay::new());
        let metrics = Metrics::new();
        let old_urls = page_urls(1);
        let new_urls = vec![
            PageUrl::new("https://img.test/c0.png"),
            PageUrl::new("https://img.test/c1.png"),
        ];
        relay.fail(&old_urls[0]);
        let old_gate = relay.gate(&old_urls[0]);
        let new_gate = relay.gate(&new_urls[0]);
        let scheduler = scheduler(relay.clone(), metrics.clone());

        scheduler.load_chapter(chapter(&old_urls)).unwrap();
        wait_for(&scheduler, |s| s.status(0) == Some(PageStatus::Loading)).await;
        scheduler.load_chapter(chapter(&new_urls)).unwrap();
        wait_for(&scheduler, |s| {
            s.generation == 2 && s.status(1) == Some(PageStatus::Done)
        })
        .await;

        // the old run fails after the new chapter took over
        old_gate.notify_one();
        wait_for_runs(&metrics, 2).await;
        assert_eq!(metrics.snapshot().runs_failed, 1);
        scheduler.navigate(1).unwrap();
        let snapshot = wait_for(&scheduler, |s| s.current == 1).await;
        assert_eq!(snapshot.status(0), Some(PageStatus::Loading));

        new_gate.notify_one();
        wait_for(&scheduler, |s| s.status(0) == Some(PageStatus::Done)).await;
    }

    #[tokio::test]
    async fn test_handle_reports_stopped_coordinator() {
        let (events, rx) = mpsc::unbounded_channel();
        drop(rx);
        let (_tx, snapshots) = watch::channel(Arc::new(PageTable::new().snapshot()));
        let scheduler = Scheduler { events, snapshots };

        assert!(matches!(scheduler.navigate(0), Err(SchedulerError::Stopped)));
    }
}
