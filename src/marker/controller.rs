use std::sync::Arc;

use crate::{
    api::DetailsApi,
    cache::VerdictCache,
    config::MarkerConfig,
    dom::Document,
    domain::{Clock, QueueSnapshot, RunStats},
    infrastructure::shutdown::ShutdownListener,
    store::KeyValueStore,
    tasks::scheduler::FetchScheduler,
};

use super::{badge::BadgeRenderer, scanner::DomScanner, watcher::ChangeWatcher};

/// Owns every piece of marker state for one document.
pub struct MarkerController<D: Document> {
    scanner: DomScanner<D>,
    scheduler: FetchScheduler<D>,
    watcher: ChangeWatcher,
}

impl<D: Document> MarkerController<D> {
    pub async fn new(
        document: Arc<D>,
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn DetailsApi>,
        config: &MarkerConfig,
        clock: Clock,
    ) -> Self {
        let watcher = ChangeWatcher::new(document.observe(), config.debounce);
        let cache = VerdictCache::load(store, config.cache_key.clone(), config.ttl).await;
        tracing::info!(target: "cache", entries = cache.len(), "verdict cache ready");

        let renderer = BadgeRenderer::new(document.clone(), config.hide_applied);
        let scheduler = FetchScheduler::new(api, cache, renderer, clock, config.concurrency);
        Self {
            scanner: DomScanner::new(document),
            scheduler,
            watcher,
        }
    }

    /// Hands every newly discovered listing anchor to the scheduler.
    pub fn scan_and_apply(&mut self) -> usize {
        let found = self.scanner.scan();
        let count = found.len();
        for (node, listing_id) in found {
            self.scheduler.enqueue(listing_id, node);
        }
        self.scheduler.note_scanned(count);
        count
    }

    pub async fn settle(&mut self) {
        self.scheduler.settle().await;
    }

    pub fn stats(&self) -> RunStats {
        self.scheduler.stats()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.scheduler.snapshot()
    }

    /// Initial scan, then re-scans on debounced document changes until
    /// shutdown. `on_settled` runs whenever the scheduler drains.
    pub async fn run<F>(mut self, mut shutdown: ShutdownListener, mut on_settled: F) -> RunStats
    where
        F: FnMut(RunStats) + Send,
    {
        let initial = self.scan_and_apply();
        tracing::info!(target: "scanner", listings = initial, "initial scan complete");
        if self.scheduler.is_idle() {
            on_settled(self.stats());
        }

        let mut watching = true;
        loop {
            tokio::select! {
                _ = shutdown.notified() => break,
                Some(completion) = self.scheduler.next_completion() => {
                    self.scheduler.complete(completion).await;
                    if self.scheduler.is_idle() {
                        let stats = self.stats();
                        tracing::info!(
                            target: "scheduler",
                            fetched = stats.fetched,
                            failed = stats.failed,
                            marked = stats.marked,
                            "queue drained"
                        );
                        on_settled(stats);
                    }
                }
                rescan = self.watcher.next_rescan(), if watching => match rescan {
                    Some(mutations) => {
                        self.scheduler.note_rescan();
                        let found = self.scan_and_apply();
                        tracing::debug!(
                            target: "scanner",
                            mutations,
                            found,
                            seen = self.scanner.seen(),
                            "rescan complete"
                        );
                        if found > 0 && self.scheduler.is_idle() {
                            on_settled(self.stats());
                        }
                    }
                    None => {
                        tracing::warn!(target: "watcher", "document stopped reporting mutations");
                        watching = false;
                    }
                },
            }
        }

        let snapshot = self.snapshot();
        if snapshot.running > 0 || snapshot.queued > 0 {
            tracing::info!(
                target: "scheduler",
                running = snapshot.running,
                queued = snapshot.queued,
                in_flight = snapshot.in_flight,
                "stopping with unresolved listings"
            );
        }
        tracing::debug!(target: "cache", entries = self.scheduler.cache().len(), "marker stopped");
        self.stats()
    }
}
