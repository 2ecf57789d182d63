use std::{collections::HashMap, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{
    api::{ApiError, DetailsApi},
    cache::VerdictCache,
    dom::Document,
    domain::{Clock, ListingId, QueueSnapshot, RunStats},
    marker::badge::BadgeRenderer,
};

use super::{
    queue::{WorkItem, WorkQueue},
    resolver::{resolve_listing, Completion},
};

/// Elements waiting on one outstanding details request.
struct InFlight<N> {
    origin: N,
    joined: Vec<N>,
}

/// Resolves listings to verdicts with at most `concurrency` requests
/// outstanding and at most one per listing.
///
/// All state lives here and is only touched from the owning loop; request
/// tasks report back through the completion channel.
pub struct FetchScheduler<D: Document> {
    api: Arc<dyn DetailsApi>,
    cache: VerdictCache,
    renderer: BadgeRenderer<D>,
    clock: Clock,
    concurrency: usize,
    queue: WorkQueue<WorkItem<D::Node>>,
    in_flight: HashMap<ListingId, InFlight<D::Node>>,
    running: usize,
    completions_tx: UnboundedSender<Completion>,
    completions_rx: UnboundedReceiver<Completion>,
    stats: RunStats,
}

impl<D: Document> FetchScheduler<D> {
    pub fn new(
        api: Arc<dyn DetailsApi>,
        cache: VerdictCache,
        renderer: BadgeRenderer<D>,
        clock: Clock,
        concurrency: usize,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            api,
            cache,
            renderer,
            clock,
            concurrency: concurrency.max(1),
            queue: WorkQueue::new(),
            in_flight: HashMap::new(),
            running: 0,
            completions_tx,
            completions_rx,
            stats: RunStats::default(),
        }
    }

    /// Must be called from within a tokio runtime: launching a request spawns a task.
    pub fn enqueue(&mut self, listing_id: ListingId, node: D::Node) {
        if self.serve_from_cache(listing_id, &node) {
            return;
        }
        if let Some(flight) = self.in_flight.get_mut(&listing_id) {
            flight.joined.push(node);
            self.stats.joined += 1;
            tracing::debug!(target: "scheduler", %listing_id, "joined in-flight request");
            return;
        }
        self.queue.push(WorkItem { listing_id, node });
        self.pump();
    }

    /// Launches queued work until every slot is taken.
    fn pump(&mut self) {
        while self.running < self.concurrency {
            let Some(WorkItem { listing_id, node }) = self.queue.pop() else {
                break;
            };
            // A duplicate queued while its twin was waiting is resolved by the twin.
            if let Some(flight) = self.in_flight.get_mut(&listing_id) {
                flight.joined.push(node);
                self.stats.joined += 1;
                continue;
            }
            if self.serve_from_cache(listing_id, &node) {
                continue;
            }
            self.launch(listing_id, node);
        }
    }

    fn launch(&mut self, listing_id: ListingId, node: D::Node) {
        self.running += 1;
        self.in_flight.insert(
            listing_id,
            InFlight {
                origin: node,
                joined: Vec::new(),
            },
        );
        tracing::debug!(target: "scheduler", %listing_id, running = self.running, "details request launched");

        let api = self.api.clone();
        let clock = self.clock.clone();
        let completions = self.completions_tx.clone();
        tokio::spawn(async move {
            // A panicking request must still free its slot.
            let completion = AssertUnwindSafe(resolve_listing(api.as_ref(), listing_id, &clock))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Completion {
                    listing_id,
                    outcome: Err(ApiError::Panicked { listing_id }),
                });
            let _ = completions.send(completion);
        });
    }

    fn serve_from_cache(&mut self, listing_id: ListingId, node: &D::Node) -> bool {
        let now = (self.clock)();
        let Some(verdict) = self.cache.fresh(listing_id, now) else {
            return false;
        };
        self.stats.cache_hits += 1;
        if verdict.applied {
            let status = verdict.status_text.clone();
            self.render(listing_id, node, status.as_deref());
        }
        true
    }

    fn render(&mut self, listing_id: ListingId, node: &D::Node, status_text: Option<&str>) {
        match self.renderer.mark_applied(node, status_text) {
            Ok(()) => self.stats.marked += 1,
            Err(err) => {
                tracing::error!(target: "badge", %listing_id, node = ?node, error = %err, "failed to render badge");
            }
        }
    }

    /// Waits for the next finished request. Pending forever while idle.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completions_rx.recv().await
    }

    /// Applies a finished request, frees its slot, then refills slots.
    pub async fn complete(&mut self, completion: Completion) {
        let Completion { listing_id, outcome } = completion;
        let flight = self.in_flight.remove(&listing_id);

        match outcome {
            Ok(verdict) => {
                self.stats.fetched += 1;
                self.cache.insert(listing_id, verdict.clone());
                self.cache.save().await;
                tracing::debug!(target: "scheduler", %listing_id, applied = verdict.applied, "listing resolved");
                if verdict.applied {
                    if let Some(InFlight { origin, joined }) = flight {
                        let status = verdict.status_text.as_deref();
                        for node in std::iter::once(origin).chain(joined) {
                            self.render(listing_id, &node, status);
                        }
                    }
                }
            }
            Err(err) => {
                self.stats.failed += 1;
                tracing::warn!(target: "scheduler", %listing_id, error = %err, "listing resolution failed");
            }
        }

        self.running = self.running.saturating_sub(1);
        self.pump();
    }

    /// Drives completions until nothing is queued or running.
    pub async fn settle(&mut self) {
        while !self.is_idle() {
            match self.completions_rx.recv().await {
                Some(completion) => self.complete(completion).await,
                None => break,
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        self.running == 0 && self.queue.is_empty()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            queued: self.queue.len(),
            running: self.running,
            in_flight: self.in_flight.len(),
        }
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub(crate) fn note_scanned(&mut self, count: usize) {
        self.stats.scanned += count;
    }

    pub(crate) fn note_rescan(&mut self) {
        self.stats.rescans += 1;
    }

    pub fn cache(&self) -> &VerdictCache {
        &self.cache
    }
}
