use std::time::Duration;

use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{sleep_until, Instant},
};

use crate::dom::MutationRecord;

/// Collapses bursts of document mutations into single re-scan requests.
pub struct ChangeWatcher {
    mutations: UnboundedReceiver<MutationRecord>,
    debounce: Duration,
    deadline: Option<Instant>,
    pending: usize,
    closed: bool,
}

impl ChangeWatcher {
    pub fn new(mutations: UnboundedReceiver<MutationRecord>, debounce: Duration) -> Self {
        Self {
            mutations,
            debounce,
            deadline: None,
            pending: 0,
            closed: false,
        }
    }

    /// Resolves once `debounce` has elapsed without a new mutation, returning
    /// how many mutations the re-scan covers. `None` once the document stopped
    /// reporting and nothing is pending.
    ///
    /// Cancel safe: the timer lives in `self`, so dropping this future inside
    /// a `select!` loses nothing.
    pub async fn next_rescan(&mut self) -> Option<usize> {
        loop {
            match (self.deadline, self.closed) {
                (None, true) => return None,
                (Some(deadline), true) => {
                    sleep_until(deadline).await;
                    return Some(self.fire());
                }
                (None, false) => match self.mutations.recv().await {
                    Some(_) => self.restart(),
                    None => self.closed = true,
                },
                (Some(deadline), false) => {
                    tokio::select! {
                        record = self.mutations.recv() => match record {
                            Some(_) => self.restart(),
                            None => self.closed = true,
                        },
                        _ = sleep_until(deadline) => return Some(self.fire()),
                    }
                }
            }
        }
    }

    fn restart(&mut self) {
        self.pending += 1;
        self.deadline = Some(Instant::now() + self.debounce);
    }

    fn fire(&mut self) -> usize {
        self.deadline = None;
        let covered = std::mem::take(&mut self.pending);
        tracing::debug!(target: "watcher", mutations = covered, "debounce elapsed; rescan requested");
        covered
    }
}
