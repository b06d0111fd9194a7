//! The ingestion loop.
//!
//! Each cycle fetches every configured source in order, reverses each
//! source's newest-first list so the channel reads top to bottom, drains the
//! resulting queue into the dispatcher and only then moves the watermark.
//!
//! ```text
//! Idle ─► Fetching(0..n) ─► Reordering ─► Dispatching ─► WatermarkAdvance ─► Idle
//!              │
//!              └─ stop signal: abandon the cycle, watermark untouched
//! ```
//!
//! The loop runs on the calling thread and one source finishes before the
//! next starts.  Transport timeouts bound how long a single source can hold
//! the cycle.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

use crate::dispatch::Dispatcher;
use crate::source::{Post, Source};
use crate::watermark::WatermarkStore;

/// Cooperative stop request, fed by whoever watches for Ctrl-C.
pub struct StopSignal {
    rx: mpsc::Receiver<()>,
    raised: Cell<bool>,
}

impl StopSignal {
    pub fn new(rx: mpsc::Receiver<()>) -> Self {
        Self {
            rx,
            raised: Cell::new(false),
        }
    }

    pub fn is_raised(&self) -> bool {
        if !self.raised.get() && self.rx.try_recv().is_ok() {
            self.raised.set(true);
        }
        self.raised.get()
    }

    /// Sleep for `timeout` unless a stop arrives first.  Returns true if
    /// stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        if self.is_raised() {
            return true;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                self.raised.set(true);
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            // Nobody can signal any more; just sleep.
            Err(RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                false
            }
        }
    }
}

/// What one completed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub queued: usize,
    pub delivered: usize,
    pub failed: usize,
    pub failed_sources: usize,
    /// Watermark in effect after the cycle.
    pub watermark: DateTime<Utc>,
    /// False when the new watermark could not be persisted.
    pub advanced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Stopped while fetching; nothing was dispatched or committed.
    Interrupted,
}

/// Build the dispatch queue from per-source batches.
///
/// Every batch arrives newest-first and is reversed; batches stay in
/// configuration order.  Posts from different sources are not interleaved by
/// time.
pub fn reorder(batches: Vec<Vec<Post>>) -> VecDeque<Post> {
    batches
        .into_iter()
        .flat_map(|batch| batch.into_iter().rev())
        .collect()
}

/// Owns the sources, the watermark store and the dispatcher, and drives the
/// fetch / reorder / dispatch / advance cycle.
///
/// The in-memory watermark is the one every source filters against; it only
/// changes after a completed cycle has been persisted.
pub struct IngestLoop<S, D> {
    sources: Vec<Box<dyn Source>>,
    store: S,
    dispatcher: D,
    interval: Duration,
    clock: fn() -> DateTime<Utc>,
    watermark: DateTime<Utc>,
}

impl<S: WatermarkStore, D: Dispatcher> IngestLoop<S, D> {
    /// Set up the loop, reading the stored watermark once.
    pub fn new(sources: Vec<Box<dyn Source>>, store: S, dispatcher: D, interval: Duration) -> Self {
        Self::with_clock(sources, store, dispatcher, interval, Utc::now)
    }

    /// Like [`IngestLoop::new`] with an injected clock.
    pub fn with_clock(
        sources: Vec<Box<dyn Source>>,
        mut store: S,
        dispatcher: D,
        interval: Duration,
        clock: fn() -> DateTime<Utc>,
    ) -> Self {
        let watermark = initial_watermark(&mut store, clock().trunc_subsecs(0));
        tracing::info!(%watermark, sources = sources.len(), "ingestion loop ready");
        Self {
            sources,
            store,
            dispatcher,
            interval,
            clock,
            watermark,
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        self.watermark
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cycle until stopped; a single cycle when `once` is set.
    pub fn run(&mut self, stop: &StopSignal, once: bool) {
        loop {
            match self.run_cycle(stop) {
                CycleOutcome::Completed(report) => {
                    tracing::info!(
                        queued = report.queued,
                        delivered = report.delivered,
                        failed = report.failed,
                        failed_sources = report.failed_sources,
                        watermark = %report.watermark,
                        advanced = report.advanced,
                        "cycle finished"
                    );
                }
                CycleOutcome::Interrupted => break,
            }
            if once {
                return;
            }

            tracing::info!(secs = self.interval.as_secs(), "sleeping until next cycle");
            if stop.wait(self.interval) {
                break;
            }
        }
        tracing::info!("stop requested, leaving ingestion loop");
    }

    /// Run one cycle.  Sources that fail are skipped and counted; a stop
    /// observed before dispatch abandons the cycle with the watermark untouched.
    pub fn run_cycle(&mut self, stop: &StopSignal) -> CycleOutcome {
        let watermark = self.watermark;
        tracing::info!(%watermark, "fetching new posts");

        let mut batches = Vec::with_capacity(self.sources.len());
        let mut failed_sources = 0;
        for source in &self.sources {
            if stop.is_raised() {
                return interrupted();
            }
            match source.fetch(watermark) {
                Ok(posts) => {
                    tracing::debug!(source = source.name(), count = posts.len(), "source fetched");
                    batches.push(posts);
                }
                Err(e) => {
                    tracing::warn!(source = source.name(), error = %e, "source failed, skipped this cycle");
                    failed_sources += 1;
                }
            }
        }
        if stop.is_raised() {
            return interrupted();
        }

        let mut queue = reorder(batches);
        let queued = queue.len();
        if queued > 0 {
            tracing::info!(queued, "sending new posts");
        }

        let (mut delivered, mut failed) = (0, 0);
        while let Some(post) = queue.pop_front() {
            match self.dispatcher.send(&post) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(source = post.source_name(), title = post.title(), error = %e, "post not delivered");
                    failed += 1;
                }
            }
        }

        let advanced = self.advance_watermark((self.clock)());
        CycleOutcome::Completed(CycleReport {
            queued,
            delivered,
            failed,
            failed_sources,
            watermark: self.watermark,
            advanced,
        })
    }

    /// Move the watermark to `now`, never backwards.  Keeps the old value
    /// when it cannot be persisted, so the next cycle reprocesses.
    fn advance_watermark(&mut self, now: DateTime<Utc>) -> bool {
        // Whole seconds, matching what the store can hold.
        let next = now.trunc_subsecs(0).max(self.watermark);
        match self.store.write(next) {
            Ok(()) => {
                self.watermark = next;
                true
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    watermark = %self.watermark,
                    "WATERMARK NOT ADVANCED: could not persist it, next cycle will reprocess"
                );
                false
            }
        }
    }
}

fn interrupted() -> CycleOutcome {
    tracing::info!("stop requested mid-cycle, watermark not advanced");
    CycleOutcome::Interrupted
}

/// Stored watermark, or `now` when there is none or it cannot be read, so a
/// first run does not replay a feed's whole backlog.
fn initial_watermark<S: WatermarkStore>(store: &mut S, now: DateTime<Utc>) -> DateTime<Utc> {
    match store.read() {
        Ok(Some(watermark)) => return watermark,
        Ok(None) => tracing::info!("no stored watermark, starting from now"),
        Err(e) => tracing::warn!(error = %e, "unreadable watermark, starting from now"),
    }
    if let Err(e) = store.write(now) {
        tracing::error!(error = %e, "could not persist initial watermark");
    }
    now
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
