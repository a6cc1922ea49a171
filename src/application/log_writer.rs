//! Resolution Log Writer
//!
//! Fire-and-forget bridge between the synchronous resolution path and the
//! async audit log sink. `record` never blocks and never fails: when the
//! queue is full or the sink is gone the entry is dropped and counted.

use crate::domain::entities::{ResolutionLogEntry, ResolutionResult};
use crate::domain::error::LogSinkError;
use crate::domain::ports::ResolutionLogSink;
use crate::domain::value_objects::Coordinate;
use arc_swap::ArcSwapOption;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Warn on the first drop and then once per this many.
const DROP_WARN_EVERY: u64 = 1000;

#[derive(Debug, Default)]
struct WriterCounters {
    queued: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time writer counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogWriterStats {
    /// Entries accepted into the queue
    pub queued: u64,
    /// Entries the sink confirmed
    pub written: u64,
    /// Entries dropped before reaching the sink (queue full or closed)
    pub dropped: u64,
    /// Entries lost because the sink rejected their batch
    pub failed: u64,
}

pub struct ResolutionLogWriter {
    tx: ArcSwapOption<mpsc::Sender<ResolutionLogEntry>>,
    counters: Arc<WriterCounters>,
}

impl ResolutionLogWriter {
    /// Start the background writer task.
    ///
    /// The returned handle completes once the writer is closed (or every
    /// clone of it is dropped) and the remaining queue has been flushed.
    pub fn spawn(
        sink: Arc<dyn ResolutionLogSink>,
        capacity: usize,
        batch_size: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let counters = Arc::new(WriterCounters::default());
        let handle = tokio::spawn(run_writer(rx, sink, batch_size.max(1), counters.clone()));

        let writer = Self {
            tx: ArcSwapOption::from_pointee(tx),
            counters,
        };
        (writer, handle)
    }

    /// Writer without a sink; every entry is dropped and counted.
    pub fn disabled() -> Self {
        Self {
            tx: ArcSwapOption::empty(),
            counters: Arc::new(WriterCounters::default()),
        }
    }

    /// Queue one resolution for the audit log.
    pub fn record(&self, coord: Coordinate, result: &ResolutionResult, duration: Duration) {
        let entry = ResolutionLogEntry::new(coord, result, duration);
        let guard = self.tx.load();
        let Some(tx) = &*guard else {
            self.note_drop("log sink unavailable");
            return;
        };

        match tx.try_send(entry) {
            Ok(()) => {
                self.counters.queued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => self.note_drop("log queue full"),
            Err(mpsc::error::TrySendError::Closed(_)) => self.note_drop("log writer stopped"),
        }
    }

    /// Stop accepting entries; the background task flushes and exits.
    pub fn close(&self) {
        if self.tx.swap(None).is_some() {
            tracing::debug!("resolution log writer closed");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.load().is_some()
    }

    pub fn stats(&self) -> LogWriterStats {
        LogWriterStats {
            queued: self.counters.queued.load(Ordering::Relaxed),
            written: self.counters.written.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    fn note_drop(&self, reason: &'static str) {
        let dropped = self.counters.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if dropped == 1 || dropped % DROP_WARN_EVERY == 0 {
            tracing::warn!(dropped, reason, "resolution log entry dropped");
        }
    }
}

async fn run_writer(
    mut rx: mpsc::Receiver<ResolutionLogEntry>,
    sink: Arc<dyn ResolutionLogSink>,
    batch_size: usize,
    counters: Arc<WriterCounters>,
) {
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(entry) = rx.recv().await {
        batch.push(entry);
        while batch.len() < batch_size {
            match rx.try_recv() {
                Ok(entry) => batch.push(entry),
                Err(_) => break,
            }
        }

        let n = batch.len() as u64;
        match sink.append(&batch).await {
            Ok(()) => {
                counters.written.fetch_add(n, Ordering::Relaxed);
            }
            Err(e) => {
                let lost = match &e {
                    LogSinkError::Rejected { rejected, .. } => (*rejected as u64).min(n),
                    LogSinkError::Unavailable(_) => n,
                };
                counters.written.fetch_add(n - lost, Ordering::Relaxed);
                let failed = counters.failed.fetch_add(lost, Ordering::Relaxed) + lost;
                tracing::warn!(error = %e, entries = lost, failed, "resolution log sink write failed");
            }
        }
        batch.clear();
    }

    tracing::debug!(
        written = counters.written.load(Ordering::Relaxed),
        "resolution log writer flushed"
    );
}
