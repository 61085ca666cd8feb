//! Outcome accounting and periodic progress reporting
//!
//! Counters live behind atomics in a single shared `Reporter`; workers only
//! ever increment. Display readers take an immutable `Snapshot`. A
//! background ticker logs throughput at a fixed wall-clock interval so
//! reporting overhead stays bounded no matter how many files fly by.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::info;

/// Terminal outcome of one eligible media entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// File was relocated to its planned destination
    Moved,
    /// Identical content already exists at the destination
    SkippedDuplicate,
    /// Source vanished before relocation - another path claimed it
    SkippedAlreadyProcessed,
    /// Processing failed; the reason is carried for the summary
    Failed(String),
}

/// Shared outcome counters for one run
#[derive(Debug, Default)]
pub struct Reporter {
    moved: AtomicUsize,
    skipped_duplicate: AtomicUsize,
    skipped_already_processed: AtomicUsize,
    failed: AtomicUsize,
    ineligible: AtomicUsize,
    eligible_total: AtomicUsize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the terminal outcome of one eligible entry
    pub fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Moved => &self.moved,
            Outcome::SkippedDuplicate => &self.skipped_duplicate,
            Outcome::SkippedAlreadyProcessed => &self.skipped_already_processed,
            Outcome::Failed(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Tally a scanned file whose extension is outside both media sets
    pub fn record_ineligible(&self) {
        self.ineligible.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_eligible_total(&self, total: usize) {
        self.eligible_total.store(total, Ordering::Relaxed);
    }

    /// Immutable snapshot of the counters for display
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            moved: self.moved.load(Ordering::Relaxed),
            skipped_duplicate: self.skipped_duplicate.load(Ordering::Relaxed),
            skipped_already_processed: self.skipped_already_processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            ineligible: self.ineligible.load(Ordering::Relaxed),
            eligible_total: self.eligible_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the run counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub moved: usize,
    pub skipped_duplicate: usize,
    pub skipped_already_processed: usize,
    pub failed: usize,
    pub ineligible: usize,
    pub eligible_total: usize,
}

impl Snapshot {
    /// Entries that have reached a terminal outcome
    pub fn processed(&self) -> usize {
        self.moved + self.skipped_duplicate + self.skipped_already_processed + self.failed
    }

    /// Every eligible entry must end in exactly one outcome
    pub fn fully_accounted(&self) -> bool {
        self.processed() == self.eligible_total
    }

    /// Human-readable final tally
    pub fn summary(&self, dest_root: &Path, elapsed: Duration, dry_run: bool) -> String {
        let rate = self.processed() as f64 / elapsed.as_secs_f64().max(0.01);
        format!(
            "{}Moved: {}, Duplicates skipped: {}, Already processed: {}, Failed: {}, \
             Ineligible: {} | {} eligible files in {:.1}s ({:.1} files/s) -> {}",
            if dry_run { "[dry run] " } else { "" },
            self.moved,
            self.skipped_duplicate,
            self.skipped_already_processed,
            self.failed,
            self.ineligible,
            self.eligible_total,
            elapsed.as_secs_f64(),
            rate,
            dest_root.display(),
        )
    }
}

/// Background thread that logs a snapshot at a fixed interval
pub struct ProgressTicker {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    pub fn start(reporter: Arc<Reporter>, interval: Duration) -> Self {
        let (stop, stop_rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let started = Instant::now();
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let snap = reporter.snapshot();
                        let elapsed = started.elapsed().as_secs_f64().max(0.01);
                        info!(
                            processed = snap.processed(),
                            total = snap.eligible_total,
                            moved = snap.moved,
                            failed = snap.failed,
                            rate = format_args!("{:.1}/s", snap.processed() as f64 / elapsed),
                            "Progress"
                        );
                    }
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop the ticker and wait for it to exit
    pub fn stop(mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
