//! Periodic driver for the retention sweep.
//!
//! The scheduler holds no business state. Each tick runs [`sweep`] inside one
//! ledger step at the clock's current instant, persists only when something
//! changed, and hands a [`SweepNotice`] to the listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::ledger::{Commit, Ledger};
use crate::retention::{RetentionPolicy, SweepReport, sweep};
use crate::store::StoreError;

/// Published after a sweep that removed or marked something.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepNotice {
    pub at: DateTime<Utc>,
    pub report: SweepReport,
}

impl SweepNotice {
    /// One-line summary suitable for a toast or log line.
    #[must_use]
    pub fn message(&self) -> String {
        let removed = self.report.removed_count();
        let faded = self.report.faded.len();
        match (removed, faded) {
            (0, f) => format!("{f} item(s) expired and will be deleted soon"),
            (r, 0) => format!("{r} item(s) were removed"),
            (r, f) => format!("{r} item(s) were removed; {f} more expired"),
        }
    }
}

pub struct Scheduler {
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
    policy: RetentionPolicy,
    interval: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("policy", &self.policy)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(
        ledger: Arc<Ledger>,
        clock: Arc<dyn Clock>,
        policy: RetentionPolicy,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            clock,
            policy,
            interval,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep now. `None` means nothing changed and nothing was written.
    pub fn tick(&self) -> Result<Option<SweepNotice>, StoreError> {
        let now = self.clock.now();
        let policy = self.policy;

        let report = self.ledger.transact(|items| {
            let outcome = sweep(std::mem::take(items), now, &policy);
            *items = outcome.items;
            Ok::<_, StoreError>(if outcome.changed {
                Commit::Write(Some(outcome.report))
            } else {
                Commit::Discard(None)
            })
        })?;

        let Some(report) = report else {
            debug!(%now, "sweep found nothing to do");
            return Ok(None);
        };

        info!(
            %now,
            purged_archived = report.purged_archived.len(),
            faded = report.faded.len(),
            purged_expired = report.purged_expired.len(),
            "sweep changed collection"
        );
        Ok(Some(SweepNotice { at: now, report }))
    }

    /// Tick `count` times in the foreground, sleeping one interval between
    /// ticks. Failed ticks are logged and skipped. Returns the number of
    /// notices delivered.
    pub fn run_ticks(&self, count: usize, mut on_change: impl FnMut(&SweepNotice)) -> usize {
        let mut delivered = 0;
        for n in 0..count {
            if n > 0 {
                thread::sleep(self.interval);
            }
            if self.tick_and_notify(&mut on_change) {
                delivered += 1;
            }
        }
        delivered
    }

    fn tick_and_notify(&self, on_change: &mut impl FnMut(&SweepNotice)) -> bool {
        match self.tick() {
            Ok(Some(notice)) => {
                on_change(&notice);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "sweep failed, retrying next tick");
                false
            }
        }
    }

    /// Spawn the timer thread. The first sweep runs one interval after start.
    ///
    /// The returned handle owns the thread; stopping or dropping it joins the
    /// thread, after which no further tick runs.
    pub fn start<F>(self, on_change: F) -> std::io::Result<SchedulerHandle>
    where
        F: FnMut(&SweepNotice) + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let ticks = Arc::new(AtomicU64::new(0));
        let ticks_in_thread = Arc::clone(&ticks);
        let interval = self.interval;

        let thread = thread::Builder::new()
            .name("lapse-sweep".to_string())
            .spawn(move || {
                let mut on_change = on_change;
                info!(?interval, "sweep scheduler started");
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.tick_and_notify(&mut on_change);
                            ticks_in_thread.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("sweep scheduler stopped");
            })?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
            ticks,
        })
    }
}

/// Owner of a running scheduler thread.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    ticks: Arc<AtomicU64>,
}

impl SchedulerHandle {
    /// Ticks completed so far, successful or not.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("sweep scheduler thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
