//! Scheduling utilities: fixed-interval recurring tasks that stop when their handle drops.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// When the first tick of a [`RecurringTask`] fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick { Immediate, AfterPeriod }

/// A callback driven on a fixed cadence by a spawned tokio task.
///
/// The cadence never adapts to how long the callback or the work it spawns takes:
/// ticks missed while the runtime was busy are skipped, not replayed in a burst.
/// Dropping the handle aborts the task, so a timer can never outlive its owner.
#[derive(Debug)]
pub struct RecurringTask {
    name: &'static str,
    period: Duration,
    ticks: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl RecurringTask {
    /// Spawn onto the current tokio runtime. The callback receives the 1-based tick number.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, first: FirstTick, mut f: F) -> Self
    where F: FnMut(u64) + Send + 'static {
        let period = period.max(Duration::from_millis(1));
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let start = match first { FirstTick::Immediate => Instant::now(), FirstTick::AfterPeriod => Instant::now() + period };
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                trace!(task = name, tick = n, "recurring_tick");
                f(n);
            }
        });
        debug!(task = name, period_ms = period.as_millis() as u64, "recurring_task_started");
        Self { name, period, ticks, handle }
    }

    pub fn period(&self) -> Duration { self.period }
    /// Number of ticks delivered so far.
    pub fn ticks(&self) -> u64 { self.ticks.load(Ordering::SeqCst) }
    pub fn is_running(&self) -> bool { !self.handle.is_finished() }

    /// Stop the task. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for RecurringTask {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(task = self.name, ticks = self.ticks(), "recurring_task_cancelled");
    }
}
