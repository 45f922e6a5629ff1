//! Shared status store: one snapshot and one poll timer for every view that watches it.
//!
//! The poll timer runs only while at least one [`Subscription`] is alive. Each store
//! reports its gauges under its own `store` label.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use hoaxguard_schedule::RecurringTask;
use tokio::sync::watch;
use tracing::info;

use crate::client::BackendApi;
use crate::metrics::METRICS;
use crate::poller::{PollOutcome, ProgressPoller, StoreState};
use crate::timing::SharedClock;

#[derive(Clone)]
pub struct StatusStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    poller: Arc<ProgressPoller>,
    poll_interval: Duration,
    viewers: Mutex<Viewers>,
}

impl StoreInner {
    fn report_subscribers(&self, count: usize) {
        METRICS.active_subscribers.with_label_values(&[self.poller.label()]).set(count as i64);
    }
}

#[derive(Default)]
struct Viewers {
    count: usize,
    timer: Option<RecurringTask>,
}

impl StatusStore {
    pub fn new(api: Arc<dyn BackendApi>, clock: SharedClock, poll_interval: Duration) -> Self {
        let poller = ProgressPoller::new(api, clock);
        Self { inner: Arc::new(StoreInner { poller, poll_interval, viewers: Mutex::new(Viewers::default()) }) }
    }

    /// Register a viewer. The first one starts polling.
    ///
    /// # Panics
    ///
    /// Panics if the first subscription is taken outside a tokio runtime, since it spawns the poll timer.
    pub fn subscribe(&self) -> Subscription {
        let mut v = self.inner.viewers.lock();
        v.count += 1;
        self.inner.report_subscribers(v.count);
        if v.timer.is_none() {
            v.timer = Some(self.inner.poller.start(self.inner.poll_interval));
        }
        Subscription { rx: self.inner.poller.subscribe(), inner: self.inner.clone() }
    }

    pub fn current(&self) -> StoreState { self.inner.poller.current() }
    pub fn subscriber_count(&self) -> usize { self.inner.viewers.lock().count }
    pub fn is_polling(&self) -> bool { self.inner.viewers.lock().timer.is_some() }
    pub fn clock(&self) -> SharedClock { self.inner.poller.clock().clone() }
    /// Value of the `store` label on this store's metrics.
    pub fn metrics_label(&self) -> &str { self.inner.poller.label() }
    /// Fetches issued so far, including refreshes.
    pub fn fetches_issued(&self) -> u64 { self.inner.poller.issued() }

    /// Fetch now, outside the regular cadence, under the same ordering rules as scheduled polls.
    pub async fn refresh(&self) -> PollOutcome {
        match self.inner.poller.issue().await {
            Ok(outcome) => outcome,
            // only reachable if the runtime is shutting down
            Err(_) => PollOutcome::Discarded,
        }
    }
}

/// A live viewer of the store. Dropping it releases the viewer slot.
pub struct Subscription {
    rx: watch::Receiver<StoreState>,
    inner: Arc<StoreInner>,
}

impl Subscription {
    pub fn state(&self) -> StoreState { self.rx.borrow().clone() }
    pub fn receiver(&self) -> watch::Receiver<StoreState> { self.rx.clone() }
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> { self.rx.changed().await }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut v = self.inner.viewers.lock();
        v.count = v.count.saturating_sub(1);
        self.inner.report_subscribers(v.count);
        if v.count == 0 && v.timer.take().is_some() {
            info!("progress_polling_stopped");
        }
    }
}
