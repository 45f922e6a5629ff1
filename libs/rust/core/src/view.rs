//! A mounted status view: renders the store's snapshot and refreshes elapsed/remaining
//! once per `tick` while a run is in progress.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use hoaxguard_schedule::{FirstTick, RecurringTask};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::poller::StoreState;
use crate::presentation::StatusPanel;
use crate::store::{StatusStore, Subscription};
use crate::timing::{needs_ticking, SharedClock};

pub struct StatusView {
    panel: watch::Receiver<StatusPanel>,
    ticker: Arc<Mutex<Option<RecurringTask>>>,
    task: JoinHandle<()>,
    // declared last: released after the render task is aborted
    _subscription: Subscription,
}

#[derive(Clone)]
struct Renderer {
    clock: SharedClock,
    idle_elapsed: Arc<str>,
    out: Arc<watch::Sender<StatusPanel>>,
}

impl Renderer {
    fn render(&self, st: &StoreState) -> StatusPanel {
        StatusPanel::render(st.snapshot.as_deref(), st.last_error.as_deref(), self.clock.now(), &self.idle_elapsed)
    }

    fn publish(&self, st: &StoreState) {
        let next = self.render(st);
        self.out.send_if_modified(|cur| if *cur == next { false } else { *cur = next; true });
    }
}

impl StatusView {
    /// Subscribe to `store` and start rendering.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn mount(store: &StatusStore, tick: Duration, idle_elapsed: &str) -> Self {
        let subscription = store.subscribe();
        let mut rx = subscription.receiver();
        let renderer = Renderer { clock: store.clock(), idle_elapsed: Arc::from(idle_elapsed), out: Arc::new(watch::channel(StatusPanel::render(None, None, 0.0, idle_elapsed)).0) };
        renderer.publish(&rx.borrow());
        let panel = renderer.out.subscribe();
        let ticker: Arc<Mutex<Option<RecurringTask>>> = Arc::new(Mutex::new(None));
        let slot = ticker.clone();
        let task = tokio::spawn(async move {
            loop {
                let st = rx.borrow_and_update().clone();
                renderer.publish(&st);
                // a new snapshot always replaces the previous timer
                let next = if needs_ticking(st.snapshot.as_deref()) {
                    let r = renderer.clone();
                    let tick_rx = rx.clone();
                    Some(RecurringTask::spawn("status-view-tick", tick, FirstTick::AfterPeriod, move |n| {
                        trace!(tick = n, "status_view_tick");
                        r.publish(&tick_rx.borrow());
                    }))
                } else {
                    None
                };
                *slot.lock() = next;
                if rx.changed().await.is_err() { break; }
            }
        });
        Self { panel, ticker, task, _subscription: subscription }
    }

    pub fn panel(&self) -> StatusPanel { self.panel.borrow().clone() }
    /// Receiver that wakes whenever the rendered panel changes.
    pub fn changes(&self) -> watch::Receiver<StatusPanel> { self.panel.clone() }
    /// Whether the elapsed/remaining timer is currently armed.
    pub fn is_ticking(&self) -> bool { self.ticker.lock().is_some() }
}

impl Drop for StatusView {
    fn drop(&mut self) {
        self.task.abort();
        self.ticker.lock().take();
    }
}
