//! Fixed-cadence progress poller.
//!
//! Every tick issues one fetch tagged with a sequence number and spawns it; fetches are
//! never cancelled by later ticks. Results land in a `watch` channel under
//! "last issued wins": a snapshot older than the one already applied is discarded.
//! Failures keep the held snapshot and only record the user-facing error text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use hoaxguard_schedule::{FirstTick, RecurringTask};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ApiError, BackendApi};
use crate::metrics::METRICS;
use crate::progress::{Anomaly, RetrainProgress};
use crate::timing::SharedClock;

/// What the store currently knows. Replaced, never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub snapshot: Option<Arc<RetrainProgress>>,
    /// User-facing text of the most recent poll outcome, if it failed.
    pub last_error: Option<String>,
    /// Sequence number of the applied snapshot (0 before the first success).
    pub applied_seq: u64,
    /// Sequence number of the newest recorded outcome, success or failure.
    pub outcome_seq: u64,
    /// Local epoch time the applied snapshot was received.
    pub fetched_at: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome { Applied, Failed, Discarded }

static NEXT_POLLER_ID: AtomicU64 = AtomicU64::new(1);

pub struct ProgressPoller {
    /// Value of the `store` label on this poller's gauges.
    label: String,
    api: Arc<dyn BackendApi>,
    clock: SharedClock,
    state: watch::Sender<StoreState>,
    issued: AtomicU64,
}

impl ProgressPoller {
    pub fn new(api: Arc<dyn BackendApi>, clock: SharedClock) -> Arc<Self> {
        let (state, _) = watch::channel(StoreState::default());
        let label = NEXT_POLLER_ID.fetch_add(1, Ordering::Relaxed).to_string();
        Arc::new(Self { label, api, clock, state, issued: AtomicU64::new(0) })
    }

    pub fn label(&self) -> &str { &self.label }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> { self.state.subscribe() }
    pub fn current(&self) -> StoreState { self.state.borrow().clone() }
    pub fn clock(&self) -> &SharedClock { &self.clock }
    /// Fetches issued so far.
    pub fn issued(&self) -> u64 { self.issued.load(Ordering::SeqCst) }

    /// Issue one fetch on a detached task.
    pub fn issue(self: &Arc<Self>) -> JoinHandle<PollOutcome> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        METRICS.polls_total.inc();
        let this = self.clone();
        tokio::spawn(async move {
            let res = this.api.retrain_progress().await;
            this.apply(seq, res)
        })
    }

    /// Start polling: one fetch now, then one every `period`.
    pub fn start(self: &Arc<Self>, period: Duration) -> RecurringTask {
        let this = self.clone();
        info!(period_ms = period.as_millis() as u64, "progress_polling_started");
        RecurringTask::spawn("retrain-progress-poll", period, FirstTick::Immediate, move |_| { this.issue(); })
    }

    fn apply(&self, seq: u64, res: Result<RetrainProgress, ApiError>) -> PollOutcome {
        let now = self.clock.now();
        let mut outcome = PollOutcome::Discarded;
        self.state.send_if_modified(|st| match res {
            Ok(snapshot) => {
                if seq <= st.applied_seq {
                    return false;
                }
                report_anomalies(seq, st.snapshot.as_deref(), &snapshot);
                METRICS.last_progress_percent.with_label_values(&[self.label.as_str()]).set(snapshot.percent() as i64);
                debug!(seq, stage=%snapshot.stage, progress = snapshot.progress, running = snapshot.is_running, "progress_applied");
                if seq > st.outcome_seq {
                    st.outcome_seq = seq;
                    st.last_error = None;
                }
                st.snapshot = Some(Arc::new(snapshot));
                st.applied_seq = seq;
                st.fetched_at = Some(now);
                outcome = PollOutcome::Applied;
                true
            }
            Err(e) => {
                METRICS.poll_failures_total.inc();
                warn!(seq, error=%e, "progress_poll_failed");
                outcome = PollOutcome::Failed;
                if seq <= st.outcome_seq {
                    return false;
                }
                st.outcome_seq = seq;
                st.last_error = Some(e.user_message());
                true
            }
        });
        if outcome == PollOutcome::Discarded {
            METRICS.stale_responses_total.inc();
            debug!(seq, "stale_progress_response_discarded");
        }
        outcome
    }
}

fn report_anomalies(seq: u64, previous: Option<&RetrainProgress>, next: &RetrainProgress) {
    let found = match previous { Some(prev) => next.anomalies_since(prev), None => next.anomalies() };
    for a in found {
        match a {
            Anomaly::ProgressRegressed { .. } => METRICS.progress_regressions_total.inc(),
            _ => METRICS.invariant_violations_total.inc(),
        }
        warn!(seq, anomaly=%a, "progress_snapshot_anomaly");
    }
}
