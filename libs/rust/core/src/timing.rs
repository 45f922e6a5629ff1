//! Elapsed/remaining readout derived from a snapshot and the local clock.

use std::sync::Arc;
use tokio::time::Instant;

use crate::duration::format_hms;
use crate::progress::RetrainProgress;

/// Remaining-time placeholder when no estimate is available.
pub const UNKNOWN_PLACEHOLDER: &str = "--:--:--";
/// Default elapsed-time placeholder while idle.
pub const IDLE_ELAPSED_PLACEHOLDER: &str = "00:00:00";

/// Source of wall-clock time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 { chrono::Utc::now().timestamp_millis() as f64 / 1000.0 }
}

/// Epoch time pinned to a tokio instant; advances with the runtime clock, including paused time.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock { epoch: f64, origin: Instant }

impl AnchoredClock {
    pub fn new(epoch: f64) -> Self { Self { epoch, origin: Instant::now() } }
}

impl Clock for AnchoredClock {
    fn now(&self) -> f64 { self.epoch + self.origin.elapsed().as_secs_f64() }
}

pub type SharedClock = Arc<dyn Clock>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingReadout {
    pub elapsed: String,
    pub remaining: String,
}

impl TimingReadout {
    pub fn placeholders(idle_elapsed: &str) -> Self {
        Self { elapsed: idle_elapsed.to_string(), remaining: UNKNOWN_PLACEHOLDER.to_string() }
    }

    pub fn compute(snapshot: Option<&RetrainProgress>, now: f64, idle_elapsed: &str) -> Self {
        let Some(p) = snapshot.filter(|p| p.is_running) else { return Self::placeholders(idle_elapsed) };
        let Some(started_at) = p.started_at else { return Self::placeholders(idle_elapsed) };
        let elapsed = format_hms((now - started_at).max(0.0));
        let remaining = match p.estimated_completion {
            Some(eta) => format_hms((eta - now).max(0.0)),
            None => UNKNOWN_PLACEHOLDER.to_string(),
        };
        Self { elapsed, remaining }
    }
}

/// Whether the readout for this snapshot changes with time, i.e. needs a recurring recompute.
pub fn needs_ticking(snapshot: Option<&RetrainProgress>) -> bool {
    snapshot.map(|p| p.is_running && p.started_at.is_some()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Stage;

    const NOW: f64 = 1_700_000_000.0;

    fn running(started_at: Option<f64>, eta: Option<f64>) -> RetrainProgress {
        RetrainProgress { is_running: true, progress: 10, stage: Stage::Training, message: String::new(), started_at, estimated_completion: eta, current_epoch: None, total_epochs: None, error: None }
    }

    #[test]
    fn elapsed_and_remaining_while_running() {
        let p = running(Some(NOW - 125.0), Some(NOW + 30.0));
        let r = TimingReadout::compute(Some(&p), NOW, IDLE_ELAPSED_PLACEHOLDER);
        assert_eq!(r.elapsed, "00:02:05");
        assert_eq!(r.remaining, "00:00:30");
    }

    #[test]
    fn past_estimate_clamps_to_zero() {
        let p = running(Some(NOW - 10.0), Some(NOW - 500.0));
        assert_eq!(TimingReadout::compute(Some(&p), NOW, IDLE_ELAPSED_PLACEHOLDER).remaining, "00:00:00");
    }

    #[test]
    fn start_in_future_clamps_elapsed() {
        let p = running(Some(NOW + 5.0), None);
        let r = TimingReadout::compute(Some(&p), NOW, IDLE_ELAPSED_PLACEHOLDER);
        assert_eq!(r.elapsed, "00:00:00");
        assert_eq!(r.remaining, UNKNOWN_PLACEHOLDER);
    }

    #[test]
    fn idle_and_missing_start_use_placeholders() {
        let mut p = running(Some(NOW - 10.0), Some(NOW + 10.0));
        p.is_running = false;
        assert_eq!(TimingReadout::compute(Some(&p), NOW, "--:--:--"), TimingReadout::placeholders("--:--:--"));
        let no_start = running(None, Some(NOW + 10.0));
        assert_eq!(TimingReadout::compute(Some(&no_start), NOW, IDLE_ELAPSED_PLACEHOLDER).elapsed, IDLE_ELAPSED_PLACEHOLDER);
        assert_eq!(TimingReadout::compute(None, NOW, IDLE_ELAPSED_PLACEHOLDER).remaining, UNKNOWN_PLACEHOLDER);
        assert!(!needs_ticking(Some(&p)));
        assert!(!needs_ticking(Some(&no_start)));
        assert!(!needs_ticking(None));
    }

    #[tokio::test(start_paused = true)]
    async fn anchored_clock_follows_runtime_time() {
        let clock = AnchoredClock::new(NOW);
        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!((clock.now() - (NOW + 3.0)).abs() < 1e-6);
    }
}
