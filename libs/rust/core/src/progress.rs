//! Retrain progress snapshot as published by the backend on `GET /retrain/progress`.
//!
//! A snapshot is immutable once received. The client only checks it for anomalies
//! (progress regressions, broken invariants) and reports them; it never rejects one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A run reported as running for longer than this is considered stale by the backend.
pub const STALE_AFTER_SECS: f64 = 86_400.0;

/// Phase of a retrain job. Transitions are decided by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stage {
    Idle,
    Preparing,
    Training,
    Evaluating,
    Saving,
    Uploading,
    Completed,
    Failed,
    /// Token outside the known set, kept verbatim.
    Other(String),
}

impl Stage {
    pub const KNOWN: [Stage; 8] = [
        Stage::Idle, Stage::Preparing, Stage::Training, Stage::Evaluating,
        Stage::Saving, Stage::Uploading, Stage::Completed, Stage::Failed,
    ];

    pub fn from_token(token: &str) -> Self {
        match token {
            "idle" => Stage::Idle,
            "preparing" => Stage::Preparing,
            "training" => Stage::Training,
            "evaluating" => Stage::Evaluating,
            "saving" => Stage::Saving,
            "uploading" => Stage::Uploading,
            "completed" => Stage::Completed,
            "failed" => Stage::Failed,
            other => Stage::Other(other.to_string()),
        }
    }

    pub fn token(&self) -> &str {
        match self {
            Stage::Idle => "idle",
            Stage::Preparing => "preparing",
            Stage::Training => "training",
            Stage::Evaluating => "evaluating",
            Stage::Saving => "saving",
            Stage::Uploading => "uploading",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
            Stage::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool { !matches!(self, Stage::Other(_)) }
}

impl From<String> for Stage { fn from(s: String) -> Self { Stage::from_token(&s) } }
impl From<Stage> for String { fn from(s: Stage) -> Self { s.token().to_string() } }
impl fmt::Display for Stage { fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.token()) } }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainProgress {
    pub is_running: bool,
    #[serde(default)]
    pub progress: u8,
    pub stage: Stage,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub started_at: Option<f64>,
    #[serde(default)]
    pub estimated_completion: Option<f64>,
    #[serde(default)]
    pub current_epoch: Option<u32>,
    #[serde(default)]
    pub total_epochs: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A broken snapshot invariant. Reported, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    ProgressRegressed { from: u8, to: u8 },
    ProgressOutOfRange(u8),
    CompletionBeforeStart { started_at: f64, estimated_completion: f64 },
    ErrorWithoutFailure,
    FailureWithoutError,
    UnpairedEpochs,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::ProgressRegressed { from, to } => write!(f, "progress regressed from {from} to {to} while running"),
            Anomaly::ProgressOutOfRange(p) => write!(f, "progress {p} outside 0..100"),
            Anomaly::CompletionBeforeStart { started_at, estimated_completion } => write!(f, "estimated_completion {estimated_completion} precedes started_at {started_at}"),
            Anomaly::ErrorWithoutFailure => f.write_str("error populated on a non-failed stage"),
            Anomaly::FailureWithoutError => f.write_str("failed stage without error"),
            Anomaly::UnpairedEpochs => f.write_str("current_epoch and total_epochs not both present"),
        }
    }
}

impl RetrainProgress {
    /// Idle snapshot, matching the backend's reset state.
    pub fn idle() -> Self {
        Self {
            is_running: false,
            progress: 0,
            stage: Stage::Idle,
            message: "No retrain in progress".into(),
            started_at: None,
            estimated_completion: None,
            current_epoch: None,
            total_epochs: None,
            error: None,
        }
    }

    /// Progress clamped to 0..=100 for display.
    pub fn percent(&self) -> u8 { self.progress.min(100) }

    pub fn epochs(&self) -> Option<(u32, u32)> {
        match (self.current_epoch, self.total_epochs) { (Some(c), Some(t)) => Some((c, t)), _ => None }
    }

    /// True when the run has been marked running for longer than [`STALE_AFTER_SECS`].
    pub fn is_stale(&self, now: f64) -> bool {
        self.is_running && self.started_at.map(|s| now - s > STALE_AFTER_SECS).unwrap_or(false)
    }

    /// Invariants that hold within a single snapshot.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        let mut out = Vec::new();
        if self.progress > 100 { out.push(Anomaly::ProgressOutOfRange(self.progress)); }
        if let (Some(s), Some(e)) = (self.started_at, self.estimated_completion) {
            if e < s { out.push(Anomaly::CompletionBeforeStart { started_at: s, estimated_completion: e }); }
        }
        match (self.stage == Stage::Failed, self.error.is_some()) {
            (false, true) => out.push(Anomaly::ErrorWithoutFailure),
            (true, false) => out.push(Anomaly::FailureWithoutError),
            _ => {}
        }
        if self.current_epoch.is_some() != self.total_epochs.is_some() { out.push(Anomaly::UnpairedEpochs); }
        out
    }

    /// Invariants across two consecutive snapshots (`self` being the newer one).
    pub fn anomalies_since(&self, previous: &RetrainProgress) -> Vec<Anomaly> {
        let mut out = self.anomalies();
        if previous.is_running && self.is_running && self.progress < previous.progress {
            out.push(Anomaly::ProgressRegressed { from: previous.progress, to: self.progress });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(progress: u8) -> RetrainProgress {
        RetrainProgress { is_running: true, progress, stage: Stage::Training, message: "Training".into(), started_at: Some(100.0), estimated_completion: Some(200.0), current_epoch: Some(1), total_epochs: Some(3), error: None }
    }

    #[test]
    fn parses_backend_payload() {
        let body = r#"{"is_running":true,"progress":42,"stage":"training","message":"Epoch 1/3","started_at":1700000000.5,"estimated_completion":1700036000.5,"current_epoch":1,"total_epochs":3,"error":null}"#;
        let p: RetrainProgress = serde_json::from_str(body).unwrap();
        assert_eq!(p.stage, Stage::Training);
        assert_eq!(p.progress, 42);
        assert_eq!(p.epochs(), Some((1, 3)));
        assert!(p.anomalies().is_empty());
    }

    #[test]
    fn unknown_stage_is_kept_verbatim() {
        let p: RetrainProgress = serde_json::from_str(r#"{"is_running":false,"progress":0,"stage":"quantizing","message":""}"#).unwrap();
        assert_eq!(p.stage, Stage::Other("quantizing".into()));
        assert!(!p.stage.is_known());
        assert_eq!(serde_json::to_value(&p).unwrap()["stage"], "quantizing");
    }

    #[test]
    fn known_tokens_round_trip() {
        for stage in Stage::KNOWN.iter() {
            assert_eq!(&Stage::from_token(stage.token()), stage);
            assert!(stage.is_known());
        }
    }

    #[test]
    fn regression_while_running_is_reported() {
        let found = running(30).anomalies_since(&running(40));
        assert_eq!(found, vec![Anomaly::ProgressRegressed { from: 40, to: 30 }]);
        let mut restarted = running(5);
        let mut done = running(100);
        done.is_running = false;
        restarted.started_at = Some(300.0);
        restarted.estimated_completion = Some(400.0);
        assert!(restarted.anomalies_since(&done).is_empty());
    }

    #[test]
    fn error_iff_failed() {
        let mut p = running(50);
        p.error = Some("OOM".into());
        assert_eq!(p.anomalies(), vec![Anomaly::ErrorWithoutFailure]);
        p.stage = Stage::Failed;
        assert!(p.anomalies().is_empty());
        p.error = None;
        assert_eq!(p.anomalies(), vec![Anomaly::FailureWithoutError]);
    }

    #[test]
    fn ordering_and_pairing_checks() {
        let mut p = running(10);
        p.estimated_completion = Some(50.0);
        p.total_epochs = None;
        let found = p.anomalies();
        assert!(found.contains(&Anomaly::CompletionBeforeStart { started_at: 100.0, estimated_completion: 50.0 }));
        assert!(found.contains(&Anomaly::UnpairedEpochs));
    }

    #[test]
    fn stale_after_a_day() {
        let p = running(10);
        assert!(!p.is_stale(100.0 + STALE_AFTER_SECS));
        assert!(p.is_stale(100.0 + STALE_AFTER_SECS + 1.0));
        assert!(!RetrainProgress::idle().is_stale(f64::MAX));
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(running(250).percent(), 100);
        assert_eq!(running(250).anomalies(), vec![Anomaly::ProgressOutOfRange(250)]);
    }
}
