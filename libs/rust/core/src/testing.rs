//! In-memory backend double for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::client::*;
use crate::progress::{RetrainProgress, Stage};

pub fn running(progress: u8) -> RetrainProgress {
    RetrainProgress {
        is_running: true,
        progress,
        stage: Stage::Training,
        message: format!("Training {progress}%"),
        started_at: Some(1_699_999_000.0),
        estimated_completion: Some(1_700_036_000.0),
        current_epoch: Some(1),
        total_epochs: Some(3),
        error: None,
    }
}

#[derive(Clone)]
pub enum Outcome { Ok(RetrainProgress), Malformed, Status(u16, Option<String>) }

#[derive(Clone)]
pub struct Reply { outcome: Outcome, delay: Option<Duration> }

impl Reply {
    pub fn ok(p: RetrainProgress) -> Self { Self { outcome: Outcome::Ok(p), delay: None } }
    pub fn malformed() -> Self { Self { outcome: Outcome::Malformed, delay: None } }
    pub fn status(code: u16) -> Self { Self { outcome: Outcome::Status(code, None), delay: None } }
    pub fn after(mut self, d: Duration) -> Self { self.delay = Some(d); self }
}

/// Serves progress replies in order, repeating the last one once the script runs out.
pub struct ScriptedBackend {
    origin: Instant,
    script: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    progress_calls: Mutex<Vec<u128>>,
    pub action: Mutex<Result<ActionResponse, (u16, Option<String>)>>,
    pub action_calls: Mutex<Vec<&'static str>>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            progress_calls: Mutex::new(Vec::new()),
            action: Mutex::new(Ok(ActionResponse { success: Some(true), message: "ok".into() })),
            action_calls: Mutex::new(Vec::new()),
        })
    }

    pub fn push(&self, reply: Reply) { self.script.lock().push_back(reply); }

    /// Milliseconds since construction at which each progress call arrived.
    pub fn progress_calls_ms(&self) -> Vec<u128> { self.progress_calls.lock().clone() }

    fn next_reply(&self) -> Reply {
        let next = self.script.lock().pop_front();
        let mut last = self.last.lock();
        match next {
            Some(r) => { *last = Some(r.clone()); r }
            None => last.clone().unwrap_or_else(|| Reply::ok(RetrainProgress::idle())),
        }
    }

    fn action_reply(&self, name: &'static str) -> Result<ActionResponse, ApiError> {
        self.action_calls.lock().push(name);
        self.action.lock().clone().map_err(|(status, detail)| ApiError::Http { status, detail })
    }
}

#[async_trait]
impl BackendApi for ScriptedBackend {
    async fn retrain_progress(&self) -> Result<RetrainProgress, ApiError> {
        self.progress_calls.lock().push(self.origin.elapsed().as_millis());
        let reply = self.next_reply();
        if let Some(d) = reply.delay { tokio::time::sleep(d).await; }
        match reply.outcome {
            Outcome::Ok(p) => Ok(p),
            Outcome::Malformed => Err(ApiError::Decode("expected value at line 1 column 1".into())),
            Outcome::Status(status, detail) => Err(ApiError::Http { status, detail }),
        }
    }

    async fn start_retrain(&self) -> Result<ActionResponse, ApiError> { self.action_reply("start") }
    async fn reset_progress(&self) -> Result<ActionResponse, ApiError> { self.action_reply("reset") }

    async fn model_version(&self) -> Result<ModelVersion, ApiError> { Ok(ModelVersion { version: "v3".into() }) }

    async fn retrain_readiness(&self, threshold: Option<u32>) -> Result<RetrainReadiness, ApiError> {
        let threshold = threshold.unwrap_or(100) as u64;
        Ok(RetrainReadiness { should_retrain: false, new_feedback_count: 12, message: "Belum cukup feedback".into(), threshold, total_feedback: 240 })
    }

    async fn retrain_history(&self) -> Result<RetrainHistory, ApiError> {
        Ok(RetrainHistory { total_retrains: 0, last_retrain: None, current_version: Some("v1".into()), history: vec![] })
    }

    async fn trigger_retrain(&self, force: bool, background: bool) -> Result<TriggerResponse, ApiError> {
        self.action_calls.lock().push("trigger");
        Ok(TriggerResponse { success: force, message: "triggered".into(), is_background: background, status: Some("started".into()) })
    }
}
