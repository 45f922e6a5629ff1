//! REST client for the classification backend's retrain and model endpoints.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::metrics::record_request;
use crate::progress::RetrainProgress;

pub const MSG_BACKEND_UNREACHABLE: &str = "Tidak dapat terhubung ke backend. Pastikan backend berjalan.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("backend returned status {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Http { status: u16, detail: Option<String> },
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text safe to show to a user. HTTP `detail` is passed through verbatim; malformed bodies count as unreachable.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) | ApiError::Decode(_) => MSG_BACKEND_UNREACHABLE.to_string(),
            ApiError::Http { detail: Some(d), .. } => d.clone(),
            ApiError::Http { status, detail: None } => format!("Permintaan gagal (status {status})."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion { pub version: String }

/// Body of the retrain POST endpoints. `success: false` is a refusal, not a transport error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainReadiness {
    pub should_retrain: bool,
    pub new_feedback_count: u64,
    pub message: String,
    pub threshold: u64,
    pub total_feedback: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainHistory {
    #[serde(default)]
    pub total_retrains: u64,
    #[serde(default)]
    pub last_retrain: Option<serde_json::Value>,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub history: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub is_background: bool,
    #[serde(default)]
    pub status: Option<String>,
}

/// Backend operations used by the monitor.
#[async_trait]
pub trait BackendApi: Send + Sync {
    async fn retrain_progress(&self) -> Result<RetrainProgress, ApiError>;
    async fn start_retrain(&self) -> Result<ActionResponse, ApiError>;
    async fn reset_progress(&self) -> Result<ActionResponse, ApiError>;
    async fn model_version(&self) -> Result<ModelVersion, ApiError>;
    async fn retrain_readiness(&self, threshold: Option<u32>) -> Result<RetrainReadiness, ApiError>;
    async fn retrain_history(&self) -> Result<RetrainHistory, ApiError>;
    async fn trigger_retrain(&self, force: bool, background: bool) -> Result<TriggerResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url: base_url.trim_end_matches('/').to_string(), http })
    }

    pub fn base_url(&self) -> &str { &self.base_url }

    fn url(&self, path: &str) -> String { format!("{}{}", self.base_url, path) }

    async fn send<T: DeserializeOwned>(&self, endpoint: &'static str, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let res = self.exchange(req).await;
        record_request(endpoint, res.is_ok());
        if let Err(e) = &res { debug!(endpoint, error=%e, "backend_request_failed"); }
        res
    }

    async fn exchange<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::Http { status: status.as_u16(), detail: extract_detail(&body) });
        }
        serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// `detail` from a failure body; structured details (validation errors) are kept as compact JSON.
fn extract_detail(body: &[u8]) -> Option<String> {
    let v: serde_json::Value = serde_json::from_slice(body).ok()?;
    match v.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl BackendApi for HttpBackend {
    #[instrument(skip(self), level = "debug")]
    async fn retrain_progress(&self) -> Result<RetrainProgress, ApiError> {
        self.send("progress", self.http.get(self.url("/retrain/progress"))).await
    }

    #[instrument(skip(self))]
    async fn start_retrain(&self) -> Result<ActionResponse, ApiError> {
        self.send("start", self.http.post(self.url("/retrain/start"))).await
    }

    #[instrument(skip(self))]
    async fn reset_progress(&self) -> Result<ActionResponse, ApiError> {
        self.send("reset", self.http.post(self.url("/retrain/reset"))).await
    }

    async fn model_version(&self) -> Result<ModelVersion, ApiError> {
        self.send("model_version", self.http.get(self.url("/model/version"))).await
    }

    async fn retrain_readiness(&self, threshold: Option<u32>) -> Result<RetrainReadiness, ApiError> {
        let mut req = self.http.get(self.url("/retrain/status"));
        if let Some(t) = threshold { req = req.query(&[("threshold", t)]); }
        self.send("readiness", req).await
    }

    async fn retrain_history(&self) -> Result<RetrainHistory, ApiError> {
        self.send("history", self.http.get(self.url("/retrain/history"))).await
    }

    #[instrument(skip(self))]
    async fn trigger_retrain(&self, force: bool, background: bool) -> Result<TriggerResponse, ApiError> {
        let req = self.http.post(self.url("/retrain/trigger")).query(&[("force", force), ("background", background)]);
        self.send("trigger", req).await
    }
}
