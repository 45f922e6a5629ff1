//! Mock classification backend serving the retrain endpoints on an ephemeral port.
#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ProgressMode { Ok, Fail(u16, Value), Malformed }

#[derive(Debug)]
pub struct MockState {
    pub progress: Value,
    pub mode: ProgressMode,
    pub already_running: bool,
    pub progress_calls: usize,
    pub start_calls: usize,
    pub reset_calls: usize,
    pub last_threshold: Option<String>,
    pub last_trigger: Option<(String, String)>,
}

#[derive(Clone)]
pub struct Mock(pub Arc<Mutex<MockState>>);

pub fn idle_progress() -> Value {
    json!({"is_running": false, "progress": 0, "stage": "idle", "message": "No retrain in progress",
           "started_at": null, "estimated_completion": null, "current_epoch": 0, "total_epochs": 3, "error": null})
}

impl Mock {
    pub fn new(progress: Value) -> Self {
        Self(Arc::new(Mutex::new(MockState {
            progress,
            mode: ProgressMode::Ok,
            already_running: false,
            progress_calls: 0,
            start_calls: 0,
            reset_calls: 0,
            last_threshold: None,
            last_trigger: None,
        })))
    }

    /// Serve on 127.0.0.1 and return the base URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route("/retrain/progress", get(progress))
            .route("/retrain/start", post(start))
            .route("/retrain/reset", post(reset))
            .route("/retrain/status", get(readiness))
            .route("/retrain/history", get(history))
            .route("/retrain/trigger", post(trigger))
            .route("/model/version", get(|| async { Json(json!({"version": "v2"})) }))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }
}

/// A base URL nothing listens on.
pub async fn dead_base_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn progress(State(m): State<Mock>) -> Response {
    let mut st = m.0.lock();
    st.progress_calls += 1;
    match st.mode.clone() {
        ProgressMode::Ok => Json(st.progress.clone()).into_response(),
        ProgressMode::Fail(code, body) => (StatusCode::from_u16(code).unwrap(), Json(body)).into_response(),
        ProgressMode::Malformed => (StatusCode::OK, "<html>gateway</html>").into_response(),
    }
}

async fn start(State(m): State<Mock>) -> Json<Value> {
    let mut st = m.0.lock();
    st.start_calls += 1;
    if st.already_running {
        return Json(json!({"success": false, "message": "Retrain sudah sedang berjalan. Tunggu hingga selesai atau reset progress terlebih dahulu."}));
    }
    Json(json!({"success": true, "message": "Retrain berhasil dimulai. Proses berjalan di background."}))
}

async fn reset(State(m): State<Mock>) -> Json<Value> {
    let mut st = m.0.lock();
    st.reset_calls += 1;
    st.progress = idle_progress();
    Json(json!({"success": true, "message": "Retrain progress berhasil direset"}))
}

async fn readiness(State(m): State<Mock>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let threshold = q.get("threshold").cloned();
    m.0.lock().last_threshold = threshold.clone();
    let t: u64 = threshold.and_then(|v| v.parse().ok()).unwrap_or(100);
    Json(json!({"should_retrain": t <= 20, "new_feedback_count": 20, "message": "Feedback baru: 20", "threshold": t, "total_feedback": 480}))
}

async fn history() -> Json<Value> {
    Json(json!({"total_retrains": 2, "last_retrain": {"version": "v2", "timestamp": "2024-05-01T10:00:00"}, "current_version": "v2",
                "history": [{"version": "v1"}, {"version": "v2"}]}))
}

async fn trigger(State(m): State<Mock>, Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    let force = q.get("force").cloned().unwrap_or_default();
    let background = q.get("background").cloned().unwrap_or_default();
    m.0.lock().last_trigger = Some((force.clone(), background.clone()));
    if force == "true" {
        Json(json!({"success": true, "message": "Retrain job dimulai di background.", "is_background": background == "true", "status": "started"}))
    } else {
        Json(json!({"success": false, "message": "Retrain tidak diperlukan.", "is_background": false, "status": "skipped"}))
    }
}
