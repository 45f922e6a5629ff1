//! Core of the HoaxGuard retrain monitor: snapshot model, timing readout, backend client,
//! poller, shared status store and views, plus the tracing/metrics/health plumbing.

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static READINESS: AtomicBool = AtomicBool::new(false);
pub fn mark_ready() { READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { READINESS.store(false, Ordering::SeqCst); }

/// Install the global subscriber once. `RUST_LOG` wins over `default_level`;
/// `HOAXGUARD_JSON_LOG=1|true` switches to JSON lines.
pub fn init_tracing(service: &str, default_level: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| {
        let json = std::env::var("HOAXGUARD_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let (json_layer, text_layer) = if json {
            (Some(tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false)), None)
        } else {
            (None, Some(tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true)))
        };
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        tracing_subscriber::registry().with(env_filter).with(json_layer).with(text_layer).try_init()?;
        Ok::<(), anyhow::Error>(())
    })?;
    info!(target: "hoaxguard", service, "tracing initialized");
    Ok(())
}

/// Register the metric families so `/metrics` lists them before the first poll.
pub fn init_metrics() { once_cell::sync::Lazy::force(&metrics::METRICS); }

#[derive(Clone)]
struct HealthState {
    store: StatusStore,
    idle_elapsed: Arc<str>,
}

fn health_router(store: StatusStore, idle_elapsed: &str) -> Router {
    Router::new()
        .route("/live", get(|| async { axum::Json(serde_json::json!({"live": true})) }))
        .route("/ready", get(|| async { axum::Json(serde_json::json!({"ready": READINESS.load(Ordering::SeqCst)})) }))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(HealthState { store, idle_elapsed: Arc::from(idle_elapsed) })
}

/// Serve `/live`, `/ready`, `/status` and `/metrics` on `port` (0 picks a free port).
pub async fn start_health_server(port: u16, store: StatusStore, idle_elapsed: &str) -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    let addr = listener.local_addr()?;
    let app = health_router(store, idle_elapsed);
    info!(?addr, "health server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error=?e, "health server failed");
        }
    });
    Ok(addr)
}

async fn status_handler(State(h): State<HealthState>) -> axum::Json<serde_json::Value> {
    let st = h.store.current();
    let clock = h.store.clock();
    let panel = StatusPanel::render(st.snapshot.as_deref(), st.last_error.as_deref(), clock.now(), &h.idle_elapsed);
    axum::Json(serde_json::json!({
        "ready": READINESS.load(Ordering::SeqCst),
        "polling": h.store.is_polling(),
        "subscribers": h.store.subscriber_count(),
        "applied_seq": st.applied_seq,
        "fetched_at": st.fetched_at,
        "last_error": st.last_error,
        "snapshot": st.snapshot.as_deref(),
        "panel": panel,
    }))
}

async fn metrics_handler() -> Response {
    match metrics::gather_text() {
        Ok(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response(),
    }
}

pub mod config;
pub mod client;
pub mod controls;
pub mod duration;
pub mod metrics;
pub mod poller;
pub mod presentation;
pub mod progress;
pub mod store;
pub mod timing;
pub mod view;
#[cfg(test)]
mod testing;

pub use client::{ApiError, BackendApi, HttpBackend, ModelVersion, RetrainHistory, RetrainReadiness, TriggerResponse};
pub use config::{load_config, MonitorConfig};
pub use controls::{reset_progress, start_retrain, trigger_retrain, AssumeYes, Confirm, Notice, NoticeKind};
pub use duration::format_hms;
pub use poller::{PollOutcome, StoreState};
pub use presentation::{stage_icon, stage_style, StageStyle, StatusPanel};
pub use progress::{RetrainProgress, Stage};
pub use store::{StatusStore, Subscription};
pub use timing::{AnchoredClock, Clock, SharedClock, SystemClock, TimingReadout};
pub use view::StatusView;
