use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, info, warn};
use hoaxguard_core::{
    clear_ready, init_metrics, init_tracing, load_config, mark_ready, reset_progress, start_health_server, start_retrain,
    trigger_retrain, BackendApi, Confirm, HttpBackend, MonitorConfig, StatusPanel, StatusStore, StatusView, SystemClock,
    AssumeYes, Clock,
};

mod cli;
use cli::{Cli, Command};

/// Reads a y/N answer from stdin.
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if std::io::stdout().flush().is_err() { return false; }
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes" | "ya"),
            Err(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.apply(load_config()?)?;
    init_tracing("retrain-monitor", &cfg.log_level)?;
    init_metrics();
    let api: Arc<dyn BackendApi> = Arc::new(HttpBackend::new(&cfg.api_base_url, cfg.request_timeout())?);
    info!(api = %cfg.api_base_url, "retrain-monitor starting");

    match cli.resolved_command() {
        Command::Watch => watch(&cfg, api).await?,
        Command::Status => {
            let store = StatusStore::new(api, Arc::new(SystemClock), cfg.poll_interval());
            store.refresh().await;
            let st = store.current();
            let panel = StatusPanel::render(st.snapshot.as_deref(), st.last_error.as_deref(), store.clock().now(), &cfg.idle_elapsed_placeholder);
            println!("{panel}");
        }
        Command::Start => println!("{}", start_retrain(api.as_ref()).await),
        Command::Reset { yes } => {
            let confirm: &dyn Confirm = if yes { &AssumeYes } else { &StdinConfirm };
            println!("{}", reset_progress(api.as_ref(), confirm, None).await);
        }
        Command::Version => match api.model_version().await {
            Ok(v) => println!("{}", v.version),
            Err(e) => println!("❌ {}", e.user_message()),
        },
        Command::Readiness { threshold } => match api.retrain_readiness(threshold).await {
            Ok(r) => println!("{}", serde_json::to_string_pretty(&r)?),
            Err(e) => println!("❌ {}", e.user_message()),
        },
        Command::History => match api.retrain_history().await {
            Ok(h) => println!("{}", serde_json::to_string_pretty(&h)?),
            Err(e) => println!("❌ {}", e.user_message()),
        },
        Command::Trigger { force, foreground } => println!("{}", trigger_retrain(api.as_ref(), force, !foreground).await),
    }
    Ok(())
}

async fn watch(cfg: &MonitorConfig, api: Arc<dyn BackendApi>) -> Result<()> {
    let store = StatusStore::new(api.clone(), Arc::new(SystemClock), cfg.poll_interval());
    start_health_server(cfg.health_port, store.clone(), &cfg.idle_elapsed_placeholder).await?;
    match api.model_version().await {
        Ok(v) => info!(version = %v.version, "active_model"),
        Err(e) => warn!(error = %e.user_message(), "model_version_unavailable"),
    }
    let view = StatusView::mount(&store, cfg.tick_interval(), &cfg.idle_elapsed_placeholder);
    mark_ready();

    let mut changes = view.changes();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_key: Option<String> = None;
    loop {
        tokio::select! {
            res = changes.changed() => {
                if res.is_err() { break; }
                let panel = changes.borrow_and_update().clone();
                let key = format!("{}|{}|{}|{:?}|{:?}", panel.badge, panel.percentage, panel.message, panel.error, panel.connection_note);
                if last_key.as_deref() != Some(key.as_str()) {
                    info!(status = %panel, "retrain_status");
                    last_key = Some(key);
                } else {
                    debug!(elapsed = %panel.elapsed, remaining = %panel.remaining, "retrain_status_tick");
                }
            }
            _ = &mut shutdown => {
                info!("shutdown_signal_received");
                break;
            }
        }
    }
    clear_ready();
    drop(view);
    Ok(())
}
