use clap::{Parser, Subcommand};
use hoaxguard_core::MonitorConfig;

/// Watch and control retraining of the HoaxGuard classification model
#[derive(Parser, Debug, Clone)]
#[command(name = "retrain-monitor")]
#[command(version)]
#[command(about = "Watch and control retraining of the HoaxGuard classification model")]
pub struct Cli {
    /// Backend base URL (overrides HOAXGUARD_API_BASE_URL)
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Port for /live, /ready, /status and /metrics in watch mode
    #[arg(long, global = true)]
    pub health_port: Option<u16>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll progress continuously and log status changes (default)
    Watch,
    /// Fetch progress once and print the status panel
    Status,
    /// Start a manual retrain
    Start,
    /// Reset retrain progress to idle
    Reset {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Print the active model version
    Version,
    /// Ask the backend whether enough feedback has accumulated to retrain
    Readiness {
        /// Feedback threshold (backend default when omitted)
        #[arg(short, long)]
        threshold: Option<u32>,
    },
    /// Print retrain history
    History,
    /// Trigger a retrain through the threshold-gated endpoint
    Trigger {
        /// Retrain even if the feedback threshold is not reached
        #[arg(short, long)]
        force: bool,
        /// Wait for the retrain to finish instead of running it in the background
        #[arg(long)]
        foreground: bool,
    },
}

impl Cli {
    pub fn resolved_command(&self) -> Command { self.command.clone().unwrap_or(Command::Watch) }

    /// Apply flag overrides on top of loaded configuration.
    pub fn apply(&self, mut cfg: MonitorConfig) -> Result<MonitorConfig, hoaxguard_core::config::ConfigError> {
        if let Some(url) = &self.api_url { cfg.api_base_url = url.clone(); }
        if let Some(port) = self.health_port { cfg.health_port = port; }
        cfg.validated()
    }
}
