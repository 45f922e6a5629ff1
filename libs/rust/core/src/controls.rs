//! Manual retrain controls: start, reset (confirmed), and the one-shot queries.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::client::{ActionResponse, ApiError, BackendApi};
use crate::store::StatusStore;

pub const RESET_PROMPT: &str = "Reset progress retrain? Status retrain saat ini akan dikembalikan ke idle.";
pub const RESET_CANCELLED: &str = "Reset dibatalkan.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind { Success, Warning, Error, Cancelled }

/// Outcome of a manual action, ready to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    fn new(kind: NoticeKind, text: impl Into<String>) -> Self { Self { kind, text: text.into() } }
    pub fn is_success(&self) -> bool { self.kind == NoticeKind::Success }

    fn from_action(res: Result<ActionResponse, ApiError>) -> Self {
        match res {
            Ok(ActionResponse { success: Some(false), message }) => Notice::new(NoticeKind::Warning, message),
            Ok(ActionResponse { message, .. }) => Notice::new(NoticeKind::Success, message),
            Err(e) => Notice::new(NoticeKind::Error, e.user_message()),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let icon = match self.kind { NoticeKind::Success => "✅", NoticeKind::Warning => "⚠️", NoticeKind::Error => "❌", NoticeKind::Cancelled => "↩️" };
        write!(f, "{icon} {}", self.text)
    }
}

/// User confirmation gate for destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool { self(prompt) }
}

/// Skips the prompt, for callers that already have consent (e.g. `--yes`).
pub struct AssumeYes;
impl Confirm for AssumeYes { fn confirm(&self, _prompt: &str) -> bool { true } }

pub async fn start_retrain(api: &dyn BackendApi) -> Notice {
    let notice = Notice::from_action(api.start_retrain().await);
    info!(kind=?notice.kind, text=%notice.text, "retrain_start_requested");
    notice
}

/// Reset the backend progress after confirmation, then resynchronize `store` by re-fetching.
pub async fn reset_progress(api: &dyn BackendApi, confirm: &dyn Confirm, store: Option<&StatusStore>) -> Notice {
    if !confirm.confirm(RESET_PROMPT) {
        return Notice::new(NoticeKind::Cancelled, RESET_CANCELLED);
    }
    let notice = Notice::from_action(api.reset_progress().await);
    info!(kind=?notice.kind, text=%notice.text, "retrain_reset_requested");
    if notice.is_success() {
        if let Some(store) = store {
            let outcome = store.refresh().await;
            if outcome != crate::poller::PollOutcome::Applied { warn!(?outcome, "post_reset_refresh_not_applied"); }
        }
    }
    notice
}

pub async fn trigger_retrain(api: &dyn BackendApi, force: bool, background: bool) -> Notice {
    match api.trigger_retrain(force, background).await {
        Ok(r) if r.success => Notice::new(NoticeKind::Success, r.message),
        Ok(r) => Notice::new(NoticeKind::Warning, r.message),
        Err(e) => Notice::new(NoticeKind::Error, e.user_message()),
    }
}
