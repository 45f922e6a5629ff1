//! Stage lookup tables and the rendered status panel.

use serde::Serialize;
use std::fmt;

use crate::progress::{RetrainProgress, Stage};
use crate::timing::TimingReadout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageStyle {
    pub name: &'static str,
    pub foreground: &'static str,
    pub background: &'static str,
}

const fn style(name: &'static str, foreground: &'static str, background: &'static str) -> StageStyle {
    StageStyle { name, foreground, background }
}

pub const DEFAULT_STYLE: StageStyle = style("neutral", "#374151", "#f3f4f6");
pub const DEFAULT_ICON: &str = "⏳";

const STYLES: [(&str, StageStyle); 8] = [
    ("idle", style("gray", "#4b5563", "#f3f4f6")),
    ("preparing", style("blue", "#1d4ed8", "#dbeafe")),
    ("training", style("purple", "#7e22ce", "#f3e8ff")),
    ("evaluating", style("yellow", "#a16207", "#fef9c3")),
    ("saving", style("indigo", "#4338ca", "#e0e7ff")),
    ("uploading", style("cyan", "#0e7490", "#cffafe")),
    ("completed", style("green", "#15803d", "#dcfce7")),
    ("failed", style("red", "#b91c1c", "#fee2e2")),
];

const ICONS: [(&str, &str); 8] = [
    ("idle", "⏸️"),
    ("preparing", "🔧"),
    ("training", "🧠"),
    ("evaluating", "📊"),
    ("saving", "💾"),
    ("uploading", "☁️"),
    ("completed", "✅"),
    ("failed", "❌"),
];

pub fn stage_style(stage: &Stage) -> StageStyle {
    STYLES.iter().find(|(k, _)| *k == stage.token()).map(|(_, s)| *s).unwrap_or(DEFAULT_STYLE)
}

pub fn stage_icon(stage: &Stage) -> &'static str {
    ICONS.iter().find(|(k, _)| *k == stage.token()).map(|(_, i)| *i).unwrap_or(DEFAULT_ICON)
}

pub const LOADING_MESSAGE: &str = "Memuat status retrain...";

/// Everything a status display needs, already formatted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusPanel {
    pub is_running: bool,
    pub percentage: String,
    pub badge: String,
    pub style: StageStyle,
    pub message: String,
    pub epochs: Option<String>,
    pub elapsed: String,
    pub remaining: String,
    pub error: Option<String>,
    pub connection_note: Option<String>,
    pub stale: bool,
}

impl StatusPanel {
    pub fn render(snapshot: Option<&RetrainProgress>, last_error: Option<&str>, now: f64, idle_elapsed: &str) -> Self {
        let timing = TimingReadout::compute(snapshot, now, idle_elapsed);
        let connection_note = last_error.map(str::to_string);
        match snapshot {
            None => Self {
                is_running: false,
                percentage: "0%".into(),
                badge: format!("{DEFAULT_ICON} LOADING"),
                style: DEFAULT_STYLE,
                message: LOADING_MESSAGE.into(),
                epochs: None,
                elapsed: timing.elapsed,
                remaining: timing.remaining,
                error: None,
                connection_note,
                stale: false,
            },
            Some(p) => Self {
                is_running: p.is_running,
                percentage: format!("{}%", p.percent()),
                badge: format!("{} {}", stage_icon(&p.stage), p.stage.token().to_uppercase()),
                style: stage_style(&p.stage),
                message: p.message.clone(),
                epochs: p.epochs().map(|(c, t)| format!("{c} / {t}")),
                elapsed: timing.elapsed,
                remaining: timing.remaining,
                error: if p.stage == Stage::Failed { p.error.clone() } else { None },
                connection_note,
                stale: p.is_stale(now),
            },
        }
    }
}

impl fmt::Display for StatusPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.badge, self.percentage)?;
        if let Some(e) = &self.epochs { write!(f, " epoch {e}")?; }
        write!(f, " elapsed {} remaining {}", self.elapsed, self.remaining)?;
        if !self.message.is_empty() { write!(f, " - {}", self.message)?; }
        if let Some(e) = &self.error { write!(f, " (error: {e})")?; }
        if self.stale { f.write_str(" (stale)")?; }
        if let Some(n) = &self.connection_note { write!(f, " [{n}]")?; }
        Ok(())
    }
}
