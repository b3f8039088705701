//! Plain-text rendering of controller snapshots for the terminal.
//!
//! DESIGN
//! ======
//! Pure functions from client state to lines, so the REPL and one-shot
//! commands share formatting and tests need no terminal. [`ProgressPrinter`]
//! turns successive snapshots into only the lines that changed, which is how
//! stage transitions scroll past while a query runs.

use client::Snapshot;
use client::net::types::ConversationSummary;
use client::state::conversation::{Turn, TurnKind};
use client::state::guard::DbGuardWarning;
use client::state::stages::{Stage, StageStatus};
use client::state::ui::{Notice, NoticeLevel};

#[cfg(test)]
#[path = "render_test.rs"]
mod render_test;

#[must_use]
pub fn stage_line(stage: &Stage) -> String {
    let marker = match stage.status {
        StageStatus::Pending => "[ ]",
        StageStatus::Active => "[~]",
        StageStatus::Completed => "[x]",
    };
    match &stage.detail {
        Some(detail) => format!("  {marker} {}: {detail}", stage.label),
        None => format!("  {marker} {}", stage.label),
    }
}

/// One conversation turn, possibly spanning several lines.
#[must_use]
pub fn turn_text(turn: &Turn) -> String {
    match &turn.kind {
        TurnKind::User { text } => format!("you> {text}"),
        TurnKind::Thinking { stages } => {
            let mut out = "assistant> thinking...".to_owned();
            for stage in stages.stages() {
                out.push('\n');
                out.push_str(&stage_line(stage));
            }
            out
        }
        TurnKind::Assistant { content, stages } => {
            if stages.is_empty() {
                format!("assistant> {content}")
            } else {
                format!("assistant> {content}\n  ({} steps)", stages.len())
            }
        }
        TurnKind::Interrupted { partial: Some(partial) } => format!("assistant> [interrupted] {partial}"),
        TurnKind::Interrupted { partial: None } => "assistant> [interrupted]".to_owned(),
        TurnKind::Error { message } => format!("assistant> error: {message}"),
    }
}

#[must_use]
pub fn notice_line(notice: &Notice) -> String {
    let level = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    format!("[{level}] {}", notice.message)
}

/// Database guard card with its available actions.
#[must_use]
pub fn guard_card(warning: &DbGuardWarning) -> String {
    let mut lines = vec![
        format!("! database unavailable: {}", warning.message),
        format!("  connection: {}", warning.target),
    ];
    if let Some(checked_at) = &warning.checked_at {
        lines.push(format!("  checked at: {checked_at}"));
    }
    for suggestion in &warning.suggestions {
        lines.push(format!("  - {suggestion}"));
    }
    if let Some(seconds) = warning.remaining_seconds {
        lines.push(format!("  dismissing in {seconds}s"));
    }
    lines.push("  /continue to run anyway, /configure to edit the connection, /dismiss to close".to_owned());
    lines.join("\n")
}

#[must_use]
pub fn history_line(summary: &ConversationSummary) -> String {
    let title = summary
        .title
        .as_deref()
        .filter(|title| !title.trim().is_empty())
        .unwrap_or("(untitled)");
    let mut line = format!("{}  {title}", summary.id);
    if let Some(count) = summary.message_count {
        line.push_str(&format!("  [{count} messages]"));
    }
    if let Some(updated_at) = &summary.updated_at {
        line.push_str(&format!("  {updated_at}"));
    }
    line
}

/// Emits the lines that changed between successive snapshots.
#[derive(Debug, Default)]
pub struct ProgressPrinter {
    stage_lines: Vec<String>,
    status: Option<String>,
    last_notice_id: u64,
}

impl ProgressPrinter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every notice already in `snapshot` as seen.
    pub fn skip_notices(&mut self, snapshot: &Snapshot) {
        if let Some(max) = snapshot.ui.notices.iter().map(|n| n.id).max() {
            self.last_notice_id = self.last_notice_id.max(max);
        }
    }

    pub fn update(&mut self, snapshot: &Snapshot) -> Vec<String> {
        let mut out = Vec::new();

        if snapshot.ui.status_badge != self.status {
            if let Some(status) = &snapshot.ui.status_badge {
                out.push(format!("status: {status}"));
            }
            self.status.clone_from(&snapshot.ui.status_badge);
        }

        let lines: Vec<String> = snapshot
            .turns
            .iter()
            .rev()
            .find_map(|turn| match &turn.kind {
                TurnKind::Thinking { stages } => Some(stages.stages().iter().map(stage_line).collect()),
                _ => None,
            })
            .unwrap_or_default();
        for (index, line) in lines.iter().enumerate() {
            if self.stage_lines.get(index) != Some(line) {
                out.push(line.clone());
            }
        }
        self.stage_lines = lines;

        out.extend(
            snapshot
                .ui
                .notices
                .iter()
                .filter(|notice| notice.id > self.last_notice_id)
                .map(notice_line),
        );
        self.skip_notices(snapshot);
        out
    }
}
