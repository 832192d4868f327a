//! Shared formatting for status values. Each variant maps to one style and
//! one symbol; renderers resolve them once per row.

use console::{style, Style};

use crate::status::{LocalState, SyncState};

pub fn local_state_style(state: LocalState) -> Style {
    match state {
        LocalState::Clean => Style::new().green(),
        LocalState::Dirty => Style::new().yellow().bold(),
        LocalState::Error => Style::new().red().bold(),
        LocalState::Unknown => Style::new().dim(),
    }
}

pub fn local_state_symbol(state: LocalState) -> &'static str {
    match state {
        LocalState::Clean => "✓",
        LocalState::Dirty => "●",
        LocalState::Error => "✗",
        LocalState::Unknown => "?",
    }
}

pub fn sync_state_style(state: &SyncState) -> Style {
    match state {
        SyncState::Synced => Style::new().green(),
        SyncState::Ahead(_) => Style::new().cyan(),
        SyncState::Behind(_) => Style::new().yellow(),
        SyncState::Diverged { .. } => Style::new().magenta().bold(),
        SyncState::NoRemote | SyncState::NoUpstream => Style::new().dim(),
        SyncState::CheckDisabled(_) | SyncState::Unknown => Style::new().dim().italic(),
        SyncState::Error(_) => Style::new().red(),
    }
}

/// Short arrow notation for compact output
pub fn sync_state_short(state: &SyncState) -> String {
    match state {
        SyncState::Synced => "=".to_string(),
        SyncState::Ahead(n) => format!("↑{n}"),
        SyncState::Behind(n) => format!("↓{n}"),
        SyncState::Diverged { ahead, behind } => format!("↑{ahead} ↓{behind}"),
        SyncState::NoRemote => "no remote".to_string(),
        SyncState::NoUpstream => "no upstream".to_string(),
        SyncState::CheckDisabled(_) => "unchecked".to_string(),
        SyncState::Error(_) => "error".to_string(),
        SyncState::Unknown => "?".to_string(),
    }
}

pub fn format_repository_name(name: &str) -> String {
    style(name).cyan().bold().to_string()
}

pub fn format_path(path: &str) -> String {
    style(path).dim().to_string()
}

pub fn format_branch(branch: &str) -> String {
    if branch.is_empty() {
        return style("-").dim().to_string();
    }
    style(branch).yellow().to_string()
}
