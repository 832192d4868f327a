use anyhow::{Context, Result};
use colored::*;
use console::{pad_str, style, Alignment};
use serde::Serialize;
use std::fmt;

use super::formatting::{
    format_branch, local_state_style, local_state_symbol, sync_state_short, sync_state_style,
};
use crate::status::{LocalState, RepoReport, SyncState};

/// How refresh results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Table,
    Compact,
    Json,
}

const HEADERS: [&str; 5] = ["Repository", "Branch", "Local", "Sync", "Path"];

/// Aligned table, one row per repository
pub fn render_table(reports: &[RepoReport]) -> String {
    let rows: Vec<[String; 5]> = reports
        .iter()
        .map(|report| {
            [
                report.name(),
                report.branch.clone(),
                report.local_state.to_string(),
                report.sync_state.to_string(),
                report.path.display().to_string(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(console::measure_text_width(cell));
        }
    }

    let mut out = String::new();
    let header = HEADERS
        .iter()
        .zip(widths)
        .map(|(title, width)| style(pad_str(title, width, Alignment::Left, None)).bold().to_string())
        .collect::<Vec<_>>()
        .join("  ");
    out.push_str(header.trim_end());
    out.push('\n');
    out.push_str(&"─".repeat(widths.iter().sum::<usize>() + 2 * (widths.len() - 1)));
    out.push('\n');

    for (report, row) in reports.iter().zip(&rows) {
        let pad = |index: usize| pad_str(&row[index], widths[index], Alignment::Left, None).to_string();

        let branch = if report.branch.is_empty() {
            style(pad(1)).dim().to_string()
        } else {
            style(pad(1)).yellow().to_string()
        };

        let cells = [
            style(pad(0)).cyan().bold().to_string(),
            branch,
            local_state_style(report.local_state).apply_to(pad(2)).to_string(),
            sync_state_style(&report.sync_state).apply_to(pad(3)).to_string(),
            style(row[4].clone()).dim().to_string(),
        ];
        out.push_str(&cells.join("  "));
        out.push('\n');
    }

    out
}

/// One short line per repository
pub fn render_compact(reports: &[RepoReport]) -> String {
    reports
        .iter()
        .map(|report| {
            let symbol = local_state_style(report.local_state)
                .apply_to(local_state_symbol(report.local_state))
                .to_string();
            let sync = sync_state_short(&report.sync_state);
            let sync = match report.sync_state {
                SyncState::Synced => sync.green(),
                SyncState::Error(_) => sync.red(),
                SyncState::Behind(_) | SyncState::Diverged { .. } => sync.yellow(),
                _ => sync.normal(),
            };

            format!(
                "{} {} [{}] {}",
                symbol,
                report.name().bold(),
                format_branch(&report.branch),
                sync
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(reports: &[RepoReport]) -> Result<String> {
    serde_json::to_string_pretty(reports).context("Failed to serialize status report")
}

/// Counts shown under the table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub dirty: usize,
    pub ahead: usize,
    pub behind: usize,
    pub errors: usize,
}

impl Summary {
    pub fn from_reports(reports: &[RepoReport]) -> Self {
        let mut summary = Summary {
            total: reports.len(),
            ..Summary::default()
        };

        for report in reports {
            if report.local_state == LocalState::Dirty {
                summary.dirty += 1;
            }
            if report.is_error() {
                summary.errors += 1;
            }
            match report.sync_state {
                SyncState::Ahead(_) => summary.ahead += 1,
                SyncState::Behind(_) => summary.behind += 1,
                SyncState::Diverged { .. } => {
                    summary.ahead += 1;
                    summary.behind += 1;
                }
                _ => {}
            }
        }

        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} repositories: {} dirty, {} ahead, {} behind, {} errors",
            self.total, self.dirty, self.ahead, self.behind, self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::RepositoryStatus;

    fn reports() -> Vec<RepoReport> {
        vec![
            RepoReport::from_status(
                "/srv/api",
                &RepositoryStatus::new(
                    LocalState::Dirty,
                    Some("git@github.com:team/api.git".to_string()),
                    SyncState::Diverged { ahead: 1, behind: 4 },
                    "main",
                ),
            ),
            RepoReport::failed("/srv/broken", "corrupt index"),
        ]
    }

    #[test]
    fn test_table_contains_every_row() {
        console::set_colors_enabled(false);
        let table = render_table(&reports());

        assert!(table.starts_with("Repository"));
        assert!(table.contains("Diverged (↑1 ↓4)"));
        assert!(table.contains("Error: corrupt index"));
        assert_eq!(table.lines().count(), 4);
    }

    #[test]
    fn test_json_rows_keep_tags() {
        let json = render_json(&reports()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["sync_state"]["kind"], "diverged");
        assert_eq!(value[1]["local_state"], "error");
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::from_reports(&reports());
        assert_eq!(
            summary,
            Summary {
                total: 2,
                dirty: 1,
                ahead: 1,
                behind: 1,
                errors: 1,
            }
        );
        assert!(summary.to_string().starts_with("2 repositories"));
    }
}
