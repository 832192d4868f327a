use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Working tree state of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalState {
    Clean,
    Dirty,
    Error,
    Unknown,
}

/// Why a remote check was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisabledReason {
    Ssh,
    Https,
    General,
}

/// Synchronization state of the current branch against its upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    Ahead(usize),
    Behind(usize),
    Diverged { ahead: usize, behind: usize },
    NoRemote,
    NoUpstream,
    CheckDisabled(DisabledReason),
    Error(String),
    Unknown,
}

impl SyncState {
    /// Classify ahead/behind commit counts
    pub fn from_counts(ahead: usize, behind: usize) -> Self {
        match (ahead, behind) {
            (0, 0) => SyncState::Synced,
            (ahead, 0) => SyncState::Ahead(ahead),
            (0, behind) => SyncState::Behind(behind),
            (ahead, behind) => SyncState::Diverged { ahead, behind },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncState::Error(_))
    }
}

/// Result of inspecting one repository. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub local_state: LocalState,
    pub remote_url: Option<String>,
    pub sync_state: SyncState,
    pub branch: String,
    pub produced_at: DateTime<Utc>,
}

impl RepositoryStatus {
    pub fn new(
        local_state: LocalState,
        remote_url: Option<String>,
        sync_state: SyncState,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            local_state,
            remote_url,
            sync_state,
            branch: branch.into(),
            produced_at: Utc::now(),
        }
    }

    /// Status row for a repository whose inspection failed
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(
            LocalState::Error,
            None,
            SyncState::Error(message.into()),
            String::new(),
        )
    }
}

/// One row of refresh output: `(path, local state, remote url, sync state, branch)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoReport {
    pub path: PathBuf,
    pub local_state: LocalState,
    pub remote_url: Option<String>,
    pub sync_state: SyncState,
    pub branch: String,
}

impl RepoReport {
    pub fn from_status<P: Into<PathBuf>>(path: P, status: &RepositoryStatus) -> Self {
        Self {
            path: path.into(),
            local_state: status.local_state,
            remote_url: status.remote_url.clone(),
            sync_state: status.sync_state.clone(),
            branch: status.branch.clone(),
        }
    }

    pub fn failed<P: Into<PathBuf>>(path: P, message: impl Into<String>) -> Self {
        Self::from_status(path, &RepositoryStatus::failed(message))
    }

    pub fn is_dirty(&self) -> bool {
        self.local_state == LocalState::Dirty
    }

    pub fn is_error(&self) -> bool {
        self.local_state == LocalState::Error || self.sync_state.is_error()
    }

    /// Directory name of the repository, used as its display name
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Case-insensitive ascending path order; the exact path breaks ties
pub fn compare_paths(a: &Path, b: &Path) -> Ordering {
    let left = a.to_string_lossy();
    let right = b.to_string_lossy();
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(&right))
}

/// Sort refresh output into its deterministic display order
pub fn sort_reports(reports: &mut [RepoReport]) {
    reports.sort_by(|a, b| compare_paths(&a.path, &b.path));
}
