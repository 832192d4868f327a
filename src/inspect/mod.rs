//! Repository inspection.
//!
//! [`RepositoryInspector`] is the seam between refresh orchestration and the
//! git plumbing. The decision whether a remote may be contacted lives here,
//! in [`RemotePolicy`], so every inspector applies the same rules.

mod git;

pub use git::GitInspector;

use anyhow::Result;
use std::path::Path;

use crate::status::{DisabledReason, LocalState, RepositoryStatus, SyncState};
use crate::utils::git::RemoteProtocol;

/// The cheap, network-free part of an inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStatus {
    pub local_state: LocalState,
    pub branch: String,
    pub remote_url: Option<String>,
}

/// Which remotes may be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemotePolicy {
    pub use_ssh_agent: bool,
    pub fetch_https_status: bool,
}

/// Outcome of the remote-check decision for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCheck<'a> {
    /// Report this state without touching the network
    Skip(SyncState),
    /// Fetch from this remote and compare with the upstream
    Fetch(&'a str),
}

impl RemotePolicy {
    pub fn new(use_ssh_agent: bool, fetch_https_status: bool) -> Self {
        Self {
            use_ssh_agent,
            fetch_https_status,
        }
    }

    pub fn decide<'a>(&self, remote_url: Option<&'a str>) -> RemoteCheck<'a> {
        let Some(url) = remote_url.filter(|url| !url.trim().is_empty()) else {
            return RemoteCheck::Skip(SyncState::NoRemote);
        };

        match RemoteProtocol::classify(url) {
            RemoteProtocol::Ssh if !self.use_ssh_agent => {
                RemoteCheck::Skip(SyncState::CheckDisabled(DisabledReason::Ssh))
            }
            RemoteProtocol::Https if !self.fetch_https_status => {
                RemoteCheck::Skip(SyncState::CheckDisabled(DisabledReason::Https))
            }
            RemoteProtocol::Other if !self.fetch_https_status => {
                RemoteCheck::Skip(SyncState::CheckDisabled(DisabledReason::General))
            }
            _ => RemoteCheck::Fetch(url),
        }
    }
}

/// Answers questions about a repository on disk.
///
/// Implementations must tolerate concurrent calls for different paths. The
/// orchestrator never inspects the same path twice within one batch.
pub trait RepositoryInspector: Send + Sync {
    /// Cheap check whether `path` is the root of a repository
    fn is_repository(&self, path: &Path) -> bool;

    /// Working tree state, current branch and remote URL
    fn local_status(&self, path: &Path) -> Result<LocalStatus>;

    /// Fetch from `remote_url` and compare the current branch with its upstream
    fn remote_sync(&self, path: &Path, remote_url: &str) -> Result<SyncState>;

    /// Apply the remote policy, fetching only when it allows
    fn check_remote(&self, path: &Path, remote_url: Option<&str>, policy: RemotePolicy) -> SyncState {
        match policy.decide(remote_url) {
            RemoteCheck::Skip(state) => state,
            RemoteCheck::Fetch(url) => self
                .remote_sync(path, url)
                .unwrap_or_else(|e| SyncState::Error(format!("{e:#}"))),
        }
    }

    /// Full inspection: local state plus remote state where the policy allows
    fn inspect(&self, path: &Path, policy: RemotePolicy) -> Result<RepositoryStatus> {
        let local = self.local_status(path)?;
        let sync_state = self.check_remote(path, local.remote_url.as_deref(), policy);

        Ok(RepositoryStatus::new(
            local.local_state,
            local.remote_url,
            sync_state,
            local.branch,
        ))
    }
}
