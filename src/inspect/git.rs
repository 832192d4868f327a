use anyhow::{Context, Result};
use git2::{BranchType, ErrorCode, Repository, StatusOptions};
use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{LocalStatus, RepositoryInspector};
use crate::status::{LocalState, SyncState};

/// Inspector backed by libgit2, with `git fetch` for the network step
#[derive(Debug, Clone, Default)]
pub struct GitInspector;

impl GitInspector {
    pub fn new() -> Self {
        Self
    }
}

impl RepositoryInspector for GitInspector {
    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    fn local_status(&self, path: &Path) -> Result<LocalStatus> {
        let repo = Repository::open(path)
            .with_context(|| format!("Failed to open repository: {}", path.display()))?;

        let mut status_opts = StatusOptions::new();
        status_opts
            .include_untracked(true)
            .include_ignored(false)
            .recurse_untracked_dirs(false);

        let statuses = repo
            .statuses(Some(&mut status_opts))
            .with_context(|| format!("Failed to read status of {}", path.display()))?;
        let local_state = if statuses.is_empty() {
            LocalState::Clean
        } else {
            LocalState::Dirty
        };

        Ok(LocalStatus {
            local_state,
            branch: current_branch_name(&repo)?,
            remote_url: primary_remote(&repo)?.map(|(_, url)| url),
        })
    }

    fn remote_sync(&self, path: &Path, remote_url: &str) -> Result<SyncState> {
        let remote_name = {
            let repo = Repository::open(path)
                .with_context(|| format!("Failed to open repository: {}", path.display()))?;
            match primary_remote(&repo)? {
                Some((name, _)) => name,
                None => return Ok(SyncState::NoRemote),
            }
        };

        debug!("Fetching {} ({}) in {}", remote_name, remote_url, path.display());
        fetch_remote(path, &remote_name)?;

        // Reopen so the refs written by the fetch are visible
        let repo = Repository::open(path)?;
        upstream_sync_state(&repo)
    }
}

/// Current branch name; the symbolic target on an unborn branch, `HEAD` when detached
fn current_branch_name(repo: &Repository) -> Result<String> {
    match repo.head() {
        Ok(head) => Ok(head.shorthand().unwrap_or("HEAD").to_string()),
        Err(ref e) if e.code() == ErrorCode::UnbornBranch => {
            debug!("Repository has no commits yet");
            let head = repo.find_reference("HEAD")?;
            let target = head.symbolic_target().unwrap_or("HEAD");
            Ok(target.strip_prefix("refs/heads/").unwrap_or(target).to_string())
        }
        Err(e) => Err(e.into()),
    }
}

/// `origin` if present, otherwise the first configured remote
fn primary_remote(repo: &Repository) -> Result<Option<(String, String)>> {
    let remote_name = match repo.find_remote("origin") {
        Ok(_) => "origin".to_string(),
        Err(_) => {
            let remotes = repo.remotes()?;
            match remotes.iter().flatten().next() {
                Some(name) => name.to_string(),
                None => return Ok(None),
            }
        }
    };

    let remote = repo.find_remote(&remote_name)?;
    Ok(remote
        .url()
        .filter(|url| !url.is_empty())
        .map(|url| (remote_name.clone(), url.to_string())))
}

fn fetch_remote(repo_path: &Path, remote_name: &str) -> Result<()> {
    let mut command = Command::new("git");
    command
        .args(["fetch", "--quiet", remote_name])
        .current_dir(repo_path)
        .env("GIT_TERMINAL_PROMPT", "0");

    // Never block on a passphrase prompt; rely on the agent
    if std::env::var_os("GIT_SSH_COMMAND").is_none() {
        command.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
    }

    let output = command
        .output()
        .with_context(|| format!("Failed to execute git fetch {remote_name}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("git fetch failed");
        anyhow::bail!("{}", reason);
    }

    Ok(())
}

fn upstream_sync_state(repo: &Repository) -> Result<SyncState> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(ref e) if e.code() == ErrorCode::UnbornBranch => return Ok(SyncState::NoUpstream),
        Err(e) => return Err(e.into()),
    };

    if !head.is_branch() {
        return Ok(SyncState::NoUpstream);
    }

    let branch_name = head.shorthand().context("Branch name is not valid UTF-8")?;
    let branch = repo.find_branch(branch_name, BranchType::Local)?;
    let upstream = match branch.upstream() {
        Ok(upstream) => upstream,
        Err(ref e) if e.code() == ErrorCode::NotFound => return Ok(SyncState::NoUpstream),
        Err(e) => return Err(e.into()),
    };

    let local_oid = head.target().context("HEAD does not point at a commit")?;
    let upstream_oid = upstream
        .get()
        .target()
        .context("Upstream does not point at a commit")?;

    let (ahead, behind) = repo.graph_ahead_behind(local_oid, upstream_oid)?;
    Ok(SyncState::from_counts(ahead, behind))
}
