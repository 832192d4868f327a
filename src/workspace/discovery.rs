use futures_util::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::config::Settings;
use super::pool::WorkerPool;
use crate::cache::StatusCache;
use crate::inspect::RepositoryInspector;
use crate::utils::fs::is_hidden;

/// Scan bounds taken from a settings snapshot
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_depth: usize,
    pub show_hidden: bool,
    pub skip_patterns: Vec<glob::Pattern>,
}

impl ScanOptions {
    pub fn new(max_depth: usize, show_hidden: bool) -> Self {
        Self {
            max_depth,
            show_hidden,
            skip_patterns: Vec::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_depth: settings.max_depth,
            show_hidden: settings.show_hidden,
            skip_patterns: settings.skip_patterns(),
        }
    }

    /// Never checked, reported or descended into
    fn is_excluded(&self, dir: &Path) -> bool {
        match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name == ".git" || (!self.show_hidden && is_hidden(dir)),
            None => false,
        }
    }

    /// Checked for a repository, but never descended into
    fn prunes_descent(&self, dir: &Path) -> bool {
        match dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => self.skip_patterns.iter().any(|pattern| pattern.matches(name)),
            None => false,
        }
    }
}

/// Finds repositories below a watched path, one directory level at a time
#[derive(Clone)]
pub struct DiscoveryScanner {
    inspector: Arc<dyn RepositoryInspector>,
    cache: Arc<StatusCache>,
    pool: WorkerPool,
}

impl DiscoveryScanner {
    pub fn new(
        inspector: Arc<dyn RepositoryInspector>,
        cache: Arc<StatusCache>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            inspector,
            cache,
            pool,
        }
    }

    /// Repositories at or below `base`, at most `max_depth` levels down.
    ///
    /// Paths in `skip_known` are not checked, reported or descended into.
    /// A missing or unreadable base yields nothing.
    pub async fn scan(
        &self,
        base: &Path,
        options: &ScanOptions,
        skip_known: &HashSet<PathBuf>,
    ) -> Vec<PathBuf> {
        debug!(
            "Discovering repositories in {} with max depth {}",
            base.display(),
            options.max_depth
        );

        let base_dir = base.to_path_buf();
        let base_is_dir = self
            .pool
            .run(move || base_dir.is_dir())
            .await
            .unwrap_or(false);
        if !base_is_dir {
            warn!("Watched path is not a readable directory: {}", base.display());
            return Vec::new();
        }

        if self.check_repository(base).await {
            debug!("Watched path is itself a repository: {}", base.display());
            return vec![base.to_path_buf()];
        }

        let mut found = Vec::new();
        let mut frontier = vec![base.to_path_buf()];

        for depth in 1..=options.max_depth {
            let candidates = self.list_candidates(&frontier, options, skip_known).await;
            if candidates.is_empty() {
                break;
            }

            let mut checks: FuturesUnordered<_> = candidates
                .into_iter()
                .map(|dir| async move {
                    let is_repo = self.check_repository(&dir).await;
                    (dir, is_repo)
                })
                .collect();

            let mut next_level = Vec::new();
            while let Some((dir, is_repo)) = checks.next().await {
                if is_repo {
                    debug!("Found git repository: {}", dir.display());
                    found.push(dir);
                } else if options.prunes_descent(&dir) {
                    debug!("Not descending into skipped directory: {}", dir.display());
                } else {
                    next_level.push(dir);
                }
            }

            debug!(
                "Level {} under {}: {} repositories so far",
                depth,
                base.display(),
                found.len()
            );
            frontier = next_level;
        }

        found.sort();
        found
    }

    /// Subdirectories of every frontier directory that pass the filters
    async fn list_candidates(
        &self,
        frontier: &[PathBuf],
        options: &ScanOptions,
        skip_known: &HashSet<PathBuf>,
    ) -> Vec<PathBuf> {
        let mut listings: FuturesUnordered<_> = frontier
            .iter()
            .cloned()
            .map(|dir| self.pool.run(move || list_subdirectories(&dir)))
            .collect();

        let mut candidates = Vec::new();
        while let Some(listing) = listings.next().await {
            match listing {
                Ok(dirs) => candidates.extend(dirs.into_iter().filter(|dir| {
                    !options.is_excluded(dir) && !skip_known.contains(dir)
                })),
                Err(e) => warn!("Directory listing failed: {:#}", e),
            }
        }
        candidates
    }

    async fn check_repository(&self, path: &Path) -> bool {
        if let Some(is_repo) = self.cache.is_known_repo(path) {
            return is_repo;
        }

        let inspector = self.inspector.clone();
        let owned = path.to_path_buf();
        match self.pool.run(move || inspector.is_repository(&owned)).await {
            Ok(is_repo) => {
                self.cache.record_repo_check(path, is_repo);
                is_repo
            }
            Err(e) => {
                warn!("Repository check failed for {}: {:#}", path.display(), e);
                false
            }
        }
    }
}

fn list_subdirectories(dir: &Path) -> Vec<PathBuf> {
    let mut subdirs = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        match entry {
            // Symlinked checkouts count; the depth bound stops link cycles
            Ok(entry) if entry.path().is_dir() => subdirs.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {}: {}", dir.display(), e),
        }
    }

    subdirs
}
