use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

use super::markers::marker_mutation_time;
use crate::status::{RepositoryStatus, StatusParser};

/// Default freshness window, in seconds
pub const DEFAULT_CACHE_TIMEOUT_SECS: u64 = 120;

/// Whether an entry may still be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Live,
    /// Explicitly known to be out of date; kept so it is distinct from "never checked"
    Invalidated,
}

/// Status in the text form it is cached in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStatus {
    pub local_state: String,
    pub remote_url: Option<String>,
    pub sync_state: String,
    pub branch: String,
    pub produced_at: DateTime<Utc>,
}

impl CachedStatus {
    fn from_status(status: &RepositoryStatus) -> Self {
        Self {
            local_state: status.local_state.to_string(),
            remote_url: status.remote_url.clone(),
            sync_state: status.sync_state.to_string(),
            branch: status.branch.clone(),
            produced_at: status.produced_at,
        }
    }

    /// Rebuild the typed status
    pub fn to_status(&self) -> RepositoryStatus {
        RepositoryStatus {
            local_state: StatusParser::parse_local_state(&self.local_state),
            remote_url: self.remote_url.clone(),
            sync_state: StatusParser::parse_sync_state(&self.sync_state),
            branch: self.branch.clone(),
            produced_at: self.produced_at,
        }
    }
}

/// One cached repository status. Callers always receive copies.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub repo_path: PathBuf,
    pub status: CachedStatus,
    pub last_checked_at: DateTime<Utc>,
    pub last_known_mutation: SystemTime,
    pub state: EntryState,
}

impl CacheEntry {
    pub fn is_valid(&self) -> bool {
        self.state == EntryState::Live
    }

    pub fn status(&self) -> RepositoryStatus {
        self.status.to_status()
    }

    fn within_window(&self, timeout: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_checked_at) < timeout
    }
}

/// Cache statistics for monitoring and debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub live_entries: usize,
    pub invalidated_entries: usize,
    pub repo_checks: usize,
    pub timeout_secs: u64,
}

/// In-memory repository status cache.
///
/// Entries are keyed by absolute repository path and live in sharded maps, so
/// writers to different repositories never contend and every update to a
/// single key is atomic. A separate, timeout-free map remembers whether a path
/// is a repository at all.
pub struct StatusCache {
    entries: DashMap<PathBuf, CacheEntry>,
    repo_checks: DashMap<PathBuf, bool>,
    timeout_secs: AtomicU64,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::with_timeout(std::time::Duration::from_secs(DEFAULT_CACHE_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            repo_checks: DashMap::new(),
            timeout_secs: AtomicU64::new(timeout.as_secs()),
        }
    }

    /// Update the freshness window
    pub fn set_timeout(&self, timeout: std::time::Duration) {
        self.timeout_secs.store(timeout.as_secs(), Ordering::Relaxed);
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.load(Ordering::Relaxed))
    }

    fn timeout_window(&self) -> Duration {
        let secs = self.timeout_secs.load(Ordering::Relaxed);
        Duration::seconds(secs.min(u64::from(u32::MAX)) as i64)
    }

    /// Get a fresh entry: live, inside the timeout window, and with no marker
    /// activity since it was written
    pub fn get(&self, repo_path: &Path) -> Option<CacheEntry> {
        // Copy out before the stat pass so no shard lock is held during I/O
        let entry = self.entries.get(repo_path)?.value().clone();
        self.check_fresh(entry, Utc::now())
    }

    fn check_fresh(&self, entry: CacheEntry, now: DateTime<Utc>) -> Option<CacheEntry> {
        if !entry.is_valid() {
            debug!("Cache entry invalidated: {}", entry.repo_path.display());
            return None;
        }

        if !entry.within_window(self.timeout_window(), now) {
            debug!("Cache entry expired: {}", entry.repo_path.display());
            return None;
        }

        let current = marker_mutation_time(&entry.repo_path);
        if current > entry.last_known_mutation {
            debug!(
                "Git markers changed since cache entry was written: {}",
                entry.repo_path.display()
            );
            return None;
        }

        Some(entry)
    }

    /// Store a status, replacing any previous entry
    pub fn put(&self, repo_path: &Path, status: &RepositoryStatus) {
        let last_known_mutation = marker_mutation_time(repo_path);
        let entry = CacheEntry {
            repo_path: repo_path.to_path_buf(),
            status: CachedStatus::from_status(status),
            last_checked_at: Utc::now(),
            last_known_mutation,
            state: EntryState::Live,
        };
        self.entries.insert(repo_path.to_path_buf(), entry);
    }

    /// Mark an entry as invalid without removing it
    pub fn invalidate(&self, repo_path: &Path) {
        if let Some(mut entry) = self.entries.get_mut(repo_path) {
            entry.state = EntryState::Invalidated;
        }
    }

    /// Invalidate every entry at or below `base` and forget repo checks there
    pub fn invalidate_under(&self, base: &Path) {
        let mut invalidated = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.key().starts_with(base) {
                entry.state = EntryState::Invalidated;
                invalidated += 1;
            }
        }
        self.repo_checks.retain(|path, _| !path.starts_with(base));
        debug!(
            "Invalidated {} cache entries under {}",
            invalidated,
            base.display()
        );
    }

    /// Drop both caches entirely
    pub fn invalidate_all(&self) {
        self.entries.clear();
        self.repo_checks.clear();
    }

    /// All fresh entries whose repository still exists on disk
    pub fn list_fresh(&self) -> HashMap<PathBuf, CacheEntry> {
        let now = Utc::now();
        self.snapshot()
            .into_iter()
            .filter_map(|entry| self.check_fresh(entry, now))
            .filter(|entry| entry.repo_path.exists())
            .map(|entry| (entry.repo_path.clone(), entry))
            .collect()
    }

    /// Paths of live entries that still exist, fresh or not
    pub fn known_paths(&self) -> Vec<PathBuf> {
        self.snapshot()
            .into_iter()
            .filter(|entry| entry.is_valid() && entry.repo_path.exists())
            .map(|entry| entry.repo_path)
            .collect()
    }

    fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Cached answer to "is this path a repository?", if any
    pub fn is_known_repo(&self, path: &Path) -> Option<bool> {
        self.repo_checks.get(path).map(|check| *check)
    }

    pub fn record_repo_check(&self, path: &Path, is_repo: bool) {
        self.repo_checks.insert(path.to_path_buf(), is_repo);
    }

    pub fn stats(&self) -> CacheStats {
        let total_entries = self.entries.len();
        let live_entries = self
            .entries
            .iter()
            .filter(|entry| entry.is_valid())
            .count();

        CacheStats {
            total_entries,
            live_entries,
            invalidated_entries: total_entries - live_entries,
            repo_checks: self.repo_checks.len(),
            timeout_secs: self.timeout_secs.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatusCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{LocalState, SyncState};
    use std::fs::{self, File};
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn fake_repo() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let git_dir = temp_dir.path().join(".git");
        fs::create_dir_all(git_dir.join("refs/heads")).unwrap();
        fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(git_dir.join("refs/heads/main"), "0000\n").unwrap();
        temp_dir
    }

    fn touch_in_future(path: &Path) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() + StdDuration::from_secs(60))
            .unwrap();
    }

    fn sample_status() -> RepositoryStatus {
        RepositoryStatus::new(
            LocalState::Dirty,
            Some("git@github.com:user/repo.git".to_string()),
            SyncState::Diverged {
                ahead: 2,
                behind: 5,
            },
            "main",
        )
    }

    #[test]
    fn test_put_then_get_round_trip() {
        let repo = fake_repo();
        let cache = StatusCache::new();
        let status = sample_status();

        cache.put(repo.path(), &status);

        let entry = cache.get(repo.path()).expect("entry should be fresh");
        assert_eq!(entry.status(), status);
        assert!(entry.is_valid());
    }

    #[test]
    fn test_get_missing_entry() {
        let cache = StatusCache::new();
        assert!(cache.get(Path::new("/does/not/exist")).is_none());
    }

    #[test]
    fn test_marker_change_makes_entry_stale() {
        let repo = fake_repo();
        let cache = StatusCache::new();
        cache.put(repo.path(), &sample_status());

        touch_in_future(&repo.path().join(".git/HEAD"));

        assert!(cache.get(repo.path()).is_none());
        assert!(cache.list_fresh().is_empty());
    }

    #[test]
    fn test_new_ref_file_makes_entry_stale() {
        let repo = fake_repo();
        let cache = StatusCache::new();
        cache.put(repo.path(), &sample_status());

        let new_ref = repo.path().join(".git/refs/heads/feature");
        fs::write(&new_ref, "1111\n").unwrap();
        touch_in_future(&new_ref);

        assert!(cache.get(repo.path()).is_none());
    }

    #[test]
    fn test_invalidate_keeps_entry_but_hides_it() {
        let repo = fake_repo();
        let cache = StatusCache::new();
        cache.put(repo.path(), &sample_status());

        cache.invalidate(repo.path());

        assert!(cache.get(repo.path()).is_none());
        let stats = cache.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.invalidated_entries, 1);
        assert!(cache.known_paths().is_empty());
    }

    #[test]
    fn test_put_revives_invalidated_entry() {
        let repo = fake_repo();
        let cache = StatusCache::new();
        cache.put(repo.path(), &sample_status());
        cache.invalidate(repo.path());

        cache.put(repo.path(), &sample_status());

        assert!(cache.get(repo.path()).is_some());
    }

    #[test]
    fn test_timeout_expires_entries() {
        let repo = fake_repo();
        let cache = StatusCache::with_timeout(StdDuration::from_secs(0));
        cache.put(repo.path(), &sample_status());

        assert!(cache.get(repo.path()).is_none());
        // Stale but live entries are still known
        assert_eq!(cache.known_paths(), vec![repo.path().to_path_buf()]);

        cache.set_timeout(StdDuration::from_secs(300));
        assert!(cache.get(repo.path()).is_some());
    }

    #[test]
    fn test_list_fresh_skips_deleted_repositories() {
        let kept = fake_repo();
        let removed = fake_repo();
        let removed_path = removed.path().to_path_buf();
        let cache = StatusCache::new();
        cache.put(kept.path(), &sample_status());
        cache.put(&removed_path, &sample_status());

        drop(removed);

        let fresh = cache.list_fresh();
        assert_eq!(fresh.len(), 1);
        assert!(fresh.contains_key(kept.path()));
    }

    #[test]
    fn test_invalidate_under_prefix() {
        let root = TempDir::new().unwrap();
        let cache = StatusCache::new();
        let inside = root.path().join("work/app");
        let outside = root.path().join("other/app");
        cache.put(&inside, &sample_status());
        cache.put(&outside, &sample_status());
        cache.record_repo_check(&inside, true);
        cache.record_repo_check(&outside, true);

        cache.invalidate_under(&root.path().join("work"));

        assert_eq!(cache.stats().invalidated_entries, 1);
        assert_eq!(cache.is_known_repo(&inside), None);
        assert_eq!(cache.is_known_repo(&outside), Some(true));
    }

    #[test]
    fn test_invalidate_all_clears_both_caches() {
        let repo = fake_repo();
        let cache = StatusCache::new();
        cache.put(repo.path(), &sample_status());
        cache.record_repo_check(repo.path(), true);

        cache.invalidate_all();

        assert_eq!(cache.stats().total_entries, 0);
        assert_eq!(cache.is_known_repo(repo.path()), None);
    }

    #[test]
    fn test_repo_checks_have_no_timeout() {
        let cache = StatusCache::with_timeout(StdDuration::from_secs(0));
        let path = Path::new("/some/dir");
        assert_eq!(cache.is_known_repo(path), None);

        cache.record_repo_check(path, false);
        assert_eq!(cache.is_known_repo(path), Some(false));
    }
}
