use anyhow::Result;
use futures_util::future::join_all;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::{ConfigStore, Settings};
use super::discovery::{DiscoveryScanner, ScanOptions};
use super::pool::WorkerPool;
use crate::cache::{CacheEntry, StatusCache};
use crate::inspect::{RemoteCheck, RemotePolicy, RepositoryInspector};
use crate::status::{sort_reports, RepoReport, RepositoryStatus, SyncState};
use crate::utils::fs::absolutize;

/// Receives `(completed, total)` after every finished inspection
pub type ProgressCallback<'a> = &'a (dyn Fn(usize, usize) + Send + Sync);

/// Staleness policy for one refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RefreshMode {
    /// Trust fresh cache entries fully, never fetch
    Cached,
    /// Recompute local state, reuse fresh remote state
    Smart,
    /// Ignore the cache and recompute everything
    Full,
}

impl fmt::Display for RefreshMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshMode::Cached => f.write_str("cached"),
            RefreshMode::Smart => f.write_str("smart"),
            RefreshMode::Full => f.write_str("full"),
        }
    }
}

/// Work scheduled for one repository
#[derive(Debug)]
enum Job {
    /// Local state plus remote check, result written to the cache
    Inspect,
    /// Local state paired with remote state from a fresh cache entry
    LocalWithCachedRemote(RepositoryStatus),
    /// Local state only, remote state left unknown
    LocalOnly,
}

/// Decides per refresh what to trust from the cache and what to recompute,
/// and fans the recomputation out over the worker pool.
pub struct RefreshOrchestrator {
    config: Arc<dyn ConfigStore>,
    inspector: Arc<dyn RepositoryInspector>,
    cache: Arc<StatusCache>,
    pool: WorkerPool,
    scanner: DiscoveryScanner,
    // Set by watched-path changes; forces the next refresh through discovery
    discovery_pending: AtomicBool,
}

impl RefreshOrchestrator {
    /// Size the pool and cache from the current settings
    pub async fn new(
        config: Arc<dyn ConfigStore>,
        inspector: Arc<dyn RepositoryInspector>,
    ) -> Result<Self> {
        let settings = config.load_settings().await?;
        let pool = settings
            .max_workers
            .map(WorkerPool::new)
            .unwrap_or_default();
        let cache = Arc::new(StatusCache::with_timeout(settings.cache_timeout()));

        debug!("Worker pool sized to {}", pool.size());
        Ok(Self::with_parts(config, inspector, cache, pool))
    }

    pub fn with_parts(
        config: Arc<dyn ConfigStore>,
        inspector: Arc<dyn RepositoryInspector>,
        cache: Arc<StatusCache>,
        pool: WorkerPool,
    ) -> Self {
        let scanner = DiscoveryScanner::new(inspector.clone(), cache.clone(), pool.clone());

        Self {
            config,
            inspector,
            cache,
            pool,
            scanner,
            discovery_pending: AtomicBool::new(false),
        }
    }

    /// Shared status cache, for callers that know a repository changed
    pub fn cache(&self) -> &Arc<StatusCache> {
        &self.cache
    }

    /// Refresh against a settings snapshot read now
    pub async fn refresh(
        &self,
        mode: RefreshMode,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<RepoReport>> {
        let settings = self.config.load_settings().await?;
        Ok(self.refresh_with(&settings, mode, progress).await)
    }

    /// Refresh against an explicit settings snapshot.
    ///
    /// Per-repository failures become error rows; this never fails as a whole.
    pub async fn refresh_with(
        &self,
        settings: &Settings,
        mode: RefreshMode,
        progress: Option<ProgressCallback<'_>>,
    ) -> Vec<RepoReport> {
        let started = Instant::now();
        self.cache.set_timeout(settings.cache_timeout());

        let discovery_pending = self.discovery_pending.swap(false, Ordering::SeqCst);
        let fresh = match mode {
            RefreshMode::Full => HashMap::new(),
            RefreshMode::Cached | RefreshMode::Smart => self.fresh_entries().await,
        };

        let mut paths: HashSet<PathBuf> = HashSet::new();

        if mode != RefreshMode::Full && !fresh.is_empty() && !discovery_pending {
            debug!("Fast path with {} fresh cache entries", fresh.len());
            // Live entries gone stale through local activity stay visible
            paths.extend(self.known_paths().await);
            paths.extend(fresh.keys().cloned());
        } else {
            let skip_known: HashSet<PathBuf> = fresh.keys().cloned().collect();
            paths.extend(self.discover(settings, &skip_known).await);

            match mode {
                RefreshMode::Full => paths.extend(self.known_paths().await),
                RefreshMode::Cached | RefreshMode::Smart => paths.extend(skip_known),
            }
        }

        let (mut reports, jobs) = plan(mode, paths, &fresh);
        reports.extend(self.run_jobs(jobs, settings.remote_policy(), progress).await);
        sort_reports(&mut reports);

        info!(
            "Refreshed {} repositories ({} mode) in {:.2?}",
            reports.len(),
            mode,
            started.elapsed()
        );
        reports
    }

    // Both cache passes stat marker files, so they run on the pool
    async fn fresh_entries(&self) -> HashMap<PathBuf, CacheEntry> {
        let cache = self.cache.clone();
        self.pool.run(move || cache.list_fresh()).await.unwrap_or_else(|e| {
            warn!("Listing fresh cache entries failed: {:#}", e);
            HashMap::new()
        })
    }

    async fn known_paths(&self) -> Vec<PathBuf> {
        let cache = self.cache.clone();
        self.pool.run(move || cache.known_paths()).await.unwrap_or_else(|e| {
            warn!("Listing cached repositories failed: {:#}", e);
            Vec::new()
        })
    }

    /// Scan every watched path concurrently
    async fn discover(&self, settings: &Settings, skip_known: &HashSet<PathBuf>) -> Vec<PathBuf> {
        let options = ScanOptions::from_settings(settings);
        let options = &options;

        let scans = settings
            .expanded_watched_paths()
            .into_iter()
            .map(|base| async move { self.scanner.scan(&base, options, skip_known).await });

        let discovered: Vec<PathBuf> = join_all(scans).await.into_iter().flatten().collect();
        debug!("Discovery found {} repositories", discovered.len());
        discovered
    }

    async fn run_jobs(
        &self,
        jobs: Vec<(PathBuf, Job)>,
        policy: RemotePolicy,
        progress: Option<ProgressCallback<'_>>,
    ) -> Vec<RepoReport> {
        let total = jobs.len();

        let mut pending: FuturesUnordered<_> = jobs
            .into_iter()
            .map(|(path, job)| {
                let inspector = self.inspector.clone();
                let cache = self.cache.clone();
                let task_path = path.clone();

                async move {
                    let outcome = self
                        .pool
                        .run(move || execute(inspector.as_ref(), &cache, &task_path, job, policy))
                        .await;

                    outcome.unwrap_or_else(|e| {
                        warn!("Inspection task for {} failed: {:#}", path.display(), e);
                        RepoReport::failed(path, format!("{e:#}"))
                    })
                }
            })
            .collect();

        let mut reports = Vec::with_capacity(total);
        while let Some(report) = pending.next().await {
            reports.push(report);
            if let Some(callback) = progress {
                callback(reports.len(), total);
            }
        }
        reports
    }

    /// Start watching `path`, then run a Smart refresh that includes it
    pub async fn add_watched_path(
        &self,
        path: &Path,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<RepoReport>> {
        let path = absolutize(path);

        if self.config.add_watched_path(&path).await? {
            info!("Watching {}", path.display());
        } else {
            info!("Already watching {}", path.display());
        }

        self.cache.invalidate_under(&path);
        self.discovery_pending.store(true, Ordering::SeqCst);
        self.refresh(RefreshMode::Smart, progress).await
    }

    /// Stop watching `path`, then run a Smart refresh without it
    pub async fn remove_watched_path(
        &self,
        path: &Path,
        progress: Option<ProgressCallback<'_>>,
    ) -> Result<Vec<RepoReport>> {
        let path = absolutize(path);

        if self.config.remove_watched_path(&path).await? {
            info!("Stopped watching {}", path.display());
        } else {
            warn!("{} was not being watched", path.display());
        }

        self.cache.invalidate_under(&path);
        self.discovery_pending.store(true, Ordering::SeqCst);
        self.refresh(RefreshMode::Smart, progress).await
    }

    /// Smart refresh now and then on every tick until `shutdown` resolves.
    ///
    /// The period comes from `auto_refresh_interval` unless overridden.
    /// Returns the number of completed refreshes.
    pub async fn monitor<F, S>(
        &self,
        period: Option<Duration>,
        shutdown: S,
        mut on_refresh: F,
    ) -> Result<usize>
    where
        F: FnMut(&[RepoReport]),
        S: Future<Output = ()>,
    {
        let period = match period {
            Some(period) => period,
            None => self.config.load_settings().await?.refresh_interval(),
        };
        info!("Monitoring with a refresh every {:?}", period);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut refreshes = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.refresh(RefreshMode::Smart, None).await {
                        Ok(reports) => {
                            refreshes += 1;
                            on_refresh(&reports);
                        }
                        Err(e) => warn!("Refresh failed: {:#}", e),
                    }
                }
            }
        }

        info!("Monitoring stopped after {} refreshes", refreshes);
        Ok(refreshes)
    }
}

/// Split paths into rows served straight from the cache and jobs to run
fn plan(
    mode: RefreshMode,
    paths: HashSet<PathBuf>,
    fresh: &HashMap<PathBuf, CacheEntry>,
) -> (Vec<RepoReport>, Vec<(PathBuf, Job)>) {
    let mut reports = Vec::new();
    let mut jobs = Vec::with_capacity(paths.len());

    for path in paths {
        match (mode, fresh.get(&path)) {
            (RefreshMode::Cached, Some(entry)) => {
                reports.push(RepoReport::from_status(&path, &entry.status()));
            }
            (RefreshMode::Cached, None) => jobs.push((path, Job::LocalOnly)),
            (RefreshMode::Smart, Some(entry)) => {
                jobs.push((path, Job::LocalWithCachedRemote(entry.status())));
            }
            (RefreshMode::Smart, None) | (RefreshMode::Full, _) => jobs.push((path, Job::Inspect)),
        }
    }

    (reports, jobs)
}

/// Runs on a pool worker
fn execute(
    inspector: &dyn RepositoryInspector,
    cache: &StatusCache,
    path: &Path,
    job: Job,
    policy: RemotePolicy,
) -> RepoReport {
    let outcome = match job {
        Job::Inspect => inspector.inspect(path, policy).map(|status| {
            if status.sync_state.is_error() {
                debug!("Not caching {}: remote check failed", path.display());
            } else {
                cache.put(path, &status);
            }
            status
        }),
        Job::LocalWithCachedRemote(cached) => inspector.local_status(path).map(|local| {
            let sync_state = match policy.decide(local.remote_url.as_deref()) {
                RemoteCheck::Skip(state) => state,
                RemoteCheck::Fetch(_) if local.remote_url == cached.remote_url => cached.sync_state,
                RemoteCheck::Fetch(url) => inspector.check_remote(path, Some(url), policy),
            };
            RepositoryStatus::new(local.local_state, local.remote_url, sync_state, local.branch)
        }),
        Job::LocalOnly => inspector.local_status(path).map(|local| {
            RepositoryStatus::new(
                local.local_state,
                local.remote_url,
                SyncState::Unknown,
                local.branch,
            )
        }),
    };

    match outcome {
        Ok(status) => RepoReport::from_status(path, &status),
        Err(e) => {
            warn!("Failed to inspect {}: {:#}", path.display(), e);
            RepoReport::failed(path, format!("{e:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspect::LocalStatus;
    use crate::status::LocalState;
    use crate::workspace::config::MemoryConfigStore;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeInspector {
        local_calls: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl RepositoryInspector for FakeInspector {
        fn is_repository(&self, path: &Path) -> bool {
            path.join(".git").exists()
        }

        fn local_status(&self, _path: &Path) -> Result<LocalStatus> {
            self.local_calls.fetch_add(1, Ordering::SeqCst);
            Ok(LocalStatus {
                local_state: LocalState::Clean,
                branch: "main".to_string(),
                remote_url: Some("https://example.com/team/app.git".to_string()),
            })
        }

        fn remote_sync(&self, _path: &Path, _remote_url: &str) -> Result<SyncState> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(SyncState::Ahead(2))
        }
    }

    fn make_repo(path: &Path) -> PathBuf {
        fs::create_dir_all(path.join(".git")).unwrap();
        path.to_path_buf()
    }

    fn orchestrator(watched: &[&Path]) -> (RefreshOrchestrator, Arc<FakeInspector>) {
        let settings = Settings {
            watched_paths: watched.iter().map(|p| p.to_path_buf()).collect(),
            fetch_https_status: true,
            ..Settings::default()
        };
        let inspector = Arc::new(FakeInspector::default());
        let orchestrator = RefreshOrchestrator::with_parts(
            Arc::new(MemoryConfigStore::new(settings)),
            inspector.clone(),
            Arc::new(StatusCache::new()),
            WorkerPool::new(4),
        );
        (orchestrator, inspector)
    }

    #[tokio::test]
    async fn test_cache_stat_pass_waits_for_a_worker() {
        let temp_dir = TempDir::new().unwrap();
        make_repo(&temp_dir.path().join("app"));
        let pool = WorkerPool::new(1);
        let orchestrator = RefreshOrchestrator::with_parts(
            Arc::new(MemoryConfigStore::new(Settings {
                watched_paths: vec![temp_dir.path().to_path_buf()],
                ..Settings::default()
            })),
            Arc::new(FakeInspector::default()),
            Arc::new(StatusCache::new()),
            pool.clone(),
        );
        orchestrator.refresh(RefreshMode::Full, None).await.unwrap();

        // Occupy the only worker
        let (release, held) = std::sync::mpsc::channel::<()>();
        let busy = tokio::spawn({
            let pool = pool.clone();
            async move { pool.run(move || held.recv()).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(100),
            orchestrator.refresh(RefreshMode::Cached, None),
        )
        .await;
        assert!(blocked.is_err());

        release.send(()).unwrap();
        busy.await.unwrap().unwrap().unwrap();
        let reports = orchestrator.refresh(RefreshMode::Cached, None).await.unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_smart_reuses_fresh_remote_state() {
        let temp_dir = TempDir::new().unwrap();
        let repo = make_repo(&temp_dir.path().join("app"));
        let (orchestrator, inspector) = orchestrator(&[temp_dir.path()]);

        let first = orchestrator.refresh(RefreshMode::Smart, None).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].path, repo);
        assert_eq!(first[0].sync_state, SyncState::Ahead(2));
        assert_eq!(inspector.fetches.load(Ordering::SeqCst), 1);

        let second = orchestrator.refresh(RefreshMode::Smart, None).await.unwrap();
        assert_eq!(second[0].sync_state, SyncState::Ahead(2));
        assert_eq!(inspector.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(inspector.local_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_added_path_bypasses_fast_path() {
        let first_dir = TempDir::new().unwrap();
        let second_dir = TempDir::new().unwrap();
        let first = make_repo(&first_dir.path().join("one"));
        let second = make_repo(&second_dir.path().join("two"));
        let (orchestrator, _) = orchestrator(&[first_dir.path()]);

        orchestrator.refresh(RefreshMode::Smart, None).await.unwrap();

        let reports = orchestrator
            .add_watched_path(second_dir.path(), None)
            .await
            .unwrap();
        let paths: Vec<_> = reports.into_iter().map(|r| r.path).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.contains(&first));
        assert!(paths.contains(&second));
    }

    #[tokio::test]
    async fn test_removed_path_disappears() {
        let first_dir = TempDir::new().unwrap();
        let second_dir = TempDir::new().unwrap();
        let first = make_repo(&first_dir.path().join("one"));
        make_repo(&second_dir.path().join("two"));
        let (orchestrator, _) = orchestrator(&[first_dir.path(), second_dir.path()]);

        let reports = orchestrator.refresh(RefreshMode::Full, None).await.unwrap();
        assert_eq!(reports.len(), 2);

        let reports = orchestrator
            .remove_watched_path(second_dir.path(), None)
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, first);

        let reports = orchestrator.refresh(RefreshMode::Full, None).await.unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn test_monitor_stops_on_shutdown() {
        let temp_dir = TempDir::new().unwrap();
        make_repo(&temp_dir.path().join("app"));
        let (orchestrator, _) = orchestrator(&[temp_dir.path()]);

        let mut seen = Vec::new();
        let refreshes = orchestrator
            .monitor(
                Some(Duration::from_millis(20)),
                tokio::time::sleep(Duration::from_millis(70)),
                |reports| seen.push(reports.len()),
            )
            .await
            .unwrap();

        assert!(refreshes >= 1);
        assert_eq!(seen.len(), refreshes);
        assert!(seen.iter().all(|&count| count == 1));
    }
}
