use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::SentinelError;
use crate::inspect::RemotePolicy;
use crate::utils::fs::{ensure_parent_dir, expand_tilde};

/// User settings, re-read at the start of every refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base directories scanned for repositories
    pub watched_paths: Vec<PathBuf>,
    /// How many directory levels below a watched path are searched
    pub max_depth: usize,
    /// Descend into dot-directories while scanning
    pub show_hidden: bool,
    /// Fetch from SSH remotes
    pub use_ssh_agent: bool,
    /// Fetch from HTTPS and other non-SSH remotes
    pub fetch_https_status: bool,
    /// Seconds a cached status stays fresh
    pub remote_cache_timeout: u64,
    /// Seconds between refreshes in monitor mode
    pub auto_refresh_interval: u64,
    /// Directory name globs never descended into
    pub skip_dirs: Vec<String>,
    /// Worker pool size; defaults to twice the available parallelism
    pub max_workers: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watched_paths: Vec::new(),
            max_depth: 3,
            show_hidden: false,
            use_ssh_agent: true,
            fetch_https_status: false,
            remote_cache_timeout: 120,
            auto_refresh_interval: 300,
            skip_dirs: default_skip_dirs(),
            max_workers: None,
        }
    }
}

fn default_skip_dirs() -> Vec<String> {
    [
        "node_modules",
        "target",
        "dist",
        "build",
        "vendor",
        "__pycache__",
        ".venv",
        "venv",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Settings {
    pub fn validate(&self) -> Result<(), SentinelError> {
        if self.max_workers == Some(0) {
            return Err(SentinelError::InvalidSetting {
                field: "max_workers",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.remote_cache_timeout == 0 {
            return Err(SentinelError::InvalidSetting {
                field: "remote_cache_timeout",
                reason: "must be at least 1 second".to_string(),
            });
        }

        if self.auto_refresh_interval == 0 {
            return Err(SentinelError::InvalidSetting {
                field: "auto_refresh_interval",
                reason: "must be at least 1 second".to_string(),
            });
        }

        for pattern in &self.skip_dirs {
            if let Err(e) = glob::Pattern::new(pattern) {
                return Err(SentinelError::InvalidSetting {
                    field: "skip_dirs",
                    reason: format!("'{pattern}': {e}"),
                });
            }
        }

        Ok(())
    }

    /// Watched paths with `~` expanded, duplicates removed, order kept
    pub fn expanded_watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(self.watched_paths.len());
        for path in self.watched_paths.iter().map(expand_tilde) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_cache_timeout)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.auto_refresh_interval)
    }

    pub fn remote_policy(&self) -> RemotePolicy {
        RemotePolicy::new(self.use_ssh_agent, self.fetch_https_status)
    }

    /// Compiled `skip_dirs`; invalid patterns are logged and ignored
    pub fn skip_patterns(&self) -> Vec<glob::Pattern> {
        self.skip_dirs
            .iter()
            .filter_map(|pattern| match glob::Pattern::new(pattern) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!("Ignoring invalid skip pattern '{}': {}", pattern, e);
                    None
                }
            })
            .collect()
    }

    fn contains_watched_path(&self, path: &Path) -> bool {
        self.watched_paths
            .iter()
            .any(|existing| expand_tilde(existing) == path)
    }
}

/// Source of settings and owner of the watched-path list
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Current settings snapshot
    async fn load_settings(&self) -> Result<Settings>;

    /// Returns false when the path was already watched
    async fn add_watched_path(&self, path: &Path) -> Result<bool>;

    /// Returns false when the path was not watched
    async fn remove_watched_path(&self, path: &Path) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, SentinelError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("json") => Ok(ConfigFormat::Json),
            _ => Err(SentinelError::UnsupportedConfigFormat {
                path: path.to_path_buf(),
            }),
        }
    }

    fn parse(self, path: &Path, contents: &str) -> Result<Settings, SentinelError> {
        let parsed = match self {
            ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
        };

        parsed.map_err(|message| SentinelError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn render(self, path: &Path, settings: &Settings) -> Result<String, SentinelError> {
        let rendered = match self {
            ConfigFormat::Yaml => serde_yaml::to_string(settings).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::to_string_pretty(settings).map_err(|e| e.to_string()),
        };

        rendered.map_err(|message| SentinelError::ConfigWrite {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Settings persisted in a YAML or JSON file, chosen by extension
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    format: ConfigFormat,
    // Serializes read-modify-write of the watched path list
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_tilde(path);
        let format = ConfigFormat::from_path(&path)?;

        Ok(Self {
            path,
            format,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load_from_file(&self) -> Result<Settings> {
        if !self.path.exists() {
            info!(
                "No config file at {}, writing defaults",
                self.path.display()
            );
            let settings = Settings::default();
            self.save_to_file(&settings).await?;
            return Ok(settings);
        }

        let contents =
            fs::read_to_string(&self.path)
                .await
                .map_err(|source| SentinelError::ConfigRead {
                    path: self.path.clone(),
                    source,
                })?;

        let settings = self.format.parse(&self.path, &contents)?;
        settings.validate()?;

        debug!(
            "Loaded settings from {} ({} watched paths)",
            self.path.display(),
            settings.watched_paths.len()
        );
        Ok(settings)
    }

    pub async fn save_to_file(&self, settings: &Settings) -> Result<()> {
        ensure_parent_dir(&self.path)?;

        let rendered = self.format.render(&self.path, settings)?;
        fs::write(&self.path, rendered)
            .await
            .map_err(|e| SentinelError::ConfigWrite {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_settings(&self) -> Result<Settings> {
        self.load_from_file().await
    }

    async fn add_watched_path(&self, path: &Path) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load_from_file().await?;

        if settings.contains_watched_path(path) {
            return Ok(false);
        }

        settings.watched_paths.push(path.to_path_buf());
        self.save_to_file(&settings).await?;
        Ok(true)
    }

    async fn remove_watched_path(&self, path: &Path) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load_from_file().await?;

        let before = settings.watched_paths.len();
        settings
            .watched_paths
            .retain(|existing| expand_tilde(existing) != path);

        if settings.watched_paths.len() == before {
            return Ok(false);
        }

        self.save_to_file(&settings).await?;
        Ok(true)
    }
}

/// In-process settings, for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    settings: RwLock<Settings>,
}

impl MemoryConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Replace the settings seen by the next `load_settings`
    pub fn replace(&self, settings: Settings) {
        match self.settings.write() {
            Ok(mut guard) => *guard = settings,
            Err(poisoned) => *poisoned.into_inner() = settings,
        }
    }

    fn snapshot(&self) -> Settings {
        match self.settings.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update<F: FnOnce(&mut Settings) -> bool>(&self, f: F) -> bool {
        match self.settings.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load_settings(&self) -> Result<Settings> {
        let settings = self.snapshot();
        settings.validate()?;
        Ok(settings)
    }

    async fn add_watched_path(&self, path: &Path) -> Result<bool> {
        Ok(self.update(|settings| {
            if settings.contains_watched_path(path) {
                return false;
            }
            settings.watched_paths.push(path.to_path_buf());
            true
        }))
    }

    async fn remove_watched_path(&self, path: &Path) -> Result<bool> {
        Ok(self.update(|settings| {
            let before = settings.watched_paths.len();
            settings
                .watched_paths
                .retain(|existing| expand_tilde(existing) != path);
            settings.watched_paths.len() != before
        }))
    }
}
