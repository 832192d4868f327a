//! repo-sentinel library
//!
//! Watches directories of git repositories and reports each repository's
//! local and remote synchronization state, trusting cached results only while
//! nothing inside the repository has changed.

pub mod cache;
pub mod error;
pub mod inspect;
pub mod output;
pub mod status;
pub mod ui;
pub mod utils;
pub mod workspace;

// Re-export commonly used types
pub use cache::StatusCache;
pub use error::SentinelError;
pub use inspect::{GitInspector, RemotePolicy, RepositoryInspector};
pub use status::{LocalState, RepoReport, RepositoryStatus, SyncState};
pub use workspace::{
    ConfigStore, FileConfigStore, MemoryConfigStore, RefreshMode, RefreshOrchestrator, Settings,
};
