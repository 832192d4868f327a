//! Repository status caching.
//!
//! The cache lives only in memory: every process starts cold.

mod markers;
mod status_cache;

pub use markers::{marker_mutation_time, resolve_git_dir, MARKER_PATHS};
pub use status_cache::{
    CacheEntry, CacheStats, CachedStatus, EntryState, StatusCache, DEFAULT_CACHE_TIMEOUT_SECS,
};
