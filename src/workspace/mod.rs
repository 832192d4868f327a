//! Watched paths, discovery and refresh orchestration

pub mod config;
pub mod constants;
mod discovery;
mod manager;
mod pool;

pub use config::{ConfigFormat, ConfigStore, FileConfigStore, MemoryConfigStore, Settings};
pub use discovery::{DiscoveryScanner, ScanOptions};
pub use manager::{ProgressCallback, RefreshMode, RefreshOrchestrator};
pub use pool::WorkerPool;
