//! Status values produced by repository inspection

mod parser;
mod types;

pub use parser::StatusParser;
pub use types::{
    compare_paths, sort_reports, DisabledReason, LocalState, RepoReport, RepositoryStatus,
    SyncState,
};
