//! Output routing for human and machine-readable modes
//!
//! In human mode, user-facing text goes to stdout and logs to stderr. In JSON
//! mode stdout carries only the JSON document, so everything else moves to
//! stderr.

mod config;
mod display;
pub mod writer;

pub use config::{OutputConfig, OutputMode};

use once_cell::sync::OnceCell;

static OUTPUT_CONFIG: OnceCell<OutputConfig> = OnceCell::new();

/// Initialize the output system with the specified mode and verbosity.
///
/// Only the first call takes effect.
pub fn init_with_verbosity(mode: OutputMode, verbose: bool) {
    let mut config = OutputConfig::new(mode);
    if verbose {
        config.set_verbose();
    }

    if OUTPUT_CONFIG.get().is_some() {
        return;
    }

    config.init_tracing();
    let _ = OUTPUT_CONFIG.set(config);
}

/// Get current output mode
pub fn current_mode() -> OutputMode {
    OUTPUT_CONFIG
        .get()
        .map(|config| config.mode())
        .unwrap_or(OutputMode::Human)
}
