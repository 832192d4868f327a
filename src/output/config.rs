//! Output configuration and mode management

use console::Term;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Output mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Tables and messages on stdout, logs on stderr
    Human,
    /// A JSON document on stdout, everything else on stderr
    Json,
}

/// Configuration for the output system
#[derive(Debug)]
pub struct OutputConfig {
    mode: OutputMode,
    color_enabled: bool,
    log_level: Level,
}

impl OutputConfig {
    pub fn new(mode: OutputMode) -> Self {
        let color_enabled = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported(),
            OutputMode::Json => false,
        };

        // Progress bars carry the interactive feedback, so logs stay quiet by default
        let log_level = match mode {
            OutputMode::Human => Level::WARN,
            OutputMode::Json => Level::ERROR,
        };

        Self {
            mode,
            color_enabled,
            log_level,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_enabled
    }

    pub fn log_level(&self) -> Level {
        self.log_level
    }

    /// Set verbose mode (DEBUG level)
    pub fn set_verbose(&mut self) {
        self.log_level = Level::DEBUG;
    }

    /// Install the global tracing subscriber. `RUST_LOG` directives win over the default level.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::builder()
            .with_default_directive(self.log_level.into())
            .from_env_lossy();

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr);

        if !self.color_enabled {
            colored::control::set_override(false);
            console::set_colors_enabled(false);
        }

        // A subscriber installed by an embedding application stays in place
        let _ = match self.mode {
            OutputMode::Human => builder.with_ansi(self.color_enabled).try_init(),
            OutputMode::Json => builder.with_ansi(false).without_time().compact().try_init(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_disables_color() {
        let config = OutputConfig::new(OutputMode::Json);
        assert!(!config.colors_enabled());
        assert_eq!(config.log_level(), Level::ERROR);
    }

    #[test]
    fn test_verbose_raises_level() {
        let mut config = OutputConfig::new(OutputMode::Human);
        config.set_verbose();
        assert_eq!(config.log_level(), Level::DEBUG);
    }
}
