use std::path::PathBuf;

/// Failures reading or writing settings
#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("Failed to read config file {path}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Failed to write config file {path}: {message}")]
    ConfigWrite { path: PathBuf, message: String },

    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    #[error("Unsupported config format for {path} (expected .yaml, .yml or .json)")]
    UnsupportedConfigFormat { path: PathBuf },
}
