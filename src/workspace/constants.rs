//! Configuration paths for repo-sentinel

use std::path::PathBuf;

/// Configuration directory path relative to home directory
pub const CONFIG_DIR_PATH: &str = ".config/repo-sentinel";

/// Display name for user messages
pub const CONFIG_DIR_DISPLAY: &str = "~/.config/repo-sentinel";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "REPO_SENTINEL_CONFIG";

/// Get the configuration directory path
pub fn get_config_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default().join(CONFIG_DIR_PATH)
}

/// Get the default config file path
pub fn get_default_config_path() -> PathBuf {
    get_config_dir().join("config.yaml")
}
