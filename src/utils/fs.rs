use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Ensure the parent directory of a file exists, creating it if necessary
pub fn ensure_parent_dir<P: AsRef<Path>>(file: P) -> Result<()> {
    let Some(parent) = file.as_ref().parent() else {
        return Ok(());
    };

    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    if !parent.exists() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    } else if !parent.is_dir() {
        anyhow::bail!("Path exists but is not a directory: {}", parent.display());
    }

    Ok(())
}

/// Dotfile or dot-directory name
pub fn is_hidden<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Expand tilde in path
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();

    if let Some(path_str) = path.to_str() {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }

    path.to_path_buf()
}

/// Expand tilde and anchor relative paths at the current directory
pub fn absolutize<P: AsRef<Path>>(path: P) -> PathBuf {
    let expanded = expand_tilde(path);
    if expanded.is_absolute() {
        return expanded;
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd.join(expanded),
        Err(_) => expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden("/repos/.cache"));
        assert!(!is_hidden("/repos/project"));
        assert!(!is_hidden("/"));
    }

    #[test]
    fn test_expand_tilde() {
        if dirs::home_dir().is_some() {
            let expanded = expand_tilde("~/test");
            assert!(expanded.to_string_lossy().contains("test"));
            assert!(!expanded.to_string_lossy().starts_with('~'));
        }

        let unchanged = expand_tilde("/absolute/path");
        assert_eq!(unchanged, Path::new("/absolute/path"));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(absolutize("/srv/code"), Path::new("/srv/code"));
        assert!(absolutize("relative/dir").is_absolute());
    }

    #[test]
    fn test_ensure_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("nested").join("config.yaml");

        ensure_parent_dir(&file).unwrap();
        assert!(file.parent().unwrap().is_dir());

        // Existing directory is fine
        ensure_parent_dir(&file).unwrap();
    }
}
