//! Modification times of git-internal marker paths.
//!
//! The newest mtime across `HEAD`, `index`, `refs/heads/**` and
//! `refs/remotes/**` stands in for "the repository changed". Any I/O error
//! counts as no contribution, so transient stat failures favour cache hits.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

pub const MARKER_PATHS: [&str; 4] = ["HEAD", "index", "refs/heads", "refs/remotes"];

/// Locate the git directory of a working tree, following `gitdir:` files
pub fn resolve_git_dir(repo_path: &Path) -> PathBuf {
    let dot_git = repo_path.join(".git");

    if dot_git.is_file() {
        if let Ok(contents) = fs::read_to_string(&dot_git) {
            if let Some(target) = contents
                .lines()
                .find_map(|line| line.strip_prefix("gitdir:"))
            {
                let target = Path::new(target.trim());
                return if target.is_absolute() {
                    target.to_path_buf()
                } else {
                    repo_path.join(target)
                };
            }
        }
    }

    dot_git
}

/// Newest modification time across the marker set, or the epoch if none exist
pub fn marker_mutation_time(repo_path: &Path) -> SystemTime {
    let git_dir = resolve_git_dir(repo_path);

    MARKER_PATHS
        .iter()
        .map(|marker| marker_time(&git_dir.join(marker)))
        .max()
        .unwrap_or(UNIX_EPOCH)
}

fn marker_time(path: &Path) -> SystemTime {
    let Ok(metadata) = fs::metadata(path) else {
        return UNIX_EPOCH;
    };

    if !metadata.is_dir() {
        return metadata.modified().unwrap_or(UNIX_EPOCH);
    }

    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok()?.modified().ok())
        .max()
        .unwrap_or(UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn fake_repo() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let git_dir = temp_dir.path().join(".git");
        fs::create_dir_all(git_dir.join("refs/heads/feature")).unwrap();
        fs::create_dir_all(git_dir.join("refs/remotes/origin")).unwrap();
        fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::write(git_dir.join("refs/heads/main"), "0000\n").unwrap();
        temp_dir
    }

    #[test]
    fn test_missing_git_dir_is_epoch() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(marker_mutation_time(temp_dir.path()), UNIX_EPOCH);
    }

    #[test]
    fn test_nested_ref_files_are_included() {
        let repo = fake_repo();
        let base = SystemTime::now() - Duration::from_secs(3600);
        let git_dir = repo.path().join(".git");
        set_mtime(&git_dir.join("HEAD"), base);
        set_mtime(&git_dir.join("refs/heads/main"), base);

        let nested = git_dir.join("refs/heads/feature/login");
        fs::write(&nested, "1111\n").unwrap();
        let newer = base + Duration::from_secs(600);
        set_mtime(&nested, newer);

        assert_eq!(marker_mutation_time(repo.path()), newer);
    }

    #[test]
    fn test_gitdir_file_is_followed() {
        let repo = fake_repo();
        let worktree = TempDir::new().unwrap();
        fs::write(
            worktree.path().join(".git"),
            format!("gitdir: {}\n", repo.path().join(".git").display()),
        )
        .unwrap();

        assert_eq!(resolve_git_dir(worktree.path()), repo.path().join(".git"));
        assert_eq!(
            marker_mutation_time(worktree.path()),
            marker_mutation_time(repo.path())
        );
    }
}
