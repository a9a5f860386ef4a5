//! Repository size guard.
//!
//! Sums the on-disk size of the git metadata directory before any history is
//! read and refuses repositories above the configured ceiling. The commit
//! estimate derived from that size only sizes later work; it is not a count.

use serde::Serialize;
use walkdir::WalkDir;

use crate::config::Limits;
use crate::error::{AppError, Result};
use crate::git::repository::RepositoryRoot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub size_bytes: u64,
    pub estimated_commits: u64,
}

impl SizeEstimate {
    /// Commits to request from the log command: the estimate capped at
    /// `limits.max_commits`, never less than one.
    pub fn commit_limit(&self, limits: &Limits) -> usize {
        let estimate = usize::try_from(self.estimated_commits).unwrap_or(usize::MAX);
        estimate.clamp(1, limits.max_commits.max(1))
    }
}

/// Measure the metadata directory. Unreadable entries are skipped.
pub fn measure(root: &RepositoryRoot, limits: &Limits) -> SizeEstimate {
    let size_bytes: u64 = WalkDir::new(root.metadata_dir())
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum();

    let estimated_commits = size_bytes / limits.bytes_per_commit_estimate.max(1);

    SizeEstimate {
        size_bytes,
        estimated_commits,
    }
}

/// Measure and enforce the ceiling.
pub fn check_size(root: &RepositoryRoot, limits: &Limits) -> Result<SizeEstimate> {
    let estimate = measure(root, limits);

    if estimate.size_bytes > limits.max_repo_bytes {
        tracing::warn!(
            path = %root.path.display(),
            size = estimate.size_bytes,
            limit = limits.max_repo_bytes,
            "repository exceeds size ceiling"
        );
        return Err(AppError::RepositoryTooLarge {
            size: estimate.size_bytes,
            limit: limits.max_repo_bytes,
        });
    }

    tracing::debug!(
        size = estimate.size_bytes,
        estimated_commits = estimate.estimated_commits,
        "repository size checked"
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn repo_with_metadata(files: &[(&str, u64)]) -> (TempDir, RepositoryRoot) {
        let dir = TempDir::new().unwrap();
        let git = dir.path().join(".git");
        fs::create_dir_all(git.join("objects/ab")).unwrap();
        for (name, len) in files {
            let file = fs::File::create(git.join(name)).unwrap();
            file.set_len(*len).unwrap();
        }
        let root = RepositoryRoot::locate(dir.path().to_path_buf()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_sums_nested_files() {
        let (_dir, root) = repo_with_metadata(&[("HEAD", 100), ("objects/ab/cdef", 4_000)]);
        let estimate = check_size(&root, &Limits::default()).unwrap();
        assert_eq!(estimate.size_bytes, 4_100);
        assert_eq!(estimate.estimated_commits, 4);
    }

    #[test]
    fn test_rejects_over_ceiling() {
        let (_dir, root) = repo_with_metadata(&[("objects/ab/pack", 51 * 1024 * 1024)]);
        let err = check_size(&root, &Limits::default()).unwrap_err();
        assert!(matches!(err, AppError::RepositoryTooLarge { .. }));
    }

    #[test]
    fn test_commit_limit_is_capped() {
        let limits = Limits::default();
        let big = SizeEstimate {
            size_bytes: 0,
            estimated_commits: 40_000,
        };
        assert_eq!(big.commit_limit(&limits), 1000);

        let tiny = SizeEstimate {
            size_bytes: 10,
            estimated_commits: 0,
        };
        assert_eq!(tiny.commit_limit(&limits), 1);
    }
}
