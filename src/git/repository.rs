use git2::build::RepoBuilder;
use git2::{FetchOptions, RemoteCallbacks, Repository};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::config::Limits;
use crate::error::{AppError, Result};
use crate::sanitize::sanitize_parameter;

/// A sanitized repository root that exists on disk.
#[derive(Debug, Clone)]
pub struct RepositoryRoot {
    pub path: PathBuf,
}

impl RepositoryRoot {
    /// Check that `path` (already sanitized) is a working tree with git
    /// metadata. No git command runs here.
    pub fn locate(path: PathBuf) -> Result<Self> {
        if !path.is_dir() {
            return Err(AppError::RepoNotFound(path.display().to_string()));
        }
        if !path.join(".git").exists() {
            return Err(AppError::RepoNotFound(format!(
                "{} has no .git metadata",
                path.display()
            )));
        }
        Ok(Self { path })
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.path.join(".git")
    }
}

/// A remote repository cloned into a temporary directory. The clone is
/// removed when this value is dropped.
pub struct ClonedRepository {
    dir: TempDir,
}

impl ClonedRepository {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Only plain `https://` URLs without shell metacharacters or whitespace.
pub fn validate_remote_url(url: &str) -> Result<String> {
    let url = sanitize_parameter(url.trim())?;
    if !url.starts_with("https://") || url.len() <= "https://".len() {
        return Err(AppError::InvalidParameter(format!("{}: only https URLs are supported", url)));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(AppError::InvalidParameter(format!("{:?} contains whitespace", url)));
    }
    Ok(url)
}

/// Outcome of a transfer progress check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferVerdict {
    Continue,
    TooLarge { received: u64 },
    TimedOut,
}

/// Byte and wall-clock allowance for one clone.
#[derive(Debug, Clone, Copy)]
pub struct TransferBudget {
    pub max_bytes: u64,
    pub timeout: Duration,
    started: Instant,
}

impl TransferBudget {
    pub fn new(max_bytes: u64, timeout: Duration) -> Self {
        Self {
            max_bytes,
            timeout,
            started: Instant::now(),
        }
    }

    pub fn check(&self, received: u64) -> TransferVerdict {
        if received > self.max_bytes {
            TransferVerdict::TooLarge { received }
        } else if self.started.elapsed() > self.timeout {
            TransferVerdict::TimedOut
        } else {
            TransferVerdict::Continue
        }
    }

    fn into_error(self, verdict: TransferVerdict) -> Option<AppError> {
        match verdict {
            TransferVerdict::Continue => None,
            TransferVerdict::TooLarge { received } => Some(AppError::RepositoryTooLarge {
                size: received,
                limit: self.max_bytes,
            }),
            TransferVerdict::TimedOut => Some(AppError::CloneTimeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Shallow-clone `url` under the system temp directory. The transfer is
/// aborted once it exceeds `max_repo_bytes` or the clone timeout.
pub fn clone_remote(url: &str, limits: &Limits) -> Result<ClonedRepository> {
    let url = validate_remote_url(url)?;
    let dir = tempfile::Builder::new()
        .prefix("git-ingest-")
        .tempdir_in(std::env::temp_dir())
        .map_err(|e| AppError::Internal(format!("Failed to create clone directory: {}", e)))?;

    let budget = TransferBudget::new(limits.max_repo_bytes, limits.clone_timeout());
    let verdict = Cell::new(TransferVerdict::Continue);

    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|progress| {
        let outcome = budget.check(progress.received_bytes() as u64);
        verdict.set(outcome);
        outcome == TransferVerdict::Continue
    });

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    fetch.depth(limits.max_commits.clamp(1, i32::MAX as usize) as i32);

    let start = Instant::now();
    let repo: Repository = match RepoBuilder::new().fetch_options(fetch).clone(&url, dir.path()) {
        Ok(repo) => repo,
        Err(e) => {
            return Err(match budget.into_error(verdict.get()) {
                Some(abort) => {
                    tracing::warn!(url = %url, error = %abort, "clone aborted");
                    abort
                }
                None => AppError::Clone(e),
            });
        }
    };
    tracing::info!(
        url = %url,
        path = %dir.path().display(),
        bare = repo.is_bare(),
        "cloned remote in {:?}",
        start.elapsed()
    );

    Ok(ClonedRepository { dir })
}
