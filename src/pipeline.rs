//! Ingestion pipeline orchestration.
//!
//! sanitize → locate → size guard → history read → size/complexity pass →
//! author pass → result set. Validation and whole-history failures end the
//! run; per-file problems only degrade individual records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::git::repository::{RepositoryRoot, clone_remote};
use crate::git::{GitRunner, QueryGateway, enrich, history, size_guard};
use crate::models::{FileRecord, IngestResult, IngestStats};
use crate::sanitize::PathSanitizer;

#[derive(Clone)]
pub struct IngestPipeline {
    config: Arc<Config>,
    sanitizer: PathSanitizer,
    runner: Arc<dyn GitRunner>,
}

impl IngestPipeline {
    pub fn new(config: Arc<Config>, runner: Arc<dyn GitRunner>) -> Self {
        let sanitizer = PathSanitizer::new(&config.allowed_bases);
        Self {
            config,
            sanitizer,
            runner,
        }
    }

    /// Sanitize a caller-supplied path and check it holds a repository.
    pub fn resolve_repository(&self, raw: &str) -> Result<RepositoryRoot> {
        let path = self.sanitizer.sanitize_repository_path(raw)?;
        RepositoryRoot::locate(path)
    }

    pub fn gateway(&self) -> QueryGateway<'_> {
        QueryGateway::new(self.runner.as_ref(), &self.config)
    }

    /// Ingest a local repository.
    pub async fn ingest(&self, repository_id: &str, raw_path: &str) -> Result<IngestResult> {
        let root = self.resolve_repository(raw_path)?;
        self.ingest_root(repository_id, root).await
    }

    /// Clone `url` into a temporary directory, ingest it, then remove it.
    pub async fn ingest_remote(&self, repository_id: &str, url: &str) -> Result<IngestResult> {
        let url = url.to_string();
        let limits = self.config.limits.clone();
        let timeout = limits.clone_timeout();
        let clone = tokio::task::spawn_blocking(move || clone_remote(&url, &limits));
        let cloned = tokio::time::timeout(timeout, clone)
            .await
            .map_err(|_| AppError::CloneTimeout {
                secs: timeout.as_secs(),
            })?
            .map_err(|e| AppError::Internal(format!("Clone task failed: {}", e)))??;

        let root = RepositoryRoot::locate(cloned.path().to_path_buf())?;
        let result = self.ingest_root(repository_id, root).await;
        drop(cloned);
        result
    }

    async fn ingest_root(&self, repository_id: &str, root: RepositoryRoot) -> Result<IngestResult> {
        let start = Instant::now();
        let limits = &self.config.limits;

        let guard_root = root.clone();
        let guard_limits = limits.clone();
        let estimate = tokio::task::spawn_blocking(move || {
            size_guard::check_size(&guard_root, &guard_limits)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Size check failed: {}", e)))??;
        let max_commits = estimate.commit_limit(limits);

        info!(
            repository = repository_id,
            path = %root.path.display(),
            size = estimate.size_bytes,
            max_commits,
            "starting ingestion"
        );

        let parsed = history::parse_history(self.runner.as_ref(), &root.path, max_commits, limits).await?;
        let mut files = parsed.files;

        enrich::enrich_sizes(&root.path, &mut files, limits).await;
        enrich::enrich_authors(self.runner.as_ref(), &root.path, &mut files, limits).await;

        let files = into_sorted(files);
        let stats = IngestStats::from_records(&parsed.commits, &files);

        info!(
            repository = repository_id,
            commits = stats.total_commits,
            files = stats.total_files,
            "ingestion finished in {:?}",
            start.elapsed()
        );

        Ok(IngestResult {
            repository_id: repository_id.to_string(),
            commits: parsed.commits,
            files,
            stats,
        })
    }
}

fn into_sorted(files: HashMap<String, FileRecord>) -> Vec<FileRecord> {
    let mut files: Vec<FileRecord> = files.into_values().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}
