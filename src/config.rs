//! Runtime configuration for the ingestion pipeline.
//!
//! A `Config` is built once at startup (defaults, optionally overlaid by a
//! JSON file) and handed to the sanitizer, the query gateway and the pipeline
//! as an immutable value. Nothing in the crate reads allow-lists from ambient
//! global state, so tests construct their own.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

const MIB: u64 = 1024 * 1024;

/// Read-only subcommands the raw command gateway will forward to git.
/// `branch` and `tag` only pass in listing form, and `--output` is refused
/// for every entry (see `git::query`).
pub const DEFAULT_COMMAND_WHITELIST: &[&str] = &[
    "log",
    "show",
    "diff",
    "blame",
    "ls-files",
    "rev-list",
    "branch",
    "tag",
    "status --porcelain",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository paths must resolve beneath one of these directories
    pub allowed_bases: Vec<PathBuf>,
    /// Subcommand prefixes accepted by the raw command gateway
    pub command_whitelist: Vec<String>,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allowed_bases: default_allowed_bases(),
            command_whitelist: DEFAULT_COMMAND_WHITELIST
                .iter()
                .map(|s| s.to_string())
                .collect(),
            limits: Limits::default(),
        }
    }
}

/// Hard resource ceilings applied throughout a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Metadata directory size above which a run is refused
    pub max_repo_bytes: u64,
    /// Upper bound on commits read in one run
    pub max_commits: usize,
    /// Metadata bytes assumed per commit when estimating history volume
    pub bytes_per_commit_estimate: u64,
    pub history_output_bytes: usize,
    pub history_timeout_secs: u64,
    pub author_output_bytes: usize,
    pub author_timeout_secs: u64,
    /// Wall-clock allowance for cloning a remote repository
    pub clone_timeout_secs: u64,
    /// Files larger than this are never read for complexity scoring
    pub max_content_bytes: u64,
    pub size_batch: usize,
    pub author_batch: usize,
    pub top_authors: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_repo_bytes: 50 * MIB,
            max_commits: 1000,
            bytes_per_commit_estimate: 1024,
            history_output_bytes: 5 * MIB as usize,
            history_timeout_secs: 60,
            author_output_bytes: 64 * 1024,
            author_timeout_secs: 10,
            clone_timeout_secs: 120,
            max_content_bytes: MIB,
            size_batch: 10,
            author_batch: 5,
            top_authors: 3,
        }
    }
}

impl Limits {
    pub fn history_timeout(&self) -> Duration {
        Duration::from_secs(self.history_timeout_secs)
    }

    pub fn author_timeout(&self) -> Duration {
        Duration::from_secs(self.author_timeout_secs)
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }
}

impl Config {
    /// Load configuration, overlaying an optional JSON file on the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Internal(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw).map_err(|e| {
            AppError::Internal(format!("Invalid config {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            bases = config.allowed_bases.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Same limits and whitelist, different path allow-list.
    pub fn with_allowed_bases(mut self, bases: Vec<PathBuf>) -> Self {
        self.allowed_bases = bases;
        self
    }
}

fn default_allowed_bases() -> Vec<PathBuf> {
    let mut bases = vec![std::env::temp_dir(), PathBuf::from("/var/tmp")];
    if let Some(home) = dirs::home_dir() {
        bases.push(home);
    }
    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd);
    }
    bases
}
