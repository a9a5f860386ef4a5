//! Commit records produced by the history parser and the query gateway.

use serde::{Deserialize, Serialize};

/// One parsed log entry. Timestamps are milliseconds since the epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: i64,
    pub files_changed: Vec<String>,
    pub lines_added: u64,
    pub lines_deleted: u64,
}

/// Per-file stats of a single commit. Folded into `CommitRecord` and
/// `FileRecord`, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub lines_added: u64,
    pub lines_deleted: u64,
}

/// Typed row of a `pretty` format log query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub subject: String,
    pub author: String,
    pub email: String,
    /// Seconds since the epoch
    pub timestamp: i64,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorInfo {
    pub name: String,
    pub email: String,
    pub commit_count: usize,
}
