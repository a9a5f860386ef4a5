//! Result set handed to the storage collaborator after a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{CommitRecord, FileRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub repository_id: String,
    pub commits: Vec<CommitRecord>,
    pub files: Vec<FileRecord>,
    pub stats: IngestStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub total_commits: usize,
    pub total_files: usize,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

impl IngestStats {
    pub fn from_records(commits: &[CommitRecord], files: &[FileRecord]) -> Self {
        let earliest = commits.iter().map(|c| c.timestamp).min();
        let latest = commits.iter().map(|c| c.timestamp).max();

        let date_range = match (earliest, latest) {
            (Some(e), Some(l)) => Some(DateRange {
                earliest: DateTime::from_timestamp_millis(e).unwrap_or_default(),
                latest: DateTime::from_timestamp_millis(l).unwrap_or_default(),
            }),
            _ => None,
        };

        Self {
            total_commits: commits.len(),
            total_files: files.len(),
            date_range,
        }
    }
}
