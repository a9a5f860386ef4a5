//! Per-file aggregate built from the history stream and enriched from disk.

use serde::{Deserialize, Serialize};

use crate::language::{detect_language, extension_of};
use crate::models::{ContributorInfo, FileChange};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub extension: String,
    pub language: Option<String>,
    /// Oldest commit touching the file, in milliseconds
    pub first_seen: i64,
    /// Newest commit touching the file, in milliseconds
    pub last_modified: i64,
    pub total_changes: u32,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub size: u64,
    pub complexity: u32,
    pub max_complexity: u32,
    /// Most contributions first
    pub primary_authors: Vec<ContributorInfo>,
    pub deleted: bool,
}

impl FileRecord {
    /// Create the record for the first commit seen touching `change.path`.
    pub fn first_sighting(change: &FileChange, timestamp: i64) -> Self {
        let extension = extension_of(&change.path);
        let language = detect_language(&extension).map(str::to_string);

        Self {
            path: change.path.clone(),
            extension,
            language,
            first_seen: timestamp,
            last_modified: timestamp,
            total_changes: 1,
            lines_added: change.lines_added,
            lines_deleted: change.lines_deleted,
            size: 0,
            complexity: 0,
            max_complexity: 0,
            primary_authors: Vec::new(),
            deleted: false,
        }
    }

    /// Fold another commit touching this file into the aggregate.
    pub fn record_change(&mut self, change: &FileChange, timestamp: i64) {
        self.first_seen = self.first_seen.min(timestamp);
        self.last_modified = self.last_modified.max(timestamp);
        self.total_changes += 1;
        self.lines_added += change.lines_added;
        self.lines_deleted += change.lines_deleted;
    }

    pub fn set_complexity(&mut self, complexity: u32) {
        self.complexity = complexity;
        self.max_complexity = self.max_complexity.max(complexity);
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
        self.size = 0;
        self.complexity = 0;
    }
}
