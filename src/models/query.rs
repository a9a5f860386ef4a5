//! Request and response types for the ad-hoc query gateway.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::models::CommitSummary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Oneline,
    Short,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    pub format: LogFormat,
    pub stat: bool,
    pub numstat: bool,
    pub max_count: Option<usize>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub author: Option<String>,
    pub grep: Option<String>,
    pub file: Option<String>,
}

/// Filter values as they were passed to git, after sanitization and clamping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFilters {
    pub format: LogFormat,
    pub max_count: usize,
    pub since: Option<String>,
    pub until: Option<String>,
    pub author: Option<String>,
    pub grep: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogQueryResponse {
    pub command: String,
    pub filters: ResolvedFilters,
    /// Present for `pretty` output without stat/numstat
    pub commits: Option<Vec<CommitSummary>>,
    /// Present for every other shape of output
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command: String,
    pub output: String,
}
