//! History stream parser.
//!
//! Runs `git log` once with a pipe-delimited header per commit followed by
//! `--numstat` lines, then folds the output into `CommitRecord`s and a
//! per-path `FileRecord` map in a single forward pass.
//!
//! The parser is a two-state machine: `AwaitingHeader` until a valid header
//! opens a commit, `AccumulatingFiles` while numstat lines attach to it. A new
//! header (valid or not) or end of input flushes the open commit.

use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::config::Limits;
use crate::error::{AppError, GitError, Result};
use crate::git::runner::{CommandLimits, GitRunner};
use crate::models::{CommitRecord, FileChange, FileRecord};
use crate::sanitize::sanitize_relative_path;

pub const FIELD_SEPARATOR: char = '|';
pub const HEADER_FORMAT: &str = "--pretty=format:%H|%s|%an|%ae|%ct";
const HEADER_FIELDS: usize = 5;

static HASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-fA-F]{7,64}$").unwrap());

/// `added<TAB>deleted<TAB>path`; binary files report `-` for both counts.
static NUMSTAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+|-)\s+(\d+|-)\s+(.+)$").unwrap());

#[derive(Debug, Default)]
pub struct ParsedHistory {
    /// Log order, newest first
    pub commits: Vec<CommitRecord>,
    pub files: HashMap<String, FileRecord>,
}

#[derive(Debug)]
enum ParserState {
    AwaitingHeader,
    AccumulatingFiles(CommitRecord),
}

#[derive(Debug)]
pub struct HistoryParser {
    state: ParserState,
    output: ParsedHistory,
    malformed_headers: usize,
    skipped_files: usize,
}

impl Default for HistoryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::AwaitingHeader,
            output: ParsedHistory::default(),
            malformed_headers: 0,
            skipped_files: 0,
        }
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, ParserState::AccumulatingFiles(_))
    }

    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            return;
        }

        if let Some(caps) = NUMSTAT.captures(line) {
            if let ParserState::AccumulatingFiles(commit) = &mut self.state {
                let raw_path = resolve_rename(&caps[3]);
                match sanitize_relative_path(&raw_path) {
                    Ok(path) => {
                        let change = FileChange {
                            path,
                            lines_added: parse_count(&caps[1]),
                            lines_deleted: parse_count(&caps[2]),
                        };
                        apply_change(commit, &mut self.output.files, change);
                    }
                    Err(e) => {
                        self.skipped_files += 1;
                        warn!(sha = %commit.sha, error = %e, "skipping file line");
                    }
                }
            } else {
                debug!(raw = line, "stat line outside a commit");
            }
            return;
        }

        if line.contains(FIELD_SEPARATOR) {
            self.flush();
            match parse_header(line) {
                Some(commit) => self.state = ParserState::AccumulatingFiles(commit),
                None => {
                    self.malformed_headers += 1;
                    warn!(raw = line, "skipping malformed commit header");
                }
            }
            return;
        }

        debug!(raw = line, "ignoring unrecognised log line");
    }

    fn flush(&mut self) {
        let state = std::mem::replace(&mut self.state, ParserState::AwaitingHeader);
        if let ParserState::AccumulatingFiles(commit) = state {
            self.output.commits.push(commit);
        }
    }

    pub fn finish(mut self) -> ParsedHistory {
        self.flush();
        if self.malformed_headers > 0 || self.skipped_files > 0 {
            warn!(
                malformed_headers = self.malformed_headers,
                skipped_files = self.skipped_files,
                "history parsed with skipped lines"
            );
        }
        self.output
    }
}

/// Parse a complete log stream.
pub fn parse_log_output(output: &str) -> ParsedHistory {
    let mut parser = HistoryParser::new();
    for line in output.lines() {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Split `hash|subject|name|email|epoch`. The subject may itself contain the
/// separator, so the hash is taken from the left and the last three fields
/// from the right.
fn parse_header(line: &str) -> Option<CommitRecord> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
    if fields.len() < HEADER_FIELDS {
        return None;
    }

    let sha = fields[0].trim();
    if !HASH.is_match(sha) {
        return None;
    }

    let n = fields.len();
    let message = fields[1..n - 3].join("|");
    let epoch_secs = fields[n - 1].trim().parse::<i64>().unwrap_or(0);

    Some(CommitRecord {
        sha: sha.to_string(),
        message,
        author_name: fields[n - 3].to_string(),
        author_email: fields[n - 2].to_string(),
        timestamp: epoch_secs.saturating_mul(1000),
        files_changed: Vec::new(),
        lines_added: 0,
        lines_deleted: 0,
    })
}

fn parse_count(field: &str) -> u64 {
    field.parse().unwrap_or(0)
}

/// Numstat reports renames as `old => new` or `dir/{old => new}/file`.
pub fn resolve_rename(path: &str) -> String {
    let path = path.trim();
    if !path.contains(" => ") {
        return path.to_string();
    }

    if let (Some(open), Some(close)) = (path.find('{'), path.rfind('}')) {
        if open < close {
            let inner = &path[open + 1..close];
            let new = inner.split(" => ").nth(1).unwrap_or(inner);
            let joined = format!("{}{}{}", &path[..open], new, &path[close + 1..]);
            return joined.replace("//", "/");
        }
    }

    path.split(" => ").nth(1).unwrap_or(path).to_string()
}

fn apply_change(commit: &mut CommitRecord, files: &mut HashMap<String, FileRecord>, change: FileChange) {
    commit.lines_added += change.lines_added;
    commit.lines_deleted += change.lines_deleted;

    match files.get_mut(&change.path) {
        Some(record) => record.record_change(&change, commit.timestamp),
        None => {
            files.insert(
                change.path.clone(),
                FileRecord::first_sighting(&change, commit.timestamp),
            );
        }
    }

    commit.files_changed.push(change.path);
}

/// Arguments for the whole-history read.
pub fn history_args(max_commits: usize) -> Vec<String> {
    vec![
        "log".to_string(),
        HEADER_FORMAT.to_string(),
        "--numstat".to_string(),
        "--no-color".to_string(),
        format!("--max-count={}", max_commits),
    ]
}

/// Read and parse up to `max_commits` commits of `repo`. A timeout or an
/// oversized output fails the whole run.
pub async fn parse_history(
    runner: &dyn GitRunner,
    repo: &Path,
    max_commits: usize,
    limits: &Limits,
) -> Result<ParsedHistory> {
    let command_limits = CommandLimits {
        timeout: limits.history_timeout(),
        max_output: limits.history_output_bytes,
    };

    let start = std::time::Instant::now();
    let output = runner
        .run(repo, &history_args(max_commits), command_limits)
        .await
        .map_err(|e| match e {
            GitError::Timeout { secs } => AppError::HistoryReadTimeout { secs },
            GitError::OutputTooLarge { limit } => AppError::OutputTooLarge { limit },
            other => AppError::Git(other),
        })?;

    let parsed = parse_log_output(&output);
    info!(
        path = %repo.display(),
        commits = parsed.commits.len(),
        files = parsed.files.len(),
        "parsed history in {:?}",
        start.elapsed()
    );
    Ok(parsed)
}
