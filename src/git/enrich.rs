//! Concurrent file enrichment.
//!
//! Two passes over the parsed file map, each in fixed-width batches: every
//! item of a batch runs concurrently and the batch is awaited as a whole
//! before the next one starts. Failures are settled per item and folded into
//! sentinel values (`deleted`, complexity 1, empty author list); nothing in
//! here fails the run.
//!
//! - size/complexity: stat + read from the working tree (batches of 10)
//! - authors: `git shortlog` per file (batches of 5)

use futures::future::join_all;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::complexity;
use crate::config::Limits;
use crate::error::GitError;
use crate::git::runner::{CommandLimits, GitRunner};
use crate::models::{ContributorInfo, FileRecord};
use crate::sanitize::{resolve_within, sanitize_relative_path};

/// Complexity assigned when content is skipped (too large or not text).
pub const SENTINEL_COMPLEXITY: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMeasurement {
    Present { size: u64, complexity: u32 },
    /// Stat succeeded but content was not scored
    Skipped { size: u64 },
    Missing,
    /// Resolved outside the repository root
    Escaped,
}

/// Stat and score one file.
pub async fn measure_file(
    root: &Path,
    relative: &str,
    language: Option<&str>,
    max_content_bytes: u64,
) -> FileMeasurement {
    let Some(full) = resolve_within(root, relative) else {
        return FileMeasurement::Escaped;
    };

    let meta = match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => return FileMeasurement::Missing,
        Err(e) => {
            debug!(path = relative, error = %e, "file not on disk");
            return FileMeasurement::Missing;
        }
    };

    let size = meta.len();
    if size > max_content_bytes {
        return FileMeasurement::Skipped { size };
    }

    match read_text(&full).await {
        Some(content) => FileMeasurement::Present {
            size,
            complexity: complexity::score(&content, language),
        },
        None => FileMeasurement::Skipped { size },
    }
}

async fn read_text(path: &Path) -> Option<String> {
    let bytes = tokio::fs::read(path).await.ok()?;
    String::from_utf8(bytes).ok()
}

fn apply_measurement(record: &mut FileRecord, measurement: FileMeasurement) {
    match measurement {
        FileMeasurement::Present { size, complexity } => {
            record.deleted = false;
            record.size = size;
            record.set_complexity(complexity);
        }
        FileMeasurement::Skipped { size } => {
            record.deleted = false;
            record.size = size;
            record.set_complexity(SENTINEL_COMPLEXITY);
        }
        FileMeasurement::Missing => record.mark_deleted(),
        FileMeasurement::Escaped => {
            warn!(path = %record.path, "file resolves outside repository, skipping");
        }
    }
}

/// Size and complexity for every file, `limits.size_batch` at a time.
pub async fn enrich_sizes(root: &Path, files: &mut HashMap<String, FileRecord>, limits: &Limits) {
    let start = std::time::Instant::now();
    let mut paths: Vec<String> = files.keys().cloned().collect();
    paths.sort();

    for batch in paths.chunks(limits.size_batch.max(1)) {
        let languages: Vec<Option<String>> = batch
            .iter()
            .map(|path| files.get(path).and_then(|f| f.language.clone()))
            .collect();
        let jobs = batch.iter().zip(languages).map(|(path, language)| async move {
            let measurement =
                measure_file(root, path, language.as_deref(), limits.max_content_bytes).await;
            (path, measurement)
        });

        for (path, measurement) in join_all(jobs).await {
            if let Some(record) = files.get_mut(path) {
                apply_measurement(record, measurement);
            }
        }
    }

    info!(files = files.len(), "size/complexity pass finished in {:?}", start.elapsed());
}

/// Arguments listing contributors of one file, busiest first.
pub fn author_args(relative: &str) -> Vec<String> {
    vec![
        "shortlog".to_string(),
        "-s".to_string(),
        "-n".to_string(),
        "-e".to_string(),
        "HEAD".to_string(),
        "--".to_string(),
        relative.to_string(),
    ]
}

/// Parse `shortlog -sne` lines (`   12\tName <email>`). Output is already
/// sorted by count; ties keep git's order.
pub fn parse_shortlog(output: &str, top: usize) -> Vec<ContributorInfo> {
    let mut authors: Vec<ContributorInfo> = output
        .lines()
        .filter_map(|line| {
            let (count, who) = line.trim().split_once('\t')?;
            let commit_count = count.trim().parse().ok()?;
            let (name, email) = match who.rsplit_once(" <") {
                Some((name, rest)) => (name.trim(), rest.trim_end_matches('>')),
                None => (who.trim(), ""),
            };
            Some(ContributorInfo {
                name: name.to_string(),
                email: email.to_string(),
                commit_count,
            })
        })
        .collect();

    authors.sort_by(|a, b| b.commit_count.cmp(&a.commit_count));
    authors.truncate(top);
    authors
}

/// Top contributors of one file. Any failure yields an empty list.
pub async fn extract_authors(
    runner: &dyn GitRunner,
    root: &Path,
    relative: &str,
    limits: &Limits,
) -> Result<Vec<ContributorInfo>, GitError> {
    let relative = sanitize_relative_path(relative).map_err(|e| GitError::CommandFailed {
        args: vec!["shortlog".to_string()],
        stderr: e.to_string(),
    })?;

    let command_limits = CommandLimits {
        timeout: limits.author_timeout(),
        max_output: limits.author_output_bytes,
    };
    let output = runner.run(root, &author_args(&relative), command_limits).await?;
    Ok(parse_shortlog(&output, limits.top_authors))
}

/// Primary authors for every file, `limits.author_batch` at a time.
pub async fn enrich_authors(
    runner: &dyn GitRunner,
    root: &Path,
    files: &mut HashMap<String, FileRecord>,
    limits: &Limits,
) {
    let start = std::time::Instant::now();
    let mut paths: Vec<String> = files.keys().cloned().collect();
    paths.sort();
    let mut failures = 0usize;

    for batch in paths.chunks(limits.author_batch.max(1)) {
        let jobs = batch.iter().map(|path| async move {
            (path, extract_authors(runner, root, path, limits).await)
        });

        for (path, outcome) in join_all(jobs).await {
            let authors = match outcome {
                Ok(authors) => authors,
                Err(e) => {
                    failures += 1;
                    warn!(path = %path, error = %e, "author extraction failed");
                    Vec::new()
                }
            };
            if let Some(record) = files.get_mut(path) {
                record.primary_authors = authors;
            }
        }
    }

    info!(
        files = files.len(),
        failures,
        "author pass finished in {:?}",
        start.elapsed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::runner::testing::MockGitRunner;
    use crate::models::FileChange;
    use std::fs;
    use tempfile::TempDir;

    fn record(path: &str) -> FileRecord {
        FileRecord::first_sighting(
            &FileChange {
                path: path.to_string(),
                lines_added: 1,
                lines_deleted: 0,
            },
            0,
        )
    }

    fn file_map(paths: &[&str]) -> HashMap<String, FileRecord> {
        paths.iter().map(|p| (p.to_string(), record(p))).collect()
    }

    #[tokio::test]
    async fn test_measures_present_file() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("src")).unwrap();
        fs::write(root.path().join("src/a.ts"), "if (x) { return await y }").unwrap();

        let mut files = file_map(&["src/a.ts"]);
        enrich_sizes(root.path(), &mut files, &Limits::default()).await;

        let file = &files["src/a.ts"];
        assert!(!file.deleted);
        assert_eq!(file.size, 25);
        // 1 + if + return + await
        assert_eq!(file.complexity, 4);
        assert_eq!(file.max_complexity, 4);
    }

    #[tokio::test]
    async fn test_missing_file_is_marked_deleted() {
        let root = TempDir::new().unwrap();
        let mut files = file_map(&["gone.rs"]);
        enrich_sizes(root.path(), &mut files, &Limits::default()).await;

        let file = &files["gone.rs"];
        assert!(file.deleted);
        assert_eq!(file.complexity, 0);
    }

    #[tokio::test]
    async fn test_oversized_file_gets_sentinel_without_scoring() {
        let root = TempDir::new().unwrap();
        // would score 100 if it were read
        let content = "if else while ".repeat(80_000);
        fs::write(root.path().join("big.js"), &content).unwrap();
        assert!(content.len() as u64 > 1024 * 1024);

        let measurement = measure_file(root.path(), "big.js", Some("JavaScript"), 1024 * 1024).await;
        assert_eq!(
            measurement,
            FileMeasurement::Skipped {
                size: content.len() as u64
            }
        );

        let mut files = file_map(&["big.js"]);
        enrich_sizes(root.path(), &mut files, &Limits::default()).await;
        assert_eq!(files["big.js"].complexity, SENTINEL_COMPLEXITY);
    }

    #[tokio::test]
    async fn test_binary_file_gets_sentinel() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("logo.png"), [0x89, 0x50, 0xff, 0xfe, 0x00]).unwrap();

        let mut files = file_map(&["logo.png"]);
        enrich_sizes(root.path(), &mut files, &Limits::default()).await;

        let file = &files["logo.png"];
        assert!(!file.deleted);
        assert_eq!(file.size, 5);
        assert_eq!(file.complexity, SENTINEL_COMPLEXITY);
    }

    #[tokio::test]
    async fn test_escaping_path_is_left_untouched() {
        let root = TempDir::new().unwrap();
        let measurement = measure_file(root.path(), "../../etc/passwd", None, 1024).await;
        assert_eq!(measurement, FileMeasurement::Escaped);
    }

    #[tokio::test]
    async fn test_many_files_across_batches() {
        let root = TempDir::new().unwrap();
        let names: Vec<String> = (0..23).map(|i| format!("f{}.rs", i)).collect();
        for name in &names {
            fs::write(root.path().join(name), "fn main() {}").unwrap();
        }
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut files = file_map(&refs);

        enrich_sizes(root.path(), &mut files, &Limits::default()).await;
        assert!(files.values().all(|f| !f.deleted && f.complexity == 1 && f.size == 12));
    }

    #[test]
    fn test_parse_shortlog() {
        let output = "    12\tJane Doe <jane@example.com>\n     3\tBob <bob@example.com>\n     7\tAl <al@x.io>\n     1\tEve <eve@x.io>\n";
        let authors = parse_shortlog(output, 3);
        let names: Vec<&str> = authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Jane Doe", "Al", "Bob"]);
        assert_eq!(authors[0].email, "jane@example.com");
        assert_eq!(authors[0].commit_count, 12);
    }

    #[test]
    fn test_parse_shortlog_ignores_noise() {
        assert!(parse_shortlog("", 3).is_empty());
        assert!(parse_shortlog("garbage\n\n", 3).is_empty());
    }

    #[tokio::test]
    async fn test_author_failures_do_not_abort_batch() {
        let runner = MockGitRunner::new(|args| {
            let path = args.last().cloned().unwrap_or_default();
            if path == "b.rs" {
                Err(GitError::Timeout { secs: 10 })
            } else {
                Ok("     4\tJane <jane@x.io>\n".to_string())
            }
        });
        let root = TempDir::new().unwrap();
        let mut files = file_map(&["a.rs", "b.rs", "c.rs", "d.rs", "e.rs", "f.rs", "g.rs"]);

        enrich_authors(&runner, root.path(), &mut files, &Limits::default()).await;

        assert_eq!(runner.calls_to("shortlog"), 7);
        assert!(files["b.rs"].primary_authors.is_empty());
        for path in ["a.rs", "c.rs", "g.rs"] {
            assert_eq!(files[path].primary_authors.len(), 1);
            assert_eq!(files[path].primary_authors[0].name, "Jane");
        }
    }

    #[tokio::test]
    async fn test_author_query_shape() {
        let runner = MockGitRunner::returning("");
        let root = TempDir::new().unwrap();
        let authors = extract_authors(&runner, root.path(), "src/a.ts", &Limits::default())
            .await
            .unwrap();

        assert!(authors.is_empty());
        let calls = runner.calls();
        assert_eq!(calls[0], author_args("src/a.ts"));
        assert_eq!(calls[0][calls[0].len() - 2], "--");
    }
}
