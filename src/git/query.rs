//! Ad-hoc query gateway.
//!
//! Two entry points that reuse the sanitizer but bypass the ingest pipeline:
//! - `QueryGateway::query_log`: filtered `git log` built from typed options;
//!   every filter value is sanitized before it is placed in an argument
//! - `QueryGateway::run_command`: raw passthrough for read-only subcommands;
//!   the whitelist prefix check is the only guard on the rest of the string

use std::path::Path;
use tracing::{debug, warn};

use crate::config::{Config, Limits};
use crate::error::{AppError, GitError, Result};
use crate::git::runner::{CommandLimits, GitRunner};
use crate::models::{CommandResponse, CommitSummary, LogFormat, LogQuery, LogQueryResponse, ResolvedFilters};
use crate::sanitize::sanitize_parameter;

const PRETTY_FORMAT: &str = "--pretty=format:%H|%s|%an|%ae|%ct|%P";
const DEFAULT_MAX_COUNT: usize = 100;

/// Immutable set of subcommand prefixes the raw gateway accepts.
#[derive(Debug, Clone)]
pub struct CommandWhitelist {
    entries: Vec<String>,
}

impl CommandWhitelist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// `command` is allowed when it equals an entry or continues it after a
    /// space. A leading `git ` is ignored.
    pub fn permits(&self, command: &str) -> bool {
        let command = strip_git_prefix(command);
        self.entries.iter().any(|entry| {
            command == entry
                || command
                    .strip_prefix(entry.as_str())
                    .is_some_and(|rest| rest.starts_with(char::is_whitespace))
        })
    }
}

/// Flags that make a whitelisted subcommand write to the repository or the
/// filesystem.
const WRITE_FLAGS: &[&str] = &["--output"];
const BRANCH_WRITE_FLAGS: &[&str] = &[
    "-d", "-D", "--delete", "-m", "-M", "--move", "-c", "-C", "--copy", "-f", "--force",
    "-u", "--set-upstream-to", "--unset-upstream", "--edit-description", "-t", "--track",
];
const TAG_WRITE_FLAGS: &[&str] = &[
    "-d", "--delete", "-f", "--force", "-a", "--annotate", "-s", "--sign", "-u",
    "--local-user", "-m", "--message", "-F", "--file", "-e", "--edit",
];
/// `branch`/`tag` options whose next token is a value rather than a new ref.
const REF_VALUE_FLAGS: &[&str] = &[
    "--contains", "--no-contains", "--merged", "--no-merged", "--points-at", "--sort",
    "--format", "--column",
];

/// Returns the first argument that would turn a listed read-only subcommand
/// into a write. `branch` and `tag` are limited to listing: a bare name is
/// only accepted as a pattern after `-l`/`--list`.
fn write_argument(args: &[String]) -> Option<&str> {
    let (subcommand, rest) = args.split_first()?;

    for arg in rest {
        let flag = arg.split('=').next().unwrap_or(arg);
        if WRITE_FLAGS.contains(&flag) {
            return Some(arg.as_str());
        }
    }

    let ref_write_flags = match subcommand.as_str() {
        "branch" => BRANCH_WRITE_FLAGS,
        "tag" => TAG_WRITE_FLAGS,
        _ => return None,
    };
    let listing = rest.iter().any(|a| a == "-l" || a == "--list");
    let mut previous: Option<&str> = None;
    for arg in rest {
        let flag = arg.split('=').next().unwrap_or(arg);
        if ref_write_flags.contains(&flag) {
            return Some(arg.as_str());
        }
        let is_value = previous.is_some_and(|p| REF_VALUE_FLAGS.contains(&p));
        if !arg.starts_with('-') && !listing && !is_value {
            return Some(arg.as_str());
        }
        previous = Some(arg.as_str());
    }
    None
}

fn strip_git_prefix(command: &str) -> &str {
    let command = command.trim();
    match command.strip_prefix("git") {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => command,
    }
}

pub struct QueryGateway<'a> {
    runner: &'a dyn GitRunner,
    whitelist: CommandWhitelist,
    limits: Limits,
}

impl<'a> QueryGateway<'a> {
    pub fn new(runner: &'a dyn GitRunner, config: &Config) -> Self {
        Self {
            runner,
            whitelist: CommandWhitelist::new(config.command_whitelist.iter().cloned()),
            limits: config.limits.clone(),
        }
    }

    fn command_limits(&self) -> CommandLimits {
        CommandLimits {
            timeout: self.limits.history_timeout(),
            max_output: self.limits.history_output_bytes,
        }
    }

    /// Run a filtered log query against `repo` (already sanitized).
    pub async fn query_log(&self, repo: &Path, query: &LogQuery) -> Result<LogQueryResponse> {
        let filters = resolve_filters(query, self.limits.max_commits)?;
        let args = build_log_args(&filters, query.stat, query.numstat);
        let command = render_command(&args);
        debug!(command = %command, "running log query");

        let output = self
            .runner
            .run(repo, &args, self.command_limits())
            .await
            .map_err(map_run_error)?;

        let structured = filters.format == LogFormat::Pretty && !query.stat && !query.numstat;
        let (commits, raw) = if structured {
            (Some(parse_pretty_output(&output)), None)
        } else {
            (None, Some(output))
        };

        Ok(LogQueryResponse {
            command,
            filters,
            commits,
            raw,
        })
    }

    /// Forward a whitelisted read-only command to git and return its output.
    pub async fn run_command(&self, repo: &Path, command: &str) -> Result<CommandResponse> {
        if !self.whitelist.permits(command) {
            warn!(command = command, "rejected command outside whitelist");
            return Err(AppError::CommandNotAllowed {
                command: command.to_string(),
                allowed: self.whitelist.entries().to_vec(),
            });
        }

        let args: Vec<String> = strip_git_prefix(command)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if let Some(arg) = write_argument(&args) {
            warn!(command = command, argument = arg, "rejected writing argument");
            return Err(AppError::CommandNotAllowed {
                command: command.to_string(),
                allowed: self.whitelist.entries().to_vec(),
            });
        }
        let rendered = render_command(&args);

        let output = self
            .runner
            .run(repo, &args, self.command_limits())
            .await
            .map_err(map_run_error)?;
        Ok(CommandResponse {
            command: rendered,
            output,
        })
    }
}

fn map_run_error(e: GitError) -> AppError {
    match e {
        GitError::OutputTooLarge { limit } => AppError::OutputTooLarge { limit },
        other => AppError::Git(other),
    }
}

fn sanitize_optional(value: &Option<String>) -> Result<Option<String>> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(Some(sanitize_parameter(v)?)),
        _ => Ok(None),
    }
}

/// Sanitize every filter and clamp the count.
pub fn resolve_filters(query: &LogQuery, max_commits: usize) -> Result<ResolvedFilters> {
    let max_count = query
        .max_count
        .unwrap_or(DEFAULT_MAX_COUNT)
        .clamp(1, max_commits.max(1));

    Ok(ResolvedFilters {
        format: query.format,
        max_count,
        since: sanitize_optional(&query.since)?,
        until: sanitize_optional(&query.until)?,
        author: sanitize_optional(&query.author)?,
        grep: sanitize_optional(&query.grep)?,
        file: sanitize_optional(&query.file)?,
    })
}

pub fn build_log_args(filters: &ResolvedFilters, stat: bool, numstat: bool) -> Vec<String> {
    let mut args = vec!["log".to_string()];

    args.push(match filters.format {
        LogFormat::Pretty => PRETTY_FORMAT.to_string(),
        LogFormat::Oneline => "--oneline".to_string(),
        LogFormat::Short => "--pretty=short".to_string(),
    });
    args.push("--no-color".to_string());
    if stat {
        args.push("--stat".to_string());
    }
    if numstat {
        args.push("--numstat".to_string());
    }
    args.push(format!("--max-count={}", filters.max_count));

    if let Some(since) = &filters.since {
        args.push(format!("--since={}", since));
    }
    if let Some(until) = &filters.until {
        args.push(format!("--until={}", until));
    }
    if let Some(author) = &filters.author {
        args.push(format!("--author={}", author));
    }
    if let Some(grep) = &filters.grep {
        args.push(format!("--grep={}", grep));
    }
    if let Some(file) = &filters.file {
        args.push("--".to_string());
        args.push(file.clone());
    }

    args
}

fn render_command(args: &[String]) -> String {
    let mut rendered = String::from("git");
    for arg in args {
        rendered.push(' ');
        if arg.contains(char::is_whitespace) {
            rendered.push('"');
            rendered.push_str(arg);
            rendered.push('"');
        } else {
            rendered.push_str(arg);
        }
    }
    rendered
}

/// Parse `hash|subject|author|email|epoch|parents` lines. The subject may
/// contain `|`; lines with fewer than six fields are skipped.
pub fn parse_pretty_output(output: &str) -> Vec<CommitSummary> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('|').collect();
            let n = fields.len();
            if n < 6 {
                debug!(raw = line, "skipping malformed log line");
                return None;
            }
            Some(CommitSummary {
                hash: fields[0].to_string(),
                subject: fields[1..n - 4].join("|"),
                author: fields[n - 4].to_string(),
                email: fields[n - 3].to_string(),
                timestamp: fields[n - 2].trim().parse().unwrap_or(0),
                parents: fields[n - 1].split_whitespace().map(str::to_string).collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::runner::testing::MockGitRunner;

    fn whitelist() -> CommandWhitelist {
        CommandWhitelist::new(Config::default().command_whitelist)
    }

    #[test]
    fn test_whitelist_prefix_matching() {
        let list = whitelist();
        assert!(list.permits("git log --oneline"));
        assert!(list.permits("log"));
        assert!(list.permits("  show HEAD~1 "));
        assert!(list.permits("git status --porcelain"));
        assert!(!list.permits("git push origin main"));
        assert!(!list.permits("git status"));
        assert!(!list.permits("git logx"));
        assert!(!list.permits("gitlog"));
        assert!(!list.permits("git config core.hooksPath /tmp"));
        assert!(!list.permits(""));
    }

    #[tokio::test]
    async fn test_run_command_rejects_push() {
        let runner = MockGitRunner::returning("");
        let gateway = QueryGateway::new(&runner, &Config::default());

        let err = gateway
            .run_command(Path::new("/tmp/repo"), "git push origin main")
            .await
            .unwrap_err();
        match err {
            AppError::CommandNotAllowed { allowed, .. } => {
                assert!(allowed.iter().any(|a| a == "log"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_command_accepts_log() {
        let runner = MockGitRunner::returning("abc123 first commit\n");
        let gateway = QueryGateway::new(&runner, &Config::default());

        let response = gateway
            .run_command(Path::new("/tmp/repo"), "git log --oneline")
            .await
            .unwrap();
        assert_eq!(response.command, "git log --oneline");
        assert_eq!(response.output, "abc123 first commit\n");
        assert_eq!(runner.calls(), vec![vec!["log".to_string(), "--oneline".to_string()]]);
    }

    #[test]
    fn test_write_arguments_are_detected() {
        let args = |s: &str| s.split_whitespace().map(str::to_string).collect::<Vec<_>>();

        assert_eq!(write_argument(&args("log --output=/tmp/x")), Some("--output=/tmp/x"));
        assert_eq!(write_argument(&args("diff --output /tmp/x")), Some("--output"));
        assert_eq!(write_argument(&args("branch feature")), Some("feature"));
        assert_eq!(write_argument(&args("branch -D main")), Some("-D"));
        assert_eq!(write_argument(&args("tag -d v1")), Some("-d"));
        assert_eq!(write_argument(&args("tag v2")), Some("v2"));

        assert_eq!(write_argument(&args("log --oneline -n 5")), None);
        assert_eq!(write_argument(&args("show HEAD")), None);
        assert_eq!(write_argument(&args("branch -a -v")), None);
        assert_eq!(write_argument(&args("branch --list feat*")), None);
        assert_eq!(write_argument(&args("branch --contains abc123")), None);
        assert_eq!(write_argument(&args("tag -l v1.*")), None);
        assert_eq!(write_argument(&args("tag")), None);
    }

    #[tokio::test]
    async fn test_run_command_rejects_writing_arguments() {
        let runner = MockGitRunner::returning("");
        let gateway = QueryGateway::new(&runner, &Config::default());

        for command in ["git branch -D main", "git tag -d v1", "git log --output=/tmp/x", "git branch evil"] {
            let err = gateway
                .run_command(Path::new("/tmp/repo"), command)
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::CommandNotAllowed { .. }), "{command}");
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_filters_are_sanitized() {
        let query = LogQuery {
            author: Some("jane; rm -rf /".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            resolve_filters(&query, 1000),
            Err(AppError::InvalidParameter(_))
        ));

        let query = LogQuery {
            file: Some("src/$(id)".to_string()),
            ..Default::default()
        };
        assert!(resolve_filters(&query, 1000).is_err());
    }

    #[test]
    fn test_max_count_is_clamped() {
        let query = LogQuery {
            max_count: Some(50_000),
            ..Default::default()
        };
        assert_eq!(resolve_filters(&query, 1000).unwrap().max_count, 1000);

        let query = LogQuery::default();
        assert_eq!(resolve_filters(&query, 1000).unwrap().max_count, DEFAULT_MAX_COUNT);
    }

    #[test]
    fn test_build_log_args() {
        let query = LogQuery {
            format: LogFormat::Oneline,
            numstat: true,
            max_count: Some(5),
            since: Some("2024-01-01".to_string()),
            author: Some("Jane Doe".to_string()),
            grep: Some("fix".to_string()),
            file: Some("src/main.rs".to_string()),
            ..Default::default()
        };
        let filters = resolve_filters(&query, 1000).unwrap();
        let args = build_log_args(&filters, query.stat, query.numstat);

        assert_eq!(
            args,
            vec![
                "log",
                "--oneline",
                "--no-color",
                "--numstat",
                "--max-count=5",
                "--since=2024-01-01",
                "--author=Jane Doe",
                "--grep=fix",
                "--",
                "src/main.rs",
            ]
        );
        assert_eq!(
            render_command(&args),
            "git log --oneline --no-color --numstat --max-count=5 --since=2024-01-01 \"--author=Jane Doe\" --grep=fix -- src/main.rs"
        );
    }

    #[test]
    fn test_parse_pretty_output() {
        let output = "aaa111|feat: add | pipes|Jane|jane@x.io|1700000000|bbb222 ccc333\nbbb222|root|Bob|bob@x.io|1600000000|\nbroken|line\n";
        let commits = parse_pretty_output(output);

        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].subject, "feat: add | pipes");
        assert_eq!(commits[0].parents, vec!["bbb222", "ccc333"]);
        assert_eq!(commits[0].timestamp, 1_700_000_000);
        assert!(commits[1].parents.is_empty());
    }

    #[tokio::test]
    async fn test_query_log_structured_and_raw() {
        let runner = MockGitRunner::returning("aaa111|msg|Jane|jane@x.io|1700000000|\n");
        let gateway = QueryGateway::new(&runner, &Config::default());

        let response = gateway
            .query_log(Path::new("/tmp/repo"), &LogQuery::default())
            .await
            .unwrap();
        assert_eq!(response.commits.as_ref().map(Vec::len), Some(1));
        assert!(response.raw.is_none());
        assert!(response.command.starts_with("git log --pretty=format:"));

        let query = LogQuery {
            stat: true,
            ..Default::default()
        };
        let response = gateway.query_log(Path::new("/tmp/repo"), &query).await.unwrap();
        assert!(response.commits.is_none());
        assert!(response.raw.is_some());
    }
}
