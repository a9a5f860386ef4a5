//! Bounded git subprocess execution.
//!
//! Every git invocation goes through `GitRunner` with an explicit wall-clock
//! timeout and stdout ceiling. Arguments are passed as an argv vector, never
//! through a shell. A timed-out or oversized call is killed when its future is
//! dropped (`kill_on_drop`).

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{trace, warn};

use crate::error::GitError;

const STDERR_LIMIT: u64 = 16 * 1024;

/// Config overrides placed ahead of every subcommand. With `core.quotePath`
/// left on, git prints non-ASCII paths as quoted octal escapes.
const GIT_OVERRIDES: &[&str] = &["-c", "core.quotePath=false"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLimits {
    pub timeout: Duration,
    pub max_output: usize,
}

#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `git -C <repo> <args...>` and return stdout.
    async fn run(&self, repo: &Path, args: &[String], limits: CommandLimits) -> Result<String, GitError>;
}

/// Runs the real git CLI.
#[derive(Debug, Clone, Default)]
pub struct CommandGitRunner;

impl CommandGitRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GitRunner for CommandGitRunner {
    async fn run(&self, repo: &Path, args: &[String], limits: CommandLimits) -> Result<String, GitError> {
        trace!(
            cmd = %format!("git -C {} {}", repo.display(), args.join(" ")),
            "running git command"
        );

        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(repo)
            .args(GIT_OVERRIDES)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_OPTIONAL_LOCKS", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                warn!("git not found in PATH");
                GitError::GitNotInstalled
            } else {
                GitError::Io(e)
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let max_output = limits.max_output;

        let run = async move {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (out_buf, err_buf) = (&mut out, &mut err);

            let read_out = async move {
                if let Some(stdout) = stdout {
                    stdout.take(max_output as u64 + 1).read_to_end(out_buf).await?;
                }
                Ok::<_, std::io::Error>(())
            };
            let read_err = async move {
                if let Some(stderr) = stderr {
                    stderr.take(STDERR_LIMIT).read_to_end(err_buf).await?;
                }
                Ok::<_, std::io::Error>(())
            };
            let (out_res, err_res) = tokio::join!(read_out, read_err);
            out_res?;
            err_res?;

            if out.len() > max_output {
                return Err(GitError::OutputTooLarge { limit: max_output });
            }

            let status = child.wait().await?;
            if status.success() {
                Ok(String::from_utf8_lossy(&out).into_owned())
            } else {
                Err(GitError::CommandFailed {
                    args: args.to_vec(),
                    stderr: String::from_utf8_lossy(&err).trim().to_string(),
                })
            }
        };

        match tokio::time::timeout(limits.timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(GitError::Timeout {
                secs: limits.timeout.as_secs(),
            }),
        }
    }
}
