//! Application error types and HTTP response mapping.
//!
//! `GitError` describes a single failed git subprocess. `AppError` is the
//! run-level outcome surfaced to callers; every variant belongs to one of
//! three categories (see `ErrorCategory`) and Axum's `IntoResponse` turns it
//! into a `{error, details}` JSON body.
//!
//! Error mappings:
//! - `RepoNotFound` → 404
//! - `InvalidPath`, `InvalidParameter`, `RepositoryTooLarge`,
//!   `CommandNotAllowed` → 400
//! - everything else → 500

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("git executable not found in PATH")]
    GitNotInstalled,

    #[error("git command timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("git output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },

    #[error("git {} failed: {stderr}", .args.join(" "))]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Repository too large: {size} bytes exceeds the {limit} byte ceiling")]
    RepositoryTooLarge { size: u64, limit: u64 },

    #[error("Reading history timed out after {secs}s")]
    HistoryReadTimeout { secs: u64 },

    #[error("Cloning timed out after {secs}s")]
    CloneTimeout { secs: u64 },

    #[error("Command output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },

    #[error("Command not allowed: {command}")]
    CommandNotAllowed {
        command: String,
        allowed: Vec<String>,
    },

    #[error("Clone failed: {0}")]
    Clone(#[from] git2::Error),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification reported alongside every failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NotFound,
    Validation,
    Processing,
}

impl AppError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::RepoNotFound(_) => ErrorCategory::NotFound,
            AppError::InvalidPath(_)
            | AppError::InvalidParameter(_)
            | AppError::RepositoryTooLarge { .. }
            | AppError::CommandNotAllowed { .. } => ErrorCategory::Validation,
            AppError::HistoryReadTimeout { .. }
            | AppError::CloneTimeout { .. }
            | AppError::OutputTooLarge { .. }
            | AppError::Clone(_)
            | AppError::Git(_)
            | AppError::Internal(_) => ErrorCategory::Processing,
        }
    }

    /// Structured `{error, details}` payload for callers.
    pub fn to_payload(&self) -> serde_json::Value {
        let error = match self.category() {
            ErrorCategory::NotFound => "Repository not found",
            ErrorCategory::Validation => "Validation failed",
            ErrorCategory::Processing => "Processing failed",
        };

        let mut payload = json!({
            "error": error,
            "category": self.category(),
            "details": self.to_string(),
        });
        if let AppError::CommandNotAllowed { allowed, .. } = self {
            payload["allowed"] = json!(allowed);
        }
        payload
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.category() {
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Processing => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self.to_payload())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            AppError::RepoNotFound("/tmp/x".into()).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            AppError::RepositoryTooLarge { size: 2, limit: 1 }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            AppError::HistoryReadTimeout { secs: 60 }.category(),
            ErrorCategory::Processing
        );
    }

    #[test]
    fn test_payload_lists_whitelist_on_rejection() {
        let err = AppError::CommandNotAllowed {
            command: "push origin main".into(),
            allowed: vec!["log".into(), "show".into()],
        };
        let payload = err.to_payload();
        assert_eq!(payload["error"], "Validation failed");
        assert_eq!(payload["category"], "validation");
        assert_eq!(payload["allowed"], json!(["log", "show"]));
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::InvalidPath("..".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = AppError::RepoNotFound("/nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::Git(GitError::Timeout { secs: 10 }).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
