//! Path and parameter validation applied before anything reaches a git
//! subprocess.
//!
//! - `PathSanitizer::sanitize_repository_path`: absolute, normalized path
//!   that must sit under one of the configured base directories
//! - `sanitize_parameter`: rejects shell metacharacters outright
//! - `sanitize_relative_path`: repository-relative file paths from git output
//! - `resolve_within`: re-checks that a file path stays inside its repository

use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

/// Characters never allowed in a value interpolated into a git invocation.
pub const FORBIDDEN_CHARS: &[char] = &[';', '&', '|', '`', '$', '(', ')', '{', '}', '[', ']', '\\'];

#[derive(Debug, Clone)]
pub struct PathSanitizer {
    bases: Vec<PathBuf>,
}

impl PathSanitizer {
    pub fn new<I, P>(bases: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let bases = bases
            .into_iter()
            .filter_map(|b| absolute(b.as_ref()).ok())
            .collect();
        Self { bases }
    }

    /// Resolve `raw` to an absolute path under one of the allowed bases.
    pub fn sanitize_repository_path(&self, raw: &str) -> Result<PathBuf> {
        if raw.trim().is_empty() {
            return Err(AppError::InvalidPath("empty path".to_string()));
        }
        if raw.contains('\0') {
            return Err(AppError::InvalidPath("path contains NUL byte".to_string()));
        }

        let input = Path::new(raw);
        if input.components().any(|c| c == Component::ParentDir) {
            return Err(AppError::InvalidPath(format!("{}: parent directory segment", raw)));
        }
        if raw.contains('~') {
            return Err(AppError::InvalidPath(format!("{}: home directory shorthand", raw)));
        }

        let resolved = absolute(input)?;
        let rendered = resolved.to_string_lossy();
        if rendered.contains('~') || resolved.components().any(|c| c == Component::ParentDir) {
            return Err(AppError::InvalidPath(format!("{}: unsafe after normalization", raw)));
        }

        if !self.bases.iter().any(|base| resolved.starts_with(base)) {
            tracing::warn!(path = %resolved.display(), "path outside allowed directories");
            return Err(AppError::InvalidPath(format!(
                "{} is outside the allowed directories",
                resolved.display()
            )));
        }

        Ok(resolved)
    }
}

/// Reject any value carrying a shell metacharacter. Values without one are
/// returned unchanged; nothing is ever stripped.
pub fn sanitize_parameter(raw: &str) -> Result<String> {
    if let Some(c) = raw.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(AppError::InvalidParameter(format!(
            "{:?} contains forbidden character {:?}",
            raw, c
        )));
    }
    Ok(raw.to_string())
}

/// Validate a repository-relative path reported by git.
pub fn sanitize_relative_path(raw: &str) -> Result<String> {
    let value = sanitize_parameter(raw)?;
    let path = Path::new(&value);

    if value.is_empty() || path.is_absolute() {
        return Err(AppError::InvalidPath(format!("{:?} is not repository-relative", raw)));
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(AppError::InvalidPath(format!("{:?}: parent directory segment", raw)));
    }
    Ok(value)
}

/// Join `relative` onto `root` and return it only if the result still lives
/// under `root`, both lexically and after resolving symlinks when the file
/// exists.
pub fn resolve_within(root: &Path, relative: &str) -> Option<PathBuf> {
    let joined = normalize(&root.join(relative));
    if !joined.starts_with(root) {
        return None;
    }

    if let (Ok(real), Ok(real_root)) = (std::fs::canonicalize(&joined), std::fs::canonicalize(root)) {
        if !real.starts_with(&real_root) {
            return None;
        }
    }

    Some(joined)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| AppError::Internal(format!("No working directory: {}", e)))?
            .join(path)
    };
    Ok(normalize(&joined))
}

/// Lexical normalization: drops `.` segments and folds `..` into its parent.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
