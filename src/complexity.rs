//! Heuristic complexity score for file content.
//!
//! Counts control-flow keywords plus a brace-imbalance term and clamps the
//! result to `[1, 100]`. This is a cheap ordering signal, not a structural
//! metric: the imbalance term is not nesting depth, and keywords inside
//! strings or comments count like any other.

use regex::Regex;
use std::sync::LazyLock;

use crate::language::is_ecmascript;

pub const MIN_SCORE: u32 = 1;
pub const MAX_SCORE: u32 = 100;

static CONTROL_FLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|else|while|for|switch|case|try|catch|function|class|return)\b").unwrap()
});

static ASYNC_AWAIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:async|await)\b").unwrap());

/// Score `content`, optionally taking the detected language into account.
pub fn score(content: &str, language: Option<&str>) -> u32 {
    let mut total: u64 = MIN_SCORE as u64;

    total += CONTROL_FLOW.find_iter(content).count() as u64;

    let open = content.matches('{').count() as u64;
    let close = content.matches('}').count() as u64;
    total += 2 * open.saturating_sub(close);

    if language.is_some_and(is_ecmascript) {
        total += ASYNC_AWAIT.find_iter(content).count() as u64;
    }

    total.min(MAX_SCORE as u64) as u32
}
