//! Git history ingestion and enrichment.
//!
//! Turns the history of a local (or freshly cloned) repository into commit
//! and file records: per-file change counts, a heuristic complexity score and
//! primary authors. Every git call runs as a bounded subprocess on sanitized
//! input.
//!
//! - `pipeline`: the ingest entry point
//! - `git`: subprocess runner, history parser, enrichment, query gateway
//! - `sanitize`: path and parameter validation
//! - `complexity`, `language`: content heuristics
//! - `models`: records handed to callers
//! - `routes`: optional HTTP surface

pub mod complexity;
pub mod config;
pub mod error;
pub mod git;
pub mod language;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod sanitize;

pub use config::Config;
pub use error::{AppError, ErrorCategory, Result};
pub use pipeline::IngestPipeline;
