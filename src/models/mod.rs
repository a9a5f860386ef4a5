//! Records produced by the pipeline and DTOs for the gateway.
//!
//! - `commit`: CommitRecord, FileChange, CommitSummary, ContributorInfo
//! - `file`: FileRecord aggregate with enrichment fields
//! - `ingest`: IngestResult, IngestStats, DateRange
//! - `query`: LogQuery, LogQueryResponse, CommandResponse

pub mod commit;
pub mod file;
pub mod ingest;
pub mod query;

pub use commit::*;
pub use file::*;
pub use ingest::*;
pub use query::*;
