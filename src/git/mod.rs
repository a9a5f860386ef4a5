//! Git access for the ingestion pipeline.
//!
//! - `runner`: bounded subprocess execution behind the `GitRunner` trait
//! - `repository`: locating a local checkout, cloning a remote one
//! - `size_guard`: metadata size ceiling and commit estimate
//! - `history`: whole-history log read and stream parser
//! - `enrich`: batched size/complexity and author passes
//! - `query`: ad-hoc log queries and the whitelisted command passthrough

pub mod enrich;
pub mod history;
pub mod query;
pub mod repository;
pub mod runner;
pub mod size_guard;

pub use query::{CommandWhitelist, QueryGateway};
pub use repository::RepositoryRoot;
pub use runner::{CommandGitRunner, CommandLimits, GitRunner};
