//! API route handlers - thin HTTP surface over the pipeline.
//!
//! - `ingest`: POST /api/v1/ingest (local path or https URL)
//! - `query`: POST /api/v1/query/log and POST /api/v1/query/command

pub mod ingest;
pub mod query;

use axum::Router;

use crate::pipeline::IngestPipeline;

pub fn create_router(pipeline: IngestPipeline) -> Router {
    Router::new()
        .merge(ingest::routes(pipeline.clone()))
        .merge(query::routes(pipeline))
}
