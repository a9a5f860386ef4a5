use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use crate::error::Result;
use crate::models::{CommandResponse, LogQuery, LogQueryResponse};
use crate::pipeline::IngestPipeline;

pub fn routes(pipeline: IngestPipeline) -> Router {
    Router::new()
        .route("/api/v1/query/log", post(query_log))
        .route("/api/v1/query/command", post(run_command))
        .with_state(pipeline)
}

#[derive(Debug, Deserialize)]
struct LogRequest {
    path: String,
    #[serde(flatten)]
    query: LogQuery,
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    path: String,
    command: String,
}

async fn query_log(
    State(pipeline): State<IngestPipeline>,
    Json(request): Json<LogRequest>,
) -> Result<Json<LogQueryResponse>> {
    let root = pipeline.resolve_repository(&request.path)?;
    let response = pipeline.gateway().query_log(&root.path, &request.query).await?;
    Ok(Json(response))
}

async fn run_command(
    State(pipeline): State<IngestPipeline>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandResponse>> {
    let root = pipeline.resolve_repository(&request.path)?;
    let response = pipeline.gateway().run_command(&root.path, &request.command).await?;
    Ok(Json(response))
}
