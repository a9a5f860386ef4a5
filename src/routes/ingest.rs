use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::IngestResult;
use crate::pipeline::IngestPipeline;

pub fn routes(pipeline: IngestPipeline) -> Router {
    Router::new()
        .route("/api/v1/ingest", post(ingest))
        .with_state(pipeline)
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    repository_id: String,
    path: Option<String>,
    url: Option<String>,
}

async fn ingest(
    State(pipeline): State<IngestPipeline>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResult>> {
    let result = match (request.path, request.url) {
        (Some(path), None) => pipeline.ingest(&request.repository_id, &path).await?,
        (None, Some(url)) => pipeline.ingest_remote(&request.repository_id, &url).await?,
        _ => {
            return Err(AppError::InvalidParameter(
                "exactly one of path or url is required".to_string(),
            ));
        }
    };
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::git::runner::testing::MockGitRunner;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(base: &TempDir, runner: Arc<MockGitRunner>) -> Router {
        let config = Config::default().with_allowed_bases(vec![base.path().to_path_buf()]);
        routes(IngestPipeline::new(Arc::new(config), runner))
    }

    async fn send(app: Router, body: Value) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/ingest")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_requires_exactly_one_target() {
        let base = TempDir::new().unwrap();
        let runner = Arc::new(MockGitRunner::returning(""));

        let (status, body) = send(
            app(&base, runner.clone()),
            json!({"repository_id": "r", "path": "/tmp/x", "url": "https://host/r.git"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Validation failed");
        assert!(body["details"].as_str().unwrap().contains("exactly one of path or url"));

        let (status, body) = send(app(&base, runner.clone()), json!({"repository_id": "r"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["category"], "validation");

        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_error_payload_shape() {
        let base = TempDir::new().unwrap();
        let runner = Arc::new(MockGitRunner::returning(""));

        let (status, body) = send(
            app(&base, runner.clone()),
            json!({"repository_id": "r", "path": "/etc"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"].as_str().unwrap().contains("outside the allowed directories"));

        let missing = base.path().join("missing");
        let (status, body) = send(
            app(&base, runner),
            json!({"repository_id": "r", "path": missing.to_str().unwrap()}),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Repository not found");
    }
}
