//! `POST /v1/snapshot` (spec `# 6`).

use crate::gate;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use lmv_derive::api_handler;
use lmv_domain::ApiConfig;
use lmv_engine::Engine;
use lmv_kernel::server::{ApiError, ApiState};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub(crate) fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new().routes(routes!(post_snapshot))
}

#[api_handler(
    post,
    path = "/v1/snapshot",
    responses(
        (status = 200, description = "Compaction result"),
        (status = 401, description = "Write gate rejected the request"),
    ),
    tag = "snapshot",
)]
async fn post_snapshot(
    State(engine): State<Engine>,
    State(config): State<ApiConfig>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    gate::check(&config, &headers)?;
    let result = engine.snapshot().await?;
    Ok((StatusCode::OK, Json(result)))
}
