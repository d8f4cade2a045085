//! `GET /v1/ledger` (spec `# 6`).

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use lmv_derive::api_handler;
use lmv_engine::Engine;
use lmv_kernel::server::{ApiError, ApiState};
use serde::Deserialize;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

const DEFAULT_LIMIT: u64 = 100;

pub(crate) fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new().routes(routes!(get_ledger))
}

#[derive(Debug, Deserialize)]
struct LedgerQuery {
    since: Option<u64>,
    limit: Option<u64>,
}

#[api_handler(
    get,
    path = "/v1/ledger",
    params(("since" = Option<u64>, Query), ("limit" = Option<u64>, Query)),
    responses((status = 200, description = "A page of the hash-chained journal")),
    tag = "ledger",
)]
async fn get_ledger(
    State(engine): State<Engine>,
    Query(query): Query<LedgerQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let since = query.since.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let page = engine.get_ledger(since, limit).await?;
    Ok((StatusCode::OK, Json(page)))
}
