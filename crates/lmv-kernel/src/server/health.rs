use axum::http::header;
use axum::{Json, response::IntoResponse};
use lmv_derive::{api_handler, api_model};

#[api_model]
/// Liveness probe response
struct HealthResponse {
    /// Always `true`; a response at all is the signal.
    ok: bool,
}

#[api_handler(
    get,
    path = "/healthz",
    responses((status = OK, description = "Liveness probe", body = HealthResponse)),
    tag = "system",
)]
pub(super) async fn health_handler() -> impl IntoResponse {
    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(HealthResponse { ok: true }),
    )
}
