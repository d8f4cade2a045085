//! `GET`/`PATCH /v1/memory` (spec `# 6`).

use crate::gate;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use lmv_derive::api_handler;
use lmv_domain::ApiConfig;
use lmv_engine::{Engine, EngineError, StateView};
use lmv_kernel::server::{ApiError, ApiState};
use serde_json::Value;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

const PATCH_CONTENT_TYPE: &str = "application/json-patch+json";

pub(crate) fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new().routes(routes!(get_memory, patch_memory))
}

#[api_handler(
    get,
    path = "/v1/memory",
    responses((status = 200, description = "Current memory document, cursors, and ETag")),
    tag = "memory",
)]
async fn get_memory(State(engine): State<Engine>) -> Result<impl IntoResponse, ApiError> {
    let state = engine.current_state().await?;
    Ok(state_response(&state))
}

#[api_handler(
    patch,
    path = "/v1/memory",
    responses(
        (status = 200, description = "Patch applied"),
        (status = 400, description = "Malformed request"),
        (status = 401, description = "Write gate rejected the request"),
        (status = 409, description = "Stale If-Match"),
        (status = 422, description = "Patch could not be applied"),
    ),
    tag = "memory",
)]
async fn patch_memory(
    State(engine): State<Engine>,
    State(config): State<ApiConfig>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let auth = gate::check(&config, &headers)?;

    // The body is taken as raw bytes, not `Json<Value>`: axum's own `Json`
    // extractor runs its content-type check ahead of any handler code and
    // rejects with its own body shape outside the `ApiError` taxonomy. Taking
    // `Bytes` means every rejection — bad content-type or bad JSON — goes
    // through `bad_request` below.
    let content_type = required_header(&headers, header::CONTENT_TYPE.as_str(), "Content-Type")?;
    if content_type != PATCH_CONTENT_TYPE {
        return Err(bad_request(format!("Content-Type must be {PATCH_CONTENT_TYPE}")).into());
    }
    let if_match = required_header(&headers, header::IF_MATCH.as_str(), "If-Match")?;
    let actor = required_header(&headers, "x-lmv-actor", "X-LMV-Actor")?;
    let reason = required_header(&headers, "x-lmv-reason", "X-LMV-Reason")?;

    let patch: Value =
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("request body is not valid JSON: {e}")))?;

    // `If-Match` carries an HTTP-quoted opaque tag, same shape as the `ETag`
    // responses echo (`"v{n}"`); the engine itself only understands the bare
    // `v{n}` form, so unwrap the quoting at the transport boundary.
    let if_match =
        if_match.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(if_match.as_str());

    let outcome = engine.patch_memory(if_match, patch, actor, reason, auth).await?;

    let mut body = serde_json::to_value(&outcome.state).expect("StateView always serializes");
    body["applied_entry_cursor"] = Value::from(outcome.applied_cursor);

    Ok((StatusCode::OK, [(header::ETAG, outcome.state.etag())], Json(body)))
}

fn state_response(state: &StateView) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::ETAG, state.etag())],
        Json(serde_json::to_value(state).expect("StateView always serializes")),
    )
}

fn required_header(headers: &HeaderMap, name: &str, label: &str) -> Result<String, ApiError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| bad_request(format!("missing or malformed {label} header")).into())
}

fn bad_request(message: impl Into<std::borrow::Cow<'static, str>>) -> EngineError {
    EngineError::BadRequest { message: message.into(), context: None }
}
