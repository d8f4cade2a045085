//! Maps [`EngineError`] onto the HTTP boundary taxonomy (spec `# 7`).
//!
//! `EngineError` itself carries no HTTP dependency, so the `IntoResponse`
//! impl lives here on a local newtype — orphan rules forbid implementing a
//! foreign trait for a foreign type directly.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lmv_engine::EngineError;
use serde_json::json;

/// Wraps [`EngineError`] so this crate can implement [`IntoResponse`] for it.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            EngineError::BadRequest { message, .. } => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": "bad_request", "message": message})))
                    .into_response()
            }
            EngineError::Unauthorized { message, .. } => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "unauthorized", "message": message})),
            )
                .into_response(),
            EngineError::Conflict { current_version, .. } => {
                let etag = format!("\"v{current_version}\"");
                let body = Json(json!({
                    "error": "conflict",
                    "message": "If-Match does not match the current version",
                    "current_version": current_version,
                    "current_etag": etag,
                }));
                (StatusCode::CONFLICT, [(axum::http::header::ETAG, etag.clone())], body).into_response()
            }
            EngineError::PatchApply { message, .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({"error": "patch_apply", "message": message})),
            )
                .into_response(),
            EngineError::Corruption { message, .. } => {
                tracing::error!(%message, "vault corruption detected");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "corruption", "message": "internal error"})),
                )
                    .into_response()
            }
            EngineError::Storage { source, .. } => {
                tracing::error!(error = %source, "storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal", "message": "internal error"})),
                )
                    .into_response()
            }
            EngineError::Internal { message, .. } => {
                tracing::error!(%message, "internal engine error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal", "message": "internal error"})),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_409_with_etag_header() {
        let response =
            ApiError(EngineError::Conflict { current_version: 4, context: None }).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers().get(axum::http::header::ETAG).unwrap(), "\"v4\"");
    }

    #[test]
    fn bad_request_maps_to_400() {
        let response =
            ApiError(EngineError::BadRequest { message: "malformed".into(), context: None })
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn corruption_body_hides_internal_detail() {
        let response =
            ApiError(EngineError::Corruption { message: "hash mismatch".into(), context: None })
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
