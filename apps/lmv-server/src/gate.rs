//! Bearer-token write gate (spec `# 6`, "Write gate").

use axum::http::HeaderMap;
use axum::http::header;
use lmv_domain::ApiConfig;
use lmv_domain::memory::AuthMethod;
use lmv_engine::EngineError;

/// Checks the `Authorization` header against the configured write token.
///
/// Returns the [`AuthMethod`] to record in the resulting journal entry. If no
/// token is configured every write is ungated and recorded as
/// [`AuthMethod::None`].
///
/// # Errors
/// [`EngineError::Unauthorized`] if a token is configured and the header is
/// absent, malformed, or does not match byte-for-byte.
pub(crate) fn check(config: &ApiConfig, headers: &HeaderMap) -> Result<AuthMethod, EngineError> {
    let Some(expected) = config.write_token.as_deref() else {
        return Ok(AuthMethod::None);
    };

    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if token == expected => Ok(AuthMethod::Token),
        _ => Err(EngineError::Unauthorized {
            message: "missing or invalid bearer token".into(),
            context: None,
        }),
    }
}
