use axum::extract::FromRef;
use lmv_domain::ApiConfig;
use lmv_engine::Engine;
use std::borrow::Cow;
use std::ops::Deref;
use std::sync::Arc;

#[lmv_derive::lmv_error]
pub enum ApiStateError {
    #[error("State validation error{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[derive(Debug)]
pub struct ApiStateInner {
    pub config: ApiConfig,
    pub engine: Engine,
}

#[derive(Debug, Clone)]
pub struct ApiState {
    inner: Arc<ApiStateInner>,
}

impl ApiState {
    #[must_use]
    pub fn builder() -> ApiStateBuilder {
        ApiStateBuilder::default()
    }
}

impl Deref for ApiState {
    type Target = ApiStateInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FromRef<ApiState> for ApiConfig {
    fn from_ref(state: &ApiState) -> Self {
        state.inner.config.clone()
    }
}

impl FromRef<ApiState> for Engine {
    fn from_ref(state: &ApiState) -> Self {
        state.inner.engine.clone()
    }
}

#[derive(Debug, Default)]
pub struct ApiStateBuilder {
    config: Option<ApiConfig>,
    engine: Option<Engine>,
}

impl ApiStateBuilder {
    #[must_use]
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Finalizes the state.
    ///
    /// # Errors
    /// Returns [`ApiStateError::Validation`] if `config` or `engine` was
    /// never supplied.
    pub fn build(self) -> Result<ApiState, ApiStateError> {
        let config = self.config.ok_or_else(|| ApiStateError::Validation {
            message: "ApiConfig not provided".into(),
            context: None,
        })?;
        let engine = self.engine.ok_or_else(|| ApiStateError::Validation {
            message: "Engine not provided".into(),
            context: None,
        })?;

        Ok(ApiState { inner: Arc::new(ApiStateInner { config, engine }) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_without_engine_fails_validation() {
        let err = ApiState::builder().config(ApiConfig::default()).build().unwrap_err();
        assert!(matches!(err, ApiStateError::Validation { .. }));
    }
}
