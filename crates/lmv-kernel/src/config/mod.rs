use config::{Config, Environment};
use lmv_domain::ApiConfig;
use std::borrow::Cow;
use tracing::info;

/// Custom error type for config loading.
#[lmv_derive::lmv_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
    #[error("Missing required configuration{}: {message}", format_context(.context))]
    Missing { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Loads [`ApiConfig`] from the process environment.
///
/// All configuration is `LMV_`-prefixed (`LMV_PASSPHRASE`, `LMV_WRITE_TOKEN`,
/// `LMV_PORT`, `LMV_DATA_DIR`). Bare `PORT`/`DATA_DIR` are honored as lower-
/// priority fallbacks so the process behaves inside typical container
/// platforms that inject an unprefixed `PORT`. There is no config file: the
/// whole contract is environment variables, read once at startup.
///
/// # Errors
/// Returns [`ConfigError::Config`] if the environment cannot be parsed into
/// [`ApiConfig`], or [`ConfigError::Missing`] if `LMV_PASSPHRASE` is absent.
pub fn load_config() -> Result<ApiConfig, ConfigError> {
    info!("Loading configuration from the environment");
    build_config(None, None)
}

/// Builds [`ApiConfig`] from an explicit environment snapshot instead of the
/// real process environment, so tests never have to mutate global state.
/// `load_config` calls this with `None` for both, which falls back to
/// `std::env::var`.
fn build_config(
    bare_env: Option<&std::collections::HashMap<String, String>>,
    prefixed_env: Option<std::collections::HashMap<String, String>>,
) -> Result<ApiConfig, ConfigError> {
    let mut builder = Config::builder();

    let lookup_bare = |key: &str| match bare_env {
        Some(map) => map.get(key).cloned(),
        None => std::env::var(key).ok(),
    };

    if let Some(port) = lookup_bare("PORT") {
        builder = builder.set_default("port", port).context("invalid PORT fallback")?;
    }
    if let Some(dir) = lookup_bare("DATA_DIR") {
        builder = builder.set_default("data_dir", dir).context("invalid DATA_DIR fallback")?;
    }

    // `__` (not the prefix separator `_`) marks nesting, so field names that
    // already contain an underscore (`data_dir`, `write_token`) round-trip
    // without being split into a nested table.
    builder = builder.add_source(
        Environment::with_prefix("LMV")
            .prefix_separator("_")
            .separator("__")
            .convert_case(config::Case::Snake)
            .source(prefixed_env),
    );

    let config = builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<ApiConfig>()
        .context("Failed to deserialize config")?;

    if config.passphrase.is_none() {
        return Err(ConfigError::Missing {
            message: "LMV_PASSPHRASE is required".into(),
            context: None,
        });
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn fails_fast_without_passphrase() {
        let env = HashMap::new();
        let err = build_config(None, Some(env)).expect_err("expected missing-passphrase error");
        assert!(matches!(err, ConfigError::Missing { .. }));
    }

    #[test]
    fn reads_passphrase_and_port_from_environment() {
        let env = HashMap::from([
            ("LMV_PASSPHRASE".to_owned(), "pass-a".to_owned()),
            ("LMV_PORT".to_owned(), "9999".to_owned()),
            ("LMV_WRITE_TOKEN".to_owned(), "secret".to_owned()),
        ]);

        let cfg = build_config(None, Some(env)).expect("config should load");
        assert_eq!(cfg.passphrase.as_deref(), Some("pass-a"));
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.write_token.as_deref(), Some("secret"));
    }

    #[test]
    fn bare_port_fallback_applies_when_unprefixed() {
        let bare = HashMap::from([("PORT".to_owned(), "7000".to_owned())]);
        let prefixed = HashMap::from([("LMV_PASSPHRASE".to_owned(), "pass-a".to_owned())]);

        let cfg = build_config(Some(&bare), Some(prefixed)).expect("config should load");
        assert_eq!(cfg.port, 7000);
    }
}
