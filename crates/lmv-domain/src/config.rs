use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Process-wide configuration, read once at startup (`LMV_*` environment
/// variables) into an immutable value. The engine never re-reads the
/// environment after boot.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfigInner {
    pub server_addr: IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub passphrase: Option<String>,
    pub write_token: Option<String>,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(flatten, default)]
    inner: Arc<ApiConfigInner>,
}

impl Deref for ApiConfig {
    type Target = ApiConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for ApiConfig {
    fn deref_mut(&mut self) -> &mut ApiConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

impl Default for ApiConfigInner {
    fn default() -> Self {
        Self {
            server_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8787,
            data_dir: PathBuf::from("./data"),
            passphrase: None,
            write_token: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_fallbacks() {
        let cfg = ApiConfig::default();
        assert_eq!(cfg.port, 8787);
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert!(cfg.passphrase.is_none());
        assert!(cfg.write_token.is_none());
    }

    #[test]
    fn api_config_deserializes_from_flat_json() {
        let raw = serde_json::json!({
            "port": 9000,
            "data_dir": "/tmp/lmv",
            "passphrase": "correct-horse",
            "write_token": "secret-token",
        });

        let cfg: ApiConfig = serde_json::from_value(raw).expect("config deserialize");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/lmv"));
        assert_eq!(cfg.passphrase.as_deref(), Some("correct-horse"));
        assert_eq!(cfg.write_token.as_deref(), Some("secret-token"));
    }

    #[test]
    fn clone_is_cheap_and_shares_state_until_mutated() {
        let mut a = ApiConfig::default();
        let b = a.clone();
        a.port = 1234;
        assert_eq!(b.port, 8787);
        assert_eq!(a.port, 1234);
    }
}
