//! Configuration loading: `config.json` on disk, environment overrides,
//! and the environment-only secrets (§6).
//!
//! API keys for providers and the gateway's own auth token are **only**
//! ever read from the environment — they never appear in, or round-trip
//! through, `config.json`.

use std::path::Path;

use gw_domain::config::Config;
use gw_domain::error::{Error, Result};

pub const GATEWAY_AUTH_TOKEN_ENV: &str = "GATEWAY_AUTH_TOKEN";

/// Load `config.json` from the state directory, falling back to
/// `Config::default()` when the file doesn't exist. A malformed file is
/// a hard error — unlike session/schedule storage, a broken config file
/// should stop startup rather than silently fall back.
pub fn load_config(state_path: &Path) -> Result<Config> {
    let path = state_path.join("config.json");
    let mut config = match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))?,
        Err(_) => Config::default(),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// `gateway.port`/`gateway.host` may be overridden by environment
/// variables (§6's configuration surface table).
fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = std::env::var("GATEWAY_HOST") {
        if !host.is_empty() {
            config.gateway.host = host;
        }
    }
    if let Ok(port) = std::env::var("GATEWAY_PORT") {
        if let Ok(port) = port.parse() {
            config.gateway.port = port;
        }
    }
}

/// The gateway's own bearer token, read only from the environment. A
/// missing token means the loopback listener cannot authenticate
/// anyone — the caller should refuse to start in that case.
pub fn load_auth_token() -> Option<String> {
    std::env::var(GATEWAY_AUTH_TOKEN_ENV).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = load_config(tmp.path()).unwrap();
        assert_eq!(cfg.gateway.port, 18789);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.json"), "{ not json").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn env_overrides_host_and_port() {
        std::env::set_var("GATEWAY_HOST", "0.0.0.0");
        std::env::set_var("GATEWAY_PORT", "9999");
        let tmp = tempfile::tempdir().unwrap();
        let cfg = load_config(tmp.path()).unwrap();
        assert_eq!(cfg.gateway.host, "0.0.0.0");
        assert_eq!(cfg.gateway.port, 9999);
        std::env::remove_var("GATEWAY_HOST");
        std::env::remove_var("GATEWAY_PORT");
    }

    #[test]
    fn valid_file_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.gateway.port = 4000;
        std::fs::write(
            tmp.path().join("config.json"),
            serde_json::to_string(&cfg).unwrap(),
        )
        .unwrap();
        let loaded = load_config(tmp.path()).unwrap();
        assert_eq!(loaded.gateway.port, 4000);
    }
}
