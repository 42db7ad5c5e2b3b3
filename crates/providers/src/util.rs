//! Shared utility functions for provider adapters.

use gw_domain::config::AuthConfig;
use gw_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve a provider's API key from its configured environment variable.
///
/// Keys are only ever read from the environment — never from the config
/// file itself, and never from an OS keychain.
pub(crate) fn resolve_api_key(auth: &AuthConfig, provider_id: &str) -> Result<String> {
    let var = auth
        .env
        .as_deref()
        .ok_or_else(|| Error::Config(format!("provider '{provider_id}' has no auth.env set")))?;

    std::env::var(var).map_err(|_| {
        Error::Auth(format!(
            "environment variable '{var}' is not set (required by provider '{provider_id}')"
        ))
    })
}
