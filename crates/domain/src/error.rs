/// Shared error type used across all gateway crates.
///
/// Variants map onto the JSON-RPC error codes the transport layer sends
/// back over the WebSocket (see [`Error::rpc_code`]); `Provider`/`Tool`
/// failures are reported a different way — as the model's own turn
/// content — and are never turned into an RPC error response.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("malformed request: {0}")]
    Parse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Standard JSON-RPC 2.0 error code for the transport's response frame.
    ///
    /// `Provider`/timeout/IO failures that occur mid-dispatch (session
    /// lookup, scheduler unavailable, etc.) surface as `Internal`; tool
    /// execution failures never reach this mapping because they are
    /// reported back to the model as the tool's own output, not as an
    /// RPC error.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Error::Parse(_) | Error::Json(_) => -32700,
            Error::InvalidRequest(_) => -32600,
            Error::UnknownMethod(_) => -32601,
            Error::InvalidParams(_) => -32602,
            Error::NotFound(_)
            | Error::Internal(_)
            | Error::Io(_)
            | Error::Http(_)
            | Error::Timeout(_)
            | Error::Provider { .. }
            | Error::Config(_)
            | Error::Auth(_)
            | Error::Other(_) => -32603,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_maps_to_standard_code() {
        assert_eq!(Error::Parse("bad json".into()).rpc_code(), -32700);
    }

    #[test]
    fn unknown_method_maps_to_standard_code() {
        assert_eq!(Error::UnknownMethod("frob".into()).rpc_code(), -32601);
    }

    #[test]
    fn invalid_params_maps_to_standard_code() {
        assert_eq!(Error::InvalidParams("bad uuid".into()).rpc_code(), -32602);
    }

    #[test]
    fn provider_failure_maps_to_internal_code() {
        let err = Error::Provider {
            provider: "anthropic".into(),
            message: "502".into(),
        };
        assert_eq!(err.rpc_code(), -32603);
    }
}
