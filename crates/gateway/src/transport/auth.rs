//! Pre-handshake authentication: the first WebSocket frame a client
//! sends must be an auth frame carrying the gateway's bearer token,
//! compared in constant time so response latency can't leak how many
//! leading bytes matched (§4.1/§6).

use subtle::ConstantTimeEq;

/// `expected` is the token the gateway was started with; `provided` is
/// whatever the client's first frame claims. Length is not secret (a
/// wrong-length token is trivially not the token), so it's checked
/// up front — only the byte comparison itself needs to run in constant
/// time.
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    if expected.len() != provided.len() {
        return false;
    }
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// The gateway only ever accepts loopback connections (§4.1); an
/// `Origin` header pointing somewhere else is rejected even before the
/// auth frame is read, as a second layer against a browser tab on the
/// same machine silently opening a socket to it.
pub fn origin_allowed(origin: Option<&str>) -> bool {
    match origin {
        None => true,
        Some(origin) => {
            origin.starts_with("http://localhost")
                || origin.starts_with("http://127.0.0.1")
                || origin.starts_with("https://localhost")
                || origin.starts_with("https://127.0.0.1")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_tokens_compare_equal() {
        assert!(tokens_match("secret-token", "secret-token"));
    }

    #[test]
    fn mismatched_tokens_compare_unequal() {
        assert!(!tokens_match("secret-token", "wrong-token"));
    }

    #[test]
    fn different_length_tokens_compare_unequal() {
        assert!(!tokens_match("short", "a-much-longer-token"));
    }

    #[test]
    fn no_origin_header_is_allowed() {
        assert!(origin_allowed(None));
    }

    #[test]
    fn localhost_origin_is_allowed() {
        assert!(origin_allowed(Some("http://localhost:3000")));
    }

    #[test]
    fn remote_origin_is_rejected() {
        assert!(!origin_allowed(Some("https://evil.example.com")));
    }
}
