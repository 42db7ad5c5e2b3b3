use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gateway transport
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Loopback bind address for the HTTP + WebSocket listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
        }
    }
}

fn d_port() -> u16 {
    18789
}
fn d_host() -> String {
    "127.0.0.1".into()
}
