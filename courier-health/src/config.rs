//! Health server configuration

use serde::Deserialize;

/// Configuration for the health and control endpoints
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthConfig {
    /// When disabled, the health server is not started
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address to bind, e.g. `[::]:5000` or `127.0.0.1:5000`
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:5000".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
        }
    }
}
