//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;

use confab_proto::MAX_FRAME_LEN;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the TCP listener binds to.
    /// Env: `LISTEN_ADDR`
    /// Default: `0.0.0.0:7700`
    pub listen_addr: SocketAddr,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Confab Node"`
    pub instance_name: String,

    /// Maximum accepted frame body in bytes.
    /// Env: `MAX_FRAME_LEN`
    /// Default: 1 MiB
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 7700).into(),
            instance_name: "Confab Node".to_string(),
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults. Invalid values are logged and ignored, never fatal.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("LISTEN_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.listen_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid LISTEN_ADDR, using default");
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            if !name.is_empty() {
                config.instance_name = name;
            }
        }

        if let Ok(val) = std::env::var("MAX_FRAME_LEN") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_frame_len = n,
                _ => {
                    tracing::warn!(value = %val, "Invalid MAX_FRAME_LEN, using default");
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
