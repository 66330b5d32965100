use std::env;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default origin of the sandboxed bridge frame
pub const DEFAULT_BRIDGE_ORIGIN: &str = "chrome-untrusted://trezor-bridge";
/// Default origin of the privileged wallet page
pub const DEFAULT_HOST_ORIGIN: &str = "chrome://wallet";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid bridge configuration: {0}")]
    InvalidValue(String),
    #[error("Invalid origin: {0}")]
    InvalidOrigin(#[from] url::ParseError),
}

/// Configuration for the bridge transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Origin every bridge response must come from
    pub bridge_origin: String,
    /// Origin of the host page; sent as `owner` so the bridge can verify it
    pub host_origin: String,
    /// Deadline for a single request/response round trip
    pub request_timeout_ms: u64,
    /// Deadline for creating and loading the bridge frame
    pub frame_load_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_origin: DEFAULT_BRIDGE_ORIGIN.to_string(),
            host_origin: DEFAULT_HOST_ORIGIN.to_string(),
            // Device prompts wait on a human, so the request deadline is generous
            request_timeout_ms: 120_000,
            frame_load_timeout_ms: 10_000,
        }
    }
}

impl BridgeConfig {
    /// Creates a BridgeConfig from environment variables with default fallbacks
    ///
    /// A `.env` file is honoured if present.
    ///
    /// Environment variables:
    /// - `HW_BRIDGE_ORIGIN`: Origin of the bridge frame (default: `chrome-untrusted://trezor-bridge`)
    /// - `HW_HOST_ORIGIN`: Origin of the host page (default: `chrome://wallet`)
    /// - `HW_BRIDGE_REQUEST_TIMEOUT_MS`: Per-request deadline (default: 120000)
    /// - `HW_BRIDGE_FRAME_TIMEOUT_MS`: Frame load deadline (default: 10000)
    ///
    /// # Errors
    ///
    /// Returns an error if any environment variable contains an invalid value
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let bridge_origin =
            env::var("HW_BRIDGE_ORIGIN").unwrap_or(defaults.bridge_origin);
        let host_origin = env::var("HW_HOST_ORIGIN").unwrap_or(defaults.host_origin);

        let request_timeout_ms = match env::var("HW_BRIDGE_REQUEST_TIMEOUT_MS") {
            Ok(val) => val.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid HW_BRIDGE_REQUEST_TIMEOUT_MS: {}", e))
            })?,
            Err(_) => defaults.request_timeout_ms,
        };

        let frame_load_timeout_ms = match env::var("HW_BRIDGE_FRAME_TIMEOUT_MS") {
            Ok(val) => val.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue(format!("Invalid HW_BRIDGE_FRAME_TIMEOUT_MS: {}", e))
            })?,
            Err(_) => defaults.frame_load_timeout_ms,
        };

        let config = Self {
            bridge_origin,
            host_origin,
            request_timeout_ms,
            frame_load_timeout_ms,
        };
        config.validate()?;
        Ok(config)
    }

    /// Short deadlines for tests
    pub fn for_tests() -> Self {
        Self {
            request_timeout_ms: 500,
            frame_load_timeout_ms: 200,
            ..Self::default()
        }
    }

    /// Checks origins parse as URLs and timeouts are non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.bridge_origin)?;
        Url::parse(&self.host_origin)?;

        if self.bridge_origin == self.host_origin {
            return Err(ConfigError::InvalidValue(
                "bridge_origin must differ from host_origin".to_string(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.frame_load_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "frame_load_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_bridge_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.bridge_origin = origin.into();
        self
    }

    pub fn with_host_origin<S: Into<String>>(mut self, origin: S) -> Self {
        self.host_origin = origin.into();
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_frame_load_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.frame_load_timeout_ms = timeout_ms;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn frame_load_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_load_timeout_ms)
    }
}
