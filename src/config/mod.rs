use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub session: SessionConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Prefix for every REST path, e.g. `http://127.0.0.1:8080/api`.
    pub base_url: String,
    pub timeout_secs: u64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Storage key holding the access token.
    pub access_key: String,
    /// Storage key holding the refresh token.
    pub refresh_key: String,
    /// When false, a refresh call that never reached the server (network
    /// error, 5xx) leaves the session in place instead of logging out.
    pub logout_on_transient_refresh_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub url: String,
    pub reconnect_delay_secs: u64,
    pub max_reconnect_attempts: u32,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RealtimeConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_key: "access_token".to_string(),
            refresh_key: "refresh_token".to_string(),
            logout_on_transient_refresh_failure: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    /// Development defaults pointed at an arbitrary base URL. Used by
    /// embedders and tests that run their own server.
    pub fn for_base_url(base_url: impl Into<String>) -> Self {
        let mut config = Self::development();
        config.api.base_url = base_url.into();
        config
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = env::var("API_TIMEOUT_SECS") {
            self.api.timeout_secs = v.parse().unwrap_or(self.api.timeout_secs);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_ACCESS_KEY") {
            self.session.access_key = v;
        }
        if let Ok(v) = env::var("SESSION_REFRESH_KEY") {
            self.session.refresh_key = v;
        }
        if let Ok(v) = env::var("SESSION_LOGOUT_ON_TRANSIENT_REFRESH_FAILURE") {
            self.session.logout_on_transient_refresh_failure =
                v.parse().unwrap_or(self.session.logout_on_transient_refresh_failure);
        }

        // Realtime overrides
        if let Ok(v) = env::var("REALTIME_URL") {
            self.realtime.url = v;
        }
        if let Ok(v) = env::var("REALTIME_RECONNECT_DELAY_SECS") {
            self.realtime.reconnect_delay_secs = v.parse().unwrap_or(self.realtime.reconnect_delay_secs);
        }
        if let Ok(v) = env::var("REALTIME_MAX_RECONNECT_ATTEMPTS") {
            self.realtime.max_reconnect_attempts = v.parse().unwrap_or(self.realtime.max_reconnect_attempts);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://127.0.0.1:8080/api".to_string(),
                timeout_secs: 10,
                enable_request_logging: true,
            },
            session: SessionConfig::default(),
            realtime: RealtimeConfig {
                url: "http://127.0.0.1:8080/ws".to_string(),
                reconnect_delay_secs: 30,
                max_reconnect_attempts: 3,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging.example.com/api".to_string(),
                timeout_secs: 10,
                enable_request_logging: true,
            },
            session: SessionConfig::default(),
            realtime: RealtimeConfig {
                url: "https://staging.example.com/ws".to_string(),
                reconnect_delay_secs: 30,
                max_reconnect_attempts: 3,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://console.example.com/api".to_string(),
                timeout_secs: 10,
                enable_request_logging: false,
            },
            session: SessionConfig::default(),
            realtime: RealtimeConfig {
                url: "https://console.example.com/ws".to_string(),
                reconnect_delay_secs: 30,
                max_reconnect_attempts: 5,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<ClientConfig> = Lazy::new(ClientConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static ClientConfig {
    &CONFIG
}
