use std::env;

use serde::Deserialize;

/// Default Bitrix24 OAuth token endpoint. Overridable via `BITRIX24_OAUTH_URL`
/// (mainly for tests against a mock server).
pub const DEFAULT_OAUTH_URL: &str = "https://oauth.bitrix.info/oauth/token/";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bitrix: BitrixConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL for the durable settings store. When unset the service
    /// falls back to the in-memory store, which does not survive restarts
    /// and is only suitable for local development.
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BitrixConfig {
    /// Application credentials issued by Bitrix24. Optional here because a
    /// locally installed portal may carry them in its settings record instead.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub oauth_url: String,
    /// Timeout applied to every outbound Bitrix24 request.
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok(),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            bitrix: BitrixConfig {
                client_id: env::var("BITRIX24_CLIENT_ID").ok(),
                client_secret: env::var("BITRIX24_CLIENT_SECRET").ok(),
                oauth_url: env::var("BITRIX24_OAUTH_URL")
                    .unwrap_or_else(|_| DEFAULT_OAUTH_URL.to_string()),
                request_timeout_seconds: env::var("REQUEST_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            bitrix: BitrixConfig {
                client_id: None,
                client_secret: None,
                oauth_url: DEFAULT_OAUTH_URL.to_string(),
                request_timeout_seconds: 30,
            },
        }
    }
}
