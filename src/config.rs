//! Runtime configuration
//!
//! Read from the environment (a `.env` file is honored via dotenv in
//! `main`), matching how the hosted platform's credentials are supplied
//! in deployment.

use thiserror::Error;

/// Default listen address
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to listen on (`PAIRCHAT_ADDR`, default 127.0.0.1:8080)
    pub addr: String,
    /// Base URL of the hosted platform (`BACKEND_URL`)
    pub backend_url: String,
    /// API key for the hosted platform (`BACKEND_API_KEY`)
    pub backend_api_key: String,
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            addr: std::env::var("PAIRCHAT_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            backend_url: std::env::var("BACKEND_URL")
                .map_err(|_| ConfigError::MissingVar("BACKEND_URL"))?,
            backend_api_key: std::env::var("BACKEND_API_KEY")
                .map_err(|_| ConfigError::MissingVar("BACKEND_API_KEY"))?,
        })
    }
}
