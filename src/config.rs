//! Client configuration, read from the environment.
//!
//! - `ANTHROPIC_API_KEY` - Required.
//! - `ANTHROPIC_MODEL` - Optional. Defaults to `claude-sonnet-4-20250514`.
//! - `ANTHROPIC_BASE_URL` - Optional. Defaults to `https://api.anthropic.com`.
//! - `ANTHROPIC_MAX_TOKENS` - Optional. Defaults to `4096`.

use std::env;

use thiserror::Error;

pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
pub const MODEL_VAR: &str = "ANTHROPIC_MODEL";
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";
pub const MAX_TOKENS_VAR: &str = "ANTHROPIC_MAX_TOKENS";

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
}

impl ClientConfig {
    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup, so tests
    /// don't have to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(API_KEY_VAR.to_string()))?;

        let model = lookup(MODEL_VAR)
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = lookup(BASE_URL_VAR)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let max_tokens = match lookup(MAX_TOKENS_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidValue(MAX_TOKENS_VAR.to_string(), raw.clone()))?,
            None => DEFAULT_MAX_TOKENS,
        };

        Ok(Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens,
        })
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }
}
