//! Runtime configuration, read from the environment (and `.env` via dotenvy).

use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://bugs.db";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_GROQ_MODEL: &str = "mixtral-8x7b-32768";
pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Connection settings for the hosted chat-completions model.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub require_api_key: bool,
    /// `None` when no API credential is configured; classification then runs on keywords only.
    pub llm: Option<LlmConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let host = get("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "PORT",
                expected: "port number",
                value: raw,
            })?,
            None => 8080,
        };
        let cors_origins = parse_origins(
            &get("CORS_ORIGINS").unwrap_or_else(|| "http://localhost:3000".to_string()),
        );
        let require_api_key = match get("REQUIRE_API_KEY") {
            Some(raw) => parse_bool("REQUIRE_API_KEY", &raw)?,
            None => false,
        };

        let llm = match get("GROQ_API_KEY").filter(|k| !k.trim().is_empty()) {
            Some(api_key) => {
                let timeout = match get("LLM_TIMEOUT_SECS") {
                    Some(raw) => match raw.trim().parse::<u64>() {
                        Ok(secs) if secs > 0 => Duration::from_secs(secs),
                        _ => {
                            return Err(ConfigError::Invalid {
                                var: "LLM_TIMEOUT_SECS",
                                expected: "positive number of seconds",
                                value: raw,
                            });
                        }
                    },
                    None => DEFAULT_LLM_TIMEOUT,
                };
                Some(LlmConfig {
                    api_key: api_key.trim().to_string(),
                    base_url: get("GROQ_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string())
                        .trim_end_matches('/')
                        .to_string(),
                    model: get("GROQ_MODEL").unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
                    timeout,
                })
            }
            None => None,
        };

        Ok(Self {
            database_url,
            host,
            port,
            cors_origins,
            require_api_key,
            llm,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "boolean",
            value: raw.to_string(),
        }),
    }
}
