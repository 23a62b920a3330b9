//! Environment-sourced configuration, validated once at startup.
//!
//! Every key in spec §6's configuration table is read here via
//! [`Settings::from_env`]. A violation produces a descriptive
//! [`crate::error::Error::Config`] so the binary can fail fast rather than
//! start in a half-valid state.

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "openai" => Ok(LlmProvider::OpenAi),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(Error::config(format!(
                "invalid llmProvider '{other}': expected 'openai' or 'anthropic'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(Error::config(format!("invalid logLevel '{other}'"))),
        }
    }

    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Fully validated runtime configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub port: u16,
    pub host: String,

    pub llm_provider: LlmProvider,
    pub llm_api_key: String,
    pub llm_model: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f32,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub llm_retry_delay: Duration,
    pub max_system_prompt_length: usize,

    pub ping_interval: Duration,
    pub max_connections: usize,
    pub message_queue_size: usize,

    pub max_history_length: usize,
    pub session_timeout: Duration,
    pub cleanup_interval: Duration,

    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub cors_origin: String,

    pub tool_timeout: Duration,
    pub request_timeout: Duration,
    pub max_rounds: u32,
    pub circuit_failure_threshold: u32,
    pub circuit_reset_timeout: Duration,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| Error::config(format!("invalid value for {key}: '{v}'"))),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Read and validate all configuration from the environment. Fails fast
    /// with a descriptive [`Error::Config`] on the first violation found,
    /// matching the "Violations" list in spec §6.
    pub fn from_env() -> Result<Self> {
        let port: u16 = match env::var("PORT") {
            Ok(v) => {
                let parsed: i64 = v
                    .parse()
                    .map_err(|_| Error::config(format!("invalid port '{v}'")))?;
                if parsed <= 0 || parsed > 65_535 {
                    return Err(Error::config(format!(
                        "invalid port {parsed}: must be in 1..=65535"
                    )));
                }
                parsed as u16
            }
            Err(_) => 8080,
        };

        let llm_provider = LlmProvider::parse(&env_or("LLM_PROVIDER", "openai"))?;
        let llm_api_key = env::var("LLM_API_KEY").unwrap_or_default();
        if llm_api_key.trim().is_empty() {
            return Err(Error::config(
                "llmApiKey is required for the selected provider",
            ));
        }

        let llm_max_tokens: u32 = env_parse("LLM_MAX_TOKENS", 1024)?;
        if !(100..=4096).contains(&llm_max_tokens) {
            return Err(Error::config(format!(
                "llmMaxTokens {llm_max_tokens} out of range 100..=4096"
            )));
        }

        let llm_temperature: f32 = env_parse("LLM_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&llm_temperature) {
            return Err(Error::config(format!(
                "llmTemperature {llm_temperature} out of range 0..=2"
            )));
        }

        let max_connections: usize = env_parse("MAX_CONNECTIONS", 1000)?;
        if max_connections == 0 {
            return Err(Error::config("maxConnections must be > 0"));
        }

        let log_level = LogLevel::parse(&env_or("LOG_LEVEL", "info"))?;
        let log_format = match env_or("LOG_FORMAT", "text").as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(Error::config(format!(
                    "invalid logFormat '{other}': expected 'json' or 'text'"
                )));
            }
        };

        Ok(Settings {
            port,
            host: env_or("HOST", "0.0.0.0"),

            llm_provider,
            llm_api_key,
            llm_model: env_or("LLM_MODEL", "gpt-4o-mini"),
            llm_max_tokens,
            llm_temperature,
            llm_timeout: Duration::from_millis(env_parse("LLM_TIMEOUT_MS", 30_000)?),
            llm_max_retries: env_parse("LLM_MAX_RETRIES", 3)?,
            llm_retry_delay: Duration::from_millis(env_parse("LLM_RETRY_DELAY_MS", 1_000)?),
            max_system_prompt_length: env_parse("MAX_SYSTEM_PROMPT_LENGTH", 16_000)?,

            ping_interval: Duration::from_millis(env_parse("PING_INTERVAL_MS", 30_000)?),
            max_connections,
            message_queue_size: env_parse("MESSAGE_QUEUE_SIZE", 1_000)?,

            max_history_length: env_parse("MAX_HISTORY_LENGTH", 100)?,
            session_timeout: Duration::from_millis(env_parse("SESSION_TIMEOUT_MS", 30 * 60_000)?),
            cleanup_interval: Duration::from_millis(env_parse("CLEANUP_INTERVAL_MS", 5 * 60_000)?),

            log_level,
            log_format,
            cors_origin: env_or("CORS_ORIGIN", "*"),

            tool_timeout: Duration::from_millis(env_parse("TOOL_TIMEOUT_MS", 10_000)?),
            request_timeout: Duration::from_millis(env_parse("REQUEST_TIMEOUT_MS", 60_000)?),
            max_rounds: env_parse("MAX_ROUNDS", 5)?,
            circuit_failure_threshold: env_parse("CIRCUIT_FAILURE_THRESHOLD", 5)?,
            circuit_reset_timeout: Duration::from_millis(env_parse(
                "CIRCUIT_RESET_TIMEOUT_MS",
                30_000,
            )?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "PORT",
            "LLM_PROVIDER",
            "LLM_API_KEY",
            "LLM_MAX_TOKENS",
            "LLM_TEMPERATURE",
            "MAX_CONNECTIONS",
            "LOG_LEVEL",
            "LOG_FORMAT",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    #[test]
    fn test_missing_api_key_fails() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_valid_config_parses() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("PORT", "8080") };
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.llm_provider, LlmProvider::OpenAi);
        clear_env();
    }

    #[test]
    fn test_port_zero_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("PORT", "0") };
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }

    #[test]
    fn test_port_too_large_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("PORT", "70000") };
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }

    #[test]
    fn test_port_boundary_65535_accepted() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("PORT", "65535") };
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.port, 65535);
        clear_env();
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("LLM_PROVIDER", "cohere") };
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("LLM_TEMPERATURE", "3.5") };
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }

    #[test]
    fn test_max_connections_zero_rejected() {
        let _g = ENV_LOCK.lock().unwrap();
        clear_env();
        unsafe { env::set_var("LLM_API_KEY", "sk-test") };
        unsafe { env::set_var("MAX_CONNECTIONS", "0") };
        let err = Settings::from_env().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        clear_env();
    }
}
