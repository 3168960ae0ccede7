//! Configuration for Sprout.
//!
//! Everything is read from environment variables, after loading a `.env`
//! file when one is present.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::garden::AttritionStrategy;

/// Main configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub classifier: ClassifierConfig,
    pub engine: EngineConfig,
    pub gateway: GatewayConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            classifier: ClassifierConfig::from_env()?,
            engine: EngineConfig::from_env()?,
            gateway: GatewayConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }
}

/// libSQL database configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Local database file (the replica file when syncing with a remote).
    pub path: PathBuf,
    /// Remote libSQL/Turso URL; enables embedded-replica mode.
    pub remote_url: Option<String>,
    pub auth_token: Option<SecretString>,
}

impl DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let path = optional_env("LIBSQL_PATH")?
            .map(PathBuf::from)
            .unwrap_or_else(crate::bootstrap::default_db_path);

        let remote_url = optional_env("LIBSQL_URL")?;
        let auth_token = optional_env("LIBSQL_AUTH_TOKEN")?.map(SecretString::from);

        if remote_url.is_some() && auth_token.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "LIBSQL_AUTH_TOKEN".to_string(),
                hint: "A remote replica needs an auth token; set LIBSQL_AUTH_TOKEN or unset LIBSQL_URL"
                    .to_string(),
            });
        }

        Ok(Self {
            path,
            remote_url,
            auth_token,
        })
    }
}

/// Default LLM endpoint: Gemini's OpenAI-compatible surface.
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";

/// OpenAI-compatible LLM endpoint configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: f32,
}

impl LlmConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url =
            optional_env("LLM_BASE_URL")?.unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "LLM_BASE_URL".to_string(),
                message: "must start with http:// or https://".to_string(),
            });
        }

        let temperature: f32 = parse_optional_env("LLM_TEMPERATURE", 0.0)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "LLM_TEMPERATURE".to_string(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        Ok(Self {
            base_url,
            api_key: optional_env("LLM_API_KEY")?.map(SecretString::from),
            model: optional_env("LLM_MODEL")?.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            temperature,
        })
    }
}

/// Timeout and retry policy around classifier calls.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Bound on a single classifier attempt.
    pub timeout: Duration,
    /// Retries after the first attempt, for transient failures only.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Whether results recovered from free text may drive a cycle.
    pub accept_recovered: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            accept_recovered: true,
        }
    }
}

impl ClassifierConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timeout_secs: u64 =
            parse_optional_env("CLASSIFIER_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CLASSIFIER_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            max_retries: parse_optional_env("CLASSIFIER_MAX_RETRIES", defaults.max_retries)?,
            accept_recovered: parse_optional_env(
                "CLASSIFIER_ACCEPT_RECOVERED",
                defaults.accept_recovered,
            )?,
            ..defaults
        })
    }
}

/// Garden engine rule selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub attrition: AttritionStrategy,
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let window: usize = parse_optional_env("GARDEN_ATTRITION_WINDOW", 0)?;
        let attrition = match window {
            0 => AttritionStrategy::Disabled,
            2 | 3 => AttritionStrategy::ThresholdAbsence { window },
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "GARDEN_ATTRITION_WINDOW".to_string(),
                    message: format!("{other} is not supported; use 0 (disabled), 2, or 3"),
                });
            }
        };
        Ok(Self { attrition })
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl GatewayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: optional_env("GATEWAY_HOST")?.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_optional_env("GATEWAY_PORT", 3000)?,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "invalid log format '{}', expected 'pretty' or 'json'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            format: parse_optional_env("LOG_FORMAT", LogFormat::default())?,
        })
    }
}

// Helper functions

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::ParseError(format!(
            "failed to read {key}: {e}"
        ))),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)?
        .map(|s| {
            s.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{e}"),
            })
        })
        .transpose()
        .map(|opt| opt.unwrap_or(default))
}
