use reqwest::Url;
use serde::Deserialize;
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

const DEFAULT_MODEL_NAME: &str = "gpt-4";
const DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";
const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_TOKEN_MAX: usize = 4000;
const DEFAULT_MAP_CONCURRENCY: usize = 4;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Errors encountered while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// A hosted endpoint was selected without a credential.
    #[error("API key required for hosted endpoint {base_url}; set API_KEY")]
    MissingCredential {
        /// Endpoint that requires authentication.
        base_url: String,
    },
    /// The endpoint base URL could not be parsed.
    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),
    /// Temperature fell outside the accepted `0.0..=1.0` range.
    #[error("Temperature must be between 0.0 and 1.0, got {0}")]
    InvalidTemperature(f32),
    /// Model identifier was blank.
    #[error("Model name must not be empty")]
    MissingModel,
}

/// Runtime configuration for the Document Analyzer.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Default model identifier passed to the chat-completion API.
    pub model_name: String,
    /// Backend protocol spoken by the model endpoint.
    pub model_provider: ModelProvider,
    /// Optional credential; required for hosted endpoints.
    pub api_key: Option<String>,
    /// Base URL of the chat-completion endpoint.
    pub base_url: String,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Token budget for any single reduce-stage prompt.
    pub token_max: usize,
    /// Optional override for the automatic map chunk size.
    pub chunk_size: Option<usize>,
    /// Optional override for the summarize prompt budget.
    pub summary_token_max: Option<usize>,
    /// Maximum number of map calls in flight.
    pub map_concurrency: usize,
    /// Directory used to stage uploads; defaults to the system temp dir.
    pub upload_dir: Option<PathBuf>,
    /// Maximum accepted upload size for the HTTP surface.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported chat-completion backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// OpenAI-compatible `/chat/completions` endpoint (OpenAI, vLLM, Ollama's `/v1`, ...).
    OpenAI,
    /// Native Ollama `/api/generate` endpoint.
    Ollama,
}

impl ModelProvider {
    /// Lowercase label used in logs and responses.
    pub fn label(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.into(),
            model_provider: ModelProvider::OpenAI,
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            temperature: DEFAULT_TEMPERATURE,
            token_max: DEFAULT_TOKEN_MAX,
            chunk_size: None,
            summary_token_max: None,
            map_concurrency: DEFAULT_MAP_CONCURRENCY,
            upload_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            server_port: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let temperature = parse_optional::<f32>("TEMPERATURE")?.unwrap_or(defaults.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::InvalidTemperature(temperature));
        }

        Ok(Self {
            model_name: load_env_optional("MODEL_NAME").unwrap_or(defaults.model_name),
            model_provider: load_env_optional("MODEL_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("MODEL_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(defaults.model_provider),
            api_key: load_env_optional("API_KEY").or_else(|| load_env_optional("OPENAI_API_KEY")),
            base_url: load_env_optional("BASE_URL")
                .or_else(|| load_env_optional("OPENAI_URL"))
                .unwrap_or(defaults.base_url),
            temperature,
            token_max: parse_optional("TOKEN_MAX")?.unwrap_or(defaults.token_max),
            chunk_size: parse_optional("CHUNK_SIZE")?,
            summary_token_max: parse_optional("SUMMARY_TOKEN_MAX")?,
            map_concurrency: parse_optional::<usize>("MAP_CONCURRENCY")?
                .unwrap_or(defaults.map_concurrency)
                .max(1),
            upload_dir: load_env_optional("UPLOAD_DIR").map(PathBuf::from),
            max_upload_bytes: parse_optional("MAX_UPLOAD_BYTES")?
                .unwrap_or(defaults.max_upload_bytes),
            server_port: parse_optional("SERVER_PORT")?,
        })
    }

    /// Chain configuration built from the process defaults.
    pub fn chain_defaults(&self) -> ChainConfig {
        ChainConfig {
            provider: self.model_provider,
            model: self.model_name.clone(),
            temperature: self.temperature,
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// Per-request model configuration handed explicitly to every model call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Backend protocol for the endpoint.
    pub provider: ModelProvider,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature in `0.0..=1.0`.
    pub temperature: f32,
    /// Endpoint base URL.
    pub base_url: String,
    /// Optional bearer credential.
    pub api_key: Option<String>,
}

/// Request-level overrides applied on top of [`Config::chain_defaults`].
#[derive(Debug, Clone, Default)]
pub struct ChainOverrides {
    /// Override for the backend protocol.
    pub provider: Option<ModelProvider>,
    /// Override for the model identifier.
    pub model: Option<String>,
    /// Override for the temperature.
    pub temperature: Option<f32>,
    /// Override for the endpoint base URL.
    pub base_url: Option<String>,
    /// Override for the credential.
    pub api_key: Option<String>,
}

impl ChainConfig {
    /// Merge request overrides into the defaults and validate the result.
    pub fn resolve(defaults: &ChainConfig, overrides: ChainOverrides) -> Result<Self, ConfigError> {
        let config = Self {
            provider: overrides.provider.unwrap_or(defaults.provider),
            model: non_blank(overrides.model).unwrap_or_else(|| defaults.model.clone()),
            temperature: overrides.temperature.unwrap_or(defaults.temperature),
            base_url: non_blank(overrides.base_url).unwrap_or_else(|| defaults.base_url.clone()),
            api_key: non_blank(overrides.api_key).or_else(|| defaults.api_key.clone()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration before any network call is attempted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingModel);
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if self.is_hosted()? && self.api_key.is_none() {
            return Err(ConfigError::MissingCredential {
                base_url: self.base_url.clone(),
            });
        }
        Ok(())
    }

    /// Whether the endpoint lives outside the local machine.
    pub fn is_hosted(&self) -> Result<bool, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|_| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidBaseUrl(self.base_url.clone()))?;
        Ok(!is_local_host(host))
    }
}

fn is_local_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    match host.parse::<IpAddr>() {
        Ok(ip) => ip.is_loopback() || ip.is_unspecified(),
        Err(_) => false,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|input| input.trim().to_string())
        .filter(|input| !input.is_empty())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        model = %config.model_name,
        provider = config.model_provider.label(),
        base_url = %config.base_url,
        token_max = config.token_max,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_defaults() -> ChainConfig {
        Config::default().chain_defaults()
    }

    #[test]
    fn local_endpoint_does_not_require_credential() {
        let config = ChainConfig::resolve(&local_defaults(), ChainOverrides::default())
            .expect("local endpoint resolves");
        assert_eq!(config.model, "gpt-4");
        assert!(config.api_key.is_none());
        assert!(!config.is_hosted().unwrap());
    }

    #[test]
    fn hosted_endpoint_without_key_is_rejected() {
        let error = ChainConfig::resolve(
            &local_defaults(),
            ChainOverrides {
                base_url: Some("https://api.openai.com/v1".into()),
                ..ChainOverrides::default()
            },
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::MissingCredential { .. }));
    }

    #[test]
    fn hosted_endpoint_with_key_resolves() {
        let config = ChainConfig::resolve(
            &local_defaults(),
            ChainOverrides {
                base_url: Some("https://api.openai.com/v1".into()),
                api_key: Some("sk-test".into()),
                model: Some("gpt-4o-mini".into()),
                temperature: Some(0.7),
                provider: None,
            },
        )
        .expect("hosted endpoint with key");
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn blank_overrides_fall_back_to_defaults() {
        let config = ChainConfig::resolve(
            &local_defaults(),
            ChainOverrides {
                model: Some("   ".into()),
                api_key: Some(String::new()),
                ..ChainOverrides::default()
            },
        )
        .expect("blank overrides ignored");
        assert_eq!(config.model, "gpt-4");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let error = ChainConfig::resolve(
            &local_defaults(),
            ChainOverrides {
                temperature: Some(1.5),
                ..ChainOverrides::default()
            },
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::InvalidTemperature(value) if value == 1.5));
    }

    #[test]
    fn loopback_addresses_count_as_local() {
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("[::1]"));
        assert!(is_local_host("0.0.0.0"));
        assert!(is_local_host("LOCALHOST"));
        assert!(!is_local_host("api.mistral.ai"));
    }

    #[test]
    fn unparseable_base_url_is_rejected() {
        let mut config = local_defaults();
        config.base_url = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("Ollama".parse::<ModelProvider>(), Ok(ModelProvider::Ollama));
        assert_eq!("openai".parse::<ModelProvider>(), Ok(ModelProvider::OpenAI));
        assert!("mistral".parse::<ModelProvider>().is_err());
    }
}
