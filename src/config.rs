//! Configuration for the resilience layer.
//!
//! Settings are loaded from a TOML file with environment variable overrides
//! and converted into validated runtime components.
//!
//! ```toml
//! [retry]
//! max_retries = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 10000
//! backoff_multiplier = 2.0
//! retryable_categories = ["rate_limit", "service_error", "network"]
//!
//! [rate_limit]
//! requests_per_minute = 60
//!
//! [registry]
//! default_region = "us-east-1"
//! health_check_interval_secs = 300
//! ```

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::error::{ErrorCategory, ResilienceError};
use crate::ratelimit::RateLimiter;
use crate::registry::{ClientRegistry, RemoteClient, DEFAULT_REGION};
use crate::retry::{RetryPolicy, DEFAULT_RETRYABLE_CATEGORIES};

/// Prefix for environment overrides, e.g. `ECHOTUNE__RETRY__MAX_RETRIES=5`.
pub const ENV_PREFIX: &str = "ECHOTUNE";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// The configuration file path is invalid.
    #[error("invalid configuration path: {0}")]
    InvalidPath(String),

    /// The values parsed but do not form a valid component.
    #[error(transparent)]
    Invalid(#[from] ResilienceError),
}

/// Retry settings as they appear in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub retryable_categories: Vec<ErrorCategory>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            retryable_categories: DEFAULT_RETRYABLE_CATEGORIES.to_vec(),
        }
    }
}

impl RetrySettings {
    /// Builds a validated retry policy.
    pub fn to_policy(&self) -> Result<RetryPolicy, ResilienceError> {
        let policy = RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
            self.backoff_multiplier,
        )
        .with_retryable_categories(self.retryable_categories.iter().copied());
        policy.validate()?;
        Ok(policy)
    }
}

/// Rate limiter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub requests_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
        }
    }
}

impl RateLimitSettings {
    /// Builds a limiter for one logical channel.
    pub fn build(&self) -> Result<RateLimiter, ResilienceError> {
        RateLimiter::new(self.requests_per_minute)
    }
}

/// Client registry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub default_region: String,
    pub health_check_interval_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            default_region: DEFAULT_REGION.to_string(),
            health_check_interval_secs: 300,
        }
    }
}

impl RegistrySettings {
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    /// Builds an empty registry with these settings.
    pub fn build<C: RemoteClient>(&self) -> ClientRegistry<C> {
        ClientRegistry::with_health_check_interval(self.health_check_interval())
            .with_default_region(self.default_region.clone())
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetrySettings,
    pub rate_limit: RateLimitSettings,
    pub registry: RegistrySettings,
}

impl ResilienceConfig {
    /// Load configuration from a TOML file, with `ECHOTUNE__` environment overrides.
    ///
    /// Environment variables use double underscores between sections and keys,
    /// e.g. `ECHOTUNE__RATE_LIMIT__REQUESTS_PER_MINUTE=30`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, the path is not valid
    /// UTF-8, or the contents cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(format!("{:?}", path)))?;

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path_str.to_string()));
        }

        let config = Config::builder()
            .add_source(File::new(path_str, FileFormat::Toml))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Parse configuration from a TOML string. No environment overrides apply.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Load from a file when given, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Checks every section converts into a valid component.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.retry.to_policy()?;
        self.rate_limit.build()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();
        let policy = config.retry.to_policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert_eq!(config.registry.default_region, "us-east-1");
        assert_eq!(
            config.registry.health_check_interval(),
            Duration::from_secs(300)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ResilienceConfig::from_toml_str(
            r#"
            [retry]
            max_retries = 5
            initial_delay_ms = 250
            max_delay_ms = 4000
            backoff_multiplier = 3.0
            retryable_categories = ["rate_limit", "network"]

            [rate_limit]
            requests_per_minute = 20

            [registry]
            default_region = "eu-west-1"
            health_check_interval_secs = 60
            "#,
        )
        .unwrap();

        let policy = config.retry.to_policy().unwrap();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_millis(4000));
        assert_eq!(policy.backoff_multiplier, 3.0);
        assert!(policy.is_retryable(ErrorCategory::Network));
        assert!(!policy.is_retryable(ErrorCategory::ServiceError));

        assert_eq!(config.rate_limit.build().unwrap().ceiling(), 20);
        assert_eq!(config.registry.default_region, "eu-west-1");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ResilienceConfig::from_toml_str(
            r#"
            [retry]
            max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.rate_limit, RateLimitSettings::default());
    }

    #[test]
    fn test_unknown_category_fails_to_parse() {
        let result = ResilienceConfig::from_toml_str(
            r#"
            [retry]
            retryable_categories = ["sometimes"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_invalid_values_rejected_on_validate() {
        let mut config = ResilienceConfig::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(ResilienceError::ZeroCeiling))
        ));

        let mut config = ResilienceConfig::default();
        config.retry.max_delay_ms = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(ResilienceError::InvalidPolicy(_)))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ResilienceConfig::load("/nonexistent/echotune.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "[rate_limit]\nrequests_per_minute = 7").unwrap();

        let config = ResilienceConfig::load(file.path()).unwrap();
        assert_eq!(config.rate_limit.requests_per_minute, 7);
        assert_eq!(config.retry, RetrySettings::default());
    }

    struct StubClient(String);

    #[async_trait::async_trait]
    impl RemoteClient for StubClient {
        async fn ping(&self) -> Result<(), crate::error::RemoteFailure> {
            Ok(())
        }
    }

    #[test]
    fn test_registry_settings_build() {
        let config = ResilienceConfig::from_toml_str(
            r#"
            [registry]
            default_region = "eu-west-1"
            health_check_interval_secs = 60
            "#,
        )
        .unwrap();

        let mut registry: ClientRegistry<StubClient> = config.registry.build();
        assert_eq!(registry.health_check_interval(), Duration::from_secs(60));
        assert_eq!(registry.default_region(), "eu-west-1");

        let client = registry.get_or_create_default(|region| StubClient(region.to_string()));
        assert_eq!(client.0, "eu-west-1");
        assert!(registry.has("eu-west-1"));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = ResilienceConfig::load_or_default(None::<&Path>).unwrap();
        assert_eq!(config, ResilienceConfig::default());
    }

    #[test]
    fn test_serializes_to_toml() {
        let rendered = toml::to_string_pretty(&ResilienceConfig::default()).unwrap();
        assert!(rendered.contains("[retry]"));
        assert!(rendered.contains("max_retries = 3"));
        assert!(rendered.contains("\"rate_limit\""));
        assert!(rendered.contains("requests_per_minute = 60"));
    }
}
