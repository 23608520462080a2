use std::env;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
    pub email: EmailConfig,
    pub frontend: FrontendConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
}

/// Signing secrets and lifetimes for every token kind.
///
/// Access and refresh secrets are distinct on purpose: key separation keeps
/// an access-signing-key compromise from forging refresh tokens and the
/// other way around.
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub password_reset_ttl_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub from: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FrontendConfig {
    /// Base URL used to build password-reset links, without trailing slash.
    pub base_url: String,
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, TOKENS__ACCESS_SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: TOKENS__ACCESS_SECRET=... overrides tokens.access_secret
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.access_secret.is_empty() || self.tokens.refresh_secret.is_empty() {
            return Err(ConfigError::Message(
                "tokens.access_secret and tokens.refresh_secret are required".to_string(),
            ));
        }
        if self.tokens.access_secret == self.tokens.refresh_secret {
            return Err(ConfigError::Message(
                "tokens.access_secret and tokens.refresh_secret must differ".to_string(),
            ));
        }
        if self.tokens.access_ttl_minutes <= 0
            || self.tokens.refresh_ttl_days <= 0
            || self.tokens.password_reset_ttl_minutes <= 0
        {
            return Err(ConfigError::Message(
                "token lifetimes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
