use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::collector::{CollectorSettings, ProfileCrosspostPolicy};
use crate::service::BatchPolicy;
use crate::validation::InputValidator;

/// Application configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub files: FilesConfig,
    pub logging: LoggingConfig,
    pub reddit: RedditConfig,
    pub collection: CollectionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesConfig {
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: Option<String>,
    pub format: String, // "json" or "text"
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub submissions_limit: usize,
    pub crossposts_limit: usize,
    pub time_budget_secs: u64,
    pub server_error_backoff_secs: u64,
    pub connection_error_backoff_secs: u64,
    pub min_submissions: usize,
    pub profile_crossposts: ProfileCrosspostPolicy,
    pub batch_policy: BatchPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite:data/subharvest.db".to_string(),
                max_connections: 4,
            },
            files: FilesConfig {
                directory: "data/".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
            reddit: RedditConfig {
                client_id: String::new(),
                client_secret: String::new(),
                user_agent: format!("subharvest/{}", env!("CARGO_PKG_VERSION")),
                request_timeout_secs: 60,
            },
            collection: CollectionConfig {
                submissions_limit: 350,
                crossposts_limit: 10,
                time_budget_secs: 900,
                server_error_backoff_secs: 30,
                connection_error_backoff_secs: 120,
                min_submissions: 350,
                profile_crossposts: ProfileCrosspostPolicy::Abort,
                batch_policy: BatchPolicy::Continue,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Load configuration with `path` layered over the standard files
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_with(Some(path))
    }

    fn load_with(extra: Option<&Path>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| anyhow!("Failed to build default configuration: {e}"))?;

        let mut builder = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("subharvest").required(false));
        if let Some(path) = extra {
            builder = builder.add_source(File::from(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("SUBHARVEST")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| anyhow!("Failed to load configuration: {e}"))?;

        let mut app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {e}"))?;

        app_config.apply_legacy_env();
        app_config.validate()?;

        Ok(app_config)
    }

    /// Credentials from the plain `CLIENT_ID`, `CLIENT_SECRET` and
    /// `USERAGENT` variables win over every other source.
    fn apply_legacy_env(&mut self) {
        if let Ok(client_id) = std::env::var("CLIENT_ID") {
            self.reddit.client_id = client_id;
        }
        if let Ok(client_secret) = std::env::var("CLIENT_SECRET") {
            self.reddit.client_secret = client_secret;
        }
        if let Ok(user_agent) = std::env::var("USERAGENT") {
            self.reddit.user_agent = user_agent;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections == 0 {
            return Err(anyhow!("max_connections must be greater than 0"));
        }
        InputValidator::validate_database_url(&self.database.url)?;

        if self.files.directory.trim().is_empty() {
            return Err(anyhow!("files.directory cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        InputValidator::validate_user_agent(&self.reddit.user_agent)?;
        if self.reddit.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than 0"));
        }

        let collection = &self.collection;
        InputValidator::validate_submissions_limit(collection.submissions_limit)?;
        InputValidator::validate_crossposts_limit(collection.crossposts_limit)?;
        InputValidator::validate_submissions_limit(collection.min_submissions)?;
        if collection.time_budget_secs == 0 {
            return Err(anyhow!("time_budget_secs must be greater than 0"));
        }
        if collection.server_error_backoff_secs == 0 || collection.connection_error_backoff_secs == 0 {
            return Err(anyhow!("Backoff pauses must be greater than 0"));
        }

        Ok(())
    }

    /// Collector settings derived from the `collection` section
    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            submissions_limit: self.collection.submissions_limit,
            crossposts_limit: self.collection.crossposts_limit,
            time_budget: Duration::from_secs(self.collection.time_budget_secs),
            server_error_backoff: Duration::from_secs(self.collection.server_error_backoff_secs),
            connection_error_backoff: Duration::from_secs(self.collection.connection_error_backoff_secs),
            profile_crossposts: self.collection.profile_crossposts,
        }
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}
