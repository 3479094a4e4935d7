use agro_core::{AccessUnitPricing, Amount};
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub integrations: IntegrationsConfig,
    pub market: MarketConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    /// Optional database URL. If not provided, defaults to a file in the data directory
    pub url: Option<String>,
    /// Maximum number of database connections in the pool
    pub max_connections: u32,
    /// Connection timeout in seconds
    pub connection_timeout: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (pretty, json, compact)
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

/// Credentials for the outbound services; a missing key disables the service
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IntegrationsConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub weather_api_key: Option<String>,
    #[serde(default)]
    pub plant_api_keys: Vec<String>,
    pub request_timeout_secs: u64,
}

/// Access units charged per listed quantity
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MarketConfig {
    pub kg_rate: Amount,
    pub tonne_rate: Amount,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder().add_source(File::from_str(
            include_str!("../config/default.toml"),
            FileFormat::Toml,
        ));

        if let Ok(config_file) = env::var("CONFIG_FILE") {
            builder = builder.add_source(
                File::with_name(&config_file)
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        Self::finish(builder)
    }

    /// Load configuration from a specific file path layered over the defaults
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::from_str(
                include_str!("../config/default.toml"),
                FileFormat::Toml,
            ))
            .add_source(File::with_name(path).format(FileFormat::Toml));

        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        // AGRO_SERVER__PORT=8080, AGRO_INTEGRATIONS__PLANT_API_KEYS=a,b
        let config = builder
            .add_source(
                Environment::with_prefix("AGRO")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("integrations.plant_api_keys")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut result: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        result.apply_overrides(|name| env::var(name).ok());
        Ok(result)
    }

    /// Apply the conventional deployment variables on top of the layered sources
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(database_url) = lookup("DATABASE_URL") {
            self.database.url = Some(database_url);
        }
        if let Some(listen_addr) = lookup("LISTEN_ADDR") {
            self.server.listen_addr = listen_addr;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            self.logging.level = log_level;
        }
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.integrations.gemini_api_key = Some(key);
        }
        if let Some(key) = lookup("WEATHER_API_KEY") {
            self.integrations.weather_api_key = Some(key);
        }
        if let Some(keys) = lookup("PERENUAL_API_KEYS") {
            self.integrations.plant_api_keys = split_keys(&keys);
        }
    }

    /// Get the database URL with default fallback to the data directory
    pub fn database_url(&self) -> String {
        match &self.database.url {
            Some(url) => url.clone(),
            None => Self::default_database_url(),
        }
    }

    pub fn default_database_url() -> String {
        if let Ok(xdg_data) = env::var("XDG_DATA_HOME") {
            return format!("sqlite://{xdg_data}/agroflex/agroflex.sqlite");
        }

        let home = env::var("HOME")
            .or_else(|_| env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        format!("sqlite://{home}/.local/share/agroflex/agroflex.sqlite")
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.integrations.request_timeout_secs)
    }

    pub fn pricing(&self) -> Result<AccessUnitPricing> {
        AccessUnitPricing::new(self.market.kg_rate, self.market.tonne_rate)
            .context("Invalid market configuration")
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        let database_url = self.database_url();
        if !database_url.starts_with("sqlite://") {
            return Err(anyhow::anyhow!(
                "Only SQLite databases are supported. URL must start with 'sqlite://'. Got: {}",
                database_url
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.database.max_connections == 0 {
            return Err(anyhow::anyhow!(
                "Database max_connections must be greater than 0"
            ));
        }

        if self.integrations.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "Integration request timeout must be greater than 0"
            ));
        }

        self.pricing()?;
        Ok(())
    }
}

fn split_keys(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        let pricing = AccessUnitPricing::default();
        Self {
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
                connection_timeout: 30,
            },
            server: ServerConfig {
                listen_addr: "127.0.0.1".to_string(),
                port: 8000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
            integrations: IntegrationsConfig {
                gemini_api_key: None,
                gemini_model: agro_advisor::llm::DEFAULT_GEMINI_MODEL.to_string(),
                weather_api_key: None,
                plant_api_keys: Vec::new(),
                request_timeout_secs: 30,
            },
            market: MarketConfig {
                kg_rate: pricing.kg_rate,
                tonne_rate: pricing.tonne_rate,
            },
        }
    }
}
