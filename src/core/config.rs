//! Configuration management

use clap::Parser;
use config::{Config as ConfigBuilder, ConfigError as BuilderError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServer(String),

    #[error("Invalid database configuration: {0}")]
    InvalidDatabase(String),

    #[error("Invalid security configuration: {0}")]
    InvalidSecurity(String),

    #[error("Invalid storage configuration: {0}")]
    InvalidStorage(String),

    #[error("Invalid logging configuration: {0}")]
    InvalidLogging(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

impl From<BuilderError> for ConfigError {
    fn from(err: BuilderError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        // Parse command-line arguments
        let cli_args = CliArgs::parse();

        // Build configuration with proper precedence
        let mut builder = Self::default_builder()?;

        // 2. Load from config file if specified (medium priority)
        if let Some(config_path) = &cli_args.config {
            if !config_path.exists() {
                return Err(ConfigError::FileNotFound(config_path.display().to_string()));
            }
            builder = builder.add_source(File::from(config_path.as_path()));
        }

        // 3. Override with environment variables (higher priority)
        // Environment variables are prefixed with GRIMOIRE_ and use __ for nesting
        // Example: GRIMOIRE_SERVER__PORT=8080
        builder = builder.add_source(
            Environment::with_prefix("GRIMOIRE")
                .separator("__")
                .try_parsing(true),
        );

        // 4. Override with CLI arguments (highest priority)
        if let Some(host) = &cli_args.host {
            builder = builder.set_override("server.host", host.clone())?;
        }
        if let Some(port) = cli_args.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(db_path) = &cli_args.database {
            builder = builder.set_override("database.path", db_path.display().to_string())?;
        }
        if let Some(image_dir) = &cli_args.image_dir {
            builder = builder.set_override("storage.image_dir", image_dir.display().to_string())?;
        }
        if let Some(log_level) = &cli_args.log_level {
            builder = builder.set_override("logging.level", log_level.clone())?;
        }

        // Build and deserialize configuration
        let config: Config = builder.build()?.try_deserialize()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let config: Config = Self::default_builder()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults shared by all load paths (lowest priority)
    fn default_builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError>
    {
        let builder = ConfigBuilder::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 4000)?
            .set_default("database.path", "./data/grimoire.db")?
            .set_default("database.connection_pool_size", 10)?
            .set_default("database.busy_timeout", 5000)?
            .set_default("security.jwt_secret", "change-this-secret-in-production")?
            .set_default("security.token_ttl_hours", 24)?
            .set_default("security.allowed_origins", vec!["*"])?
            .set_default("storage.image_dir", "./images")?
            .set_default("storage.temp_dir", "./temp")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "text")?
            .set_default("logging.output", "stdout")?;
        Ok(builder)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.database.validate()?;
        self.security.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Command-line arguments for configuration override
#[derive(Debug, Parser)]
#[command(name = "grimoire")]
#[command(about = "Grimoire Backend Server", long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Server host address
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Database file path
    #[arg(short, long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Directory where uploaded cover images are stored
    #[arg(long, value_name = "DIR")]
    pub image_dir: Option<PathBuf>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(ConfigError::InvalidServer("host cannot be empty".to_string()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidServer(
                "port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub connection_pool_size: usize,
    pub busy_timeout: u64, // milliseconds
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidDatabase("path cannot be empty".to_string()));
        }

        if self.connection_pool_size == 0 {
            return Err(ConfigError::InvalidDatabase(
                "connection_pool_size must be greater than 0".to_string(),
            ));
        }

        if self.busy_timeout == 0 {
            return Err(ConfigError::InvalidDatabase(
                "busy_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub allowed_origins: Vec<String>,
}

impl SecurityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::InvalidSecurity(
                "jwt_secret cannot be empty".to_string(),
            ));
        }

        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidSecurity(
                "token_ttl_hours must be greater than 0".to_string(),
            ));
        }

        if self.allowed_origins.is_empty() {
            return Err(ConfigError::InvalidSecurity(
                "allowed_origins cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub image_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidStorage(
                "image_dir cannot be empty".to_string(),
            ));
        }

        if self.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::InvalidStorage(
                "temp_dir cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "level must be one of: {:?}",
                valid_levels
            )));
        }

        let valid_formats = ["json", "text"];
        if !valid_formats.contains(&self.format.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "format must be one of: {:?}",
                valid_formats
            )));
        }

        let valid_outputs = ["stdout", "file"];
        if !valid_outputs.contains(&self.output.as_str()) {
            return Err(ConfigError::InvalidLogging(format!(
                "output must be one of: {:?}",
                valid_outputs
            )));
        }

        if self.output == "file" && self.log_file.is_none() {
            return Err(ConfigError::InvalidLogging(
                "log_file must be specified when output is 'file'".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn default_config() -> Config {
        Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
            },
            database: DatabaseConfig {
                path: PathBuf::from("./data/grimoire.db"),
                connection_pool_size: 10,
                busy_timeout: 5000,
            },
            security: SecurityConfig {
                jwt_secret: "secret".to_string(),
                token_ttl_hours: 24,
                allowed_origins: vec!["*".to_string()],
            },
            storage: StorageConfig {
                image_dir: PathBuf::from("./images"),
                temp_dir: PathBuf::from("./temp"),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "text".to_string(),
                output: "stdout".to_string(),
                log_file: None,
            },
        }
    }

    #[test]
    fn test_default_config_validates() {
        assert!(default_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = default_config();
        config.server.port = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidServer(_))
        ));
    }

    #[test]
    fn test_empty_jwt_secret_rejected() {
        let mut config = default_config();
        config.security.jwt_secret = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSecurity(_))
        ));
    }

    #[test]
    fn test_file_logging_requires_log_file() {
        let mut config = default_config();
        config.logging.output = "file".to_string();
        config.logging.log_file = None;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogging(_))
        ));
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[server]
port = 8080

[security]
jwt_secret = "file-secret"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.jwt_secret, "file-secret");
        // Untouched sections keep their defaults
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.security.token_ttl_hours, 24);
    }

    #[test]
    fn test_from_file_missing_path() {
        let result = Config::from_file(Path::new("./does-not-exist.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }
}
