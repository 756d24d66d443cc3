use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::postgres::is_valid_database_name;
use crate::retry::RetryPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database holding the `input_data` and `predictions` tables
    pub name: String,
    /// Database used to issue `CREATE DATABASE`
    #[serde(default = "default_maintenance_db")]
    pub maintenance_db: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_port() -> u16 {
    5432
}

fn default_maintenance_db() -> String {
    "postgres".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseConfig {
    fn options_for(&self, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(database)
    }

    /// Connection options for the application database
    pub fn connect_options(&self) -> PgConnectOptions {
        self.options_for(&self.name)
    }

    /// Connection options for the maintenance database
    pub fn admin_connect_options(&self) -> PgConnectOptions {
        self.options_for(&self.maintenance_db)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Directory holding model artifacts
    pub dir: PathBuf,
    /// Artifact file name; `.onnx` or `.json`
    #[serde(default = "default_model_file")]
    pub file: String,
}

fn default_model_file() -> String {
    "mnist_model.onnx".to_string()
}

impl ModelConfig {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Connection attempts before giving up on the store
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds
    #[serde(default = "default_retry_delay")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    30
}

fn default_retry_delay() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_retry_delay(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.delay_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("database.host", "db")?
            .set_default("database.port", 5432)?
            .set_default("database.user", "postgres")?
            .set_default("database.password", "postgres")?
            .set_default("database.name", "milestone_5")?
            .set_default("database.maintenance_db", "postgres")?
            .set_default("database.max_connections", 5)?
            .set_default("model.dir", "/app/models")?
            .set_default("model.file", "mnist_model.onnx")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("retry.max_attempts", 30)?
            .set_default("retry.delay_ms", 2000)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("LEDGER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // LEDGER_DATABASE__HOST, LEDGER_MODEL__DIR, ...
            .add_source(
                Environment::with_prefix("LEDGER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.host.trim().is_empty() {
            errors.push("database.host must not be empty".to_string());
        }
        if !is_valid_database_name(&self.database.name) {
            errors.push(format!(
                "database.name '{}' must match [A-Za-z_][A-Za-z0-9_]* and be at most 63 chars",
                self.database.name
            ));
        }
        if self.database.max_connections == 0 {
            errors.push("database.max_connections must be > 0".to_string());
        }
        if self.model.file.trim().is_empty() {
            errors.push("model.file must not be empty".to_string());
        }
        if self.server.port == 0 {
            errors.push("server.port must be > 0".to_string());
        }
        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            database: DatabaseConfig {
                host: "db".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "secret".to_string(),
                name: "milestone_5".to_string(),
                maintenance_db: "postgres".to_string(),
                max_connections: 5,
            },
            model: ModelConfig {
                dir: PathBuf::from("/app/models"),
                file: "mnist_model.onnx".to_string(),
            },
            server: ServerConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn builds_connection_options() {
        let cfg = sample();
        let app = cfg.database.connect_options();
        assert_eq!(app.get_host(), "db");
        assert_eq!(app.get_port(), 5432);
        assert_eq!(app.get_username(), "postgres");
        assert_eq!(app.get_database(), Some("milestone_5"));
        assert_eq!(
            cfg.database.admin_connect_options().get_database(),
            Some("postgres")
        );
        assert_eq!(
            cfg.model.path(),
            PathBuf::from("/app/models/mnist_model.onnx")
        );
    }

    #[test]
    fn reserved_characters_in_credentials_stay_out_of_the_host() {
        let mut cfg = sample();
        cfg.database.user = "ledger:admin".to_string();
        cfg.database.password = "p@ss/word#1".to_string();

        let opts = cfg.database.connect_options();
        assert_eq!(opts.get_host(), "db");
        assert_eq!(opts.get_port(), 5432);
        assert_eq!(opts.get_username(), "ledger:admin");
        assert_eq!(opts.get_database(), Some("milestone_5"));
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut cfg = sample();
        assert!(cfg.validate().is_ok());

        cfg.database.name = "milestone; DROP TABLE x".to_string();
        cfg.retry.max_attempts = 0;
        cfg.server.port = 0;
        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn loads_file_over_defaults() {
        let dir = std::env::temp_dir().join(format!("digit-ledger-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            "[database]\nname = \"ledger_test\"\n\n[server]\nport = 8080\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&dir).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(cfg.database.name, "ledger_test");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.retry.max_attempts, 30);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn retry_policy_from_config() {
        let policy = RetryConfig {
            max_attempts: 3,
            delay_ms: 250,
        }
        .policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }
}
