//! Configuration management
//!
//! Loaded once at startup from a YAML file; every field has a default so a
//! minimal config only needs database credentials and auth secrets.

use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub cache: CacheConfig,
    pub cdr: CdrConfig,
    pub auth: AuthConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            idle_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime_secs: u64,
    pub search_path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "voip".to_string(),
            password: String::new(),
            dbname: "voip".to_string(),
            sslmode: "disable".to_string(),
            max_open_conns: 50,
            max_idle_conns: 10,
            conn_max_lifetime_secs: 300,
            search_path: "voip".to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_secs(self.conn_max_lifetime_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            cleanup_interval_secs: 60,
        }
    }
}

impl CacheConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CdrConfig {
    pub batch_size: i64,
    pub processing_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub retention_days: i32,
}

impl Default for CdrConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            processing_interval_secs: 5,
            cleanup_interval_secs: 86_400,
            retention_days: 7,
        }
    }
}

impl CdrConfig {
    pub fn processing_interval(&self) -> Duration {
        Duration::from_secs(self.processing_interval_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub freeswitch_user: String,
    pub freeswitch_password: String,
    pub api_keys: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            freeswitch_user: "freeswitch".to_string(),
            freeswitch_password: String::new(),
            api_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: Vec::new(),
            allowed_methods: vec![
                "GET".to_string(),
                "POST".to_string(),
                "PUT".to_string(),
                "DELETE".to_string(),
            ],
            allowed_headers: vec![
                "Content-Type".to_string(),
                "Authorization".to_string(),
                "X-API-Key".to_string(),
            ],
            allow_credentials: false,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Yaml))
            .build()
            .map_err(|e| DomainError::Config(format!("read {}: {}", path, e)))?;

        settings
            .try_deserialize()
            .map_err(|e| DomainError::Config(format!("parse {}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.max_open_conns, 50);
        assert_eq!(config.cache.max_entries, 10_000);
        assert_eq!(config.cdr.batch_size, 100);
        assert_eq!(config.cdr.processing_interval(), Duration::from_secs(5));
        assert_eq!(config.cdr.retention_days, 7);
        assert!(!config.cors.enabled);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                "database:\n  host: db.internal\n  password: hunter2\n",
                config::FileFormat::Yaml,
            ))
            .build()
            .unwrap();
        let config: Config = settings.try_deserialize().unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.password, "hunter2");
        // Untouched sections keep defaults
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cdr.retention_days, 7);
    }
}
