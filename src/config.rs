/// Configuration management using figment
///
/// Loads configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: svcrank.toml (in working directory)
/// 3. Environment variables: prefixed SVCRANK_ (e.g., SVCRANK_LOG_LEVEL=debug)
/// 4. Bare DATABASE_URL, DB_PATH and PORT, as set by common hosting platforms

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::SvcrankError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "auto" (pretty on a terminal, JSON otherwise), "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// PostgreSQL connection string. When set, the client/server engine is used.
    #[serde(default)]
    pub database_url: Option<String>,

    /// SQLite database file, used when database_url is absent.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_pool_min_connections")]
    pub pool_min_connections: u32,

    #[serde(default = "default_pool_max_connections")]
    pub pool_max_connections: u32,

    /// Upper bound on waiting for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Per-statement timeout (PostgreSQL only).
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Context used by recommendations when the caller names none.
    #[serde(default = "default_context")]
    pub default_context: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "auto".to_string()
}

fn default_db_path() -> String {
    "todo_services.db".to_string()
}

fn default_pool_min_connections() -> u32 {
    1
}

fn default_pool_max_connections() -> u32 {
    20
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

fn default_statement_timeout_secs() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_context() -> String {
    "personal_use".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: None,
            db_path: default_db_path(),
            pool_min_connections: default_pool_min_connections(),
            pool_max_connections: default_pool_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            statement_timeout_secs: default_statement_timeout_secs(),
            host: default_host(),
            port: default_port(),
            default_context: default_context(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: SVCRANK_LOG_LEVEL=debug overrides log_level in svcrank.toml
    pub fn load() -> Result<Config, SvcrankError> {
        Self::figment()
            .extract()
            .map_err(|e| SvcrankError::Config(format!("Failed to load config: {}", e)))
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("svcrank.toml"))
            .merge(Env::prefixed("SVCRANK_"))
            .merge(
                Env::raw()
                    .only(&["DATABASE_URL", "DB_PATH", "PORT"])
                    .map(|key| key.as_str().to_ascii_lowercase().into()),
            )
    }

    /// True when the client/server engine is selected.
    pub fn uses_postgres(&self) -> bool {
        self.database_url
            .as_deref()
            .map(|url| !url.trim().is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, "auto");
        assert_eq!(config.database_url, None);
        assert_eq!(config.db_path, "todo_services.db");
        assert_eq!(config.pool_max_connections, 20);
        assert_eq!(config.port, 5000);
        assert!(!config.uses_postgres());
    }

    #[test]
    fn test_blank_database_url_falls_back_to_sqlite() {
        let config = Config {
            database_url: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(!config.uses_postgres());
    }

    #[test]
    fn test_env_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("svcrank.toml", "log_level = \"debug\"\nport = 8080")?;
            jail.set_env("SVCRANK_PORT", "9090");
            jail.set_env("DB_PATH", "/tmp/catalog.db");

            let config: Config = Config::figment().extract()?;
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.port, 9090);
            assert_eq!(config.db_path, "/tmp/catalog.db");
            Ok(())
        });
    }
}
