/// SQLite dialect and pool construction for the embedded engine.
///
/// The database file is created on first use. SQLite serializes writers at the
/// engine level, so concurrent write transactions queue behind the pool's
/// acquire timeout or fail with a busy error; the pool does not hide that.

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;

use crate::config::Config;
use crate::errors::SvcrankError;
use crate::store::Dialect;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn id_column(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    fn json_type(&self) -> &'static str {
        "TEXT"
    }

    fn real_type(&self) -> &'static str {
        "REAL"
    }

    fn int_type(&self) -> &'static str {
        "INTEGER"
    }
}

/// Build the connection URL for a file path. `mode=rwc` creates the file if missing.
pub(crate) fn file_url(db_path: &str) -> String {
    let path = db_path.strip_prefix("sqlite://").unwrap_or(db_path);
    format!("sqlite://{}?mode=rwc", path)
}

/// Open a pool over the SQLite file at config.db_path.
pub async fn connect(config: &Config) -> Result<AnyPool, SvcrankError> {
    let url = file_url(&config.db_path);
    // SQLite admits one writer at a time; cap the pool at four connections.
    let max_connections = config.pool_max_connections.clamp(1, 4);

    AnyPoolOptions::new()
        .min_connections(config.pool_min_connections.min(max_connections))
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&url)
        .await
        .map_err(|e| {
            SvcrankError::Config(format!("Failed to open SQLite database '{}': {}", config.db_path, e))
        })
}

/// Single-connection in-memory database.
///
/// Every in-memory connection is its own database, so the pool is pinned to
/// exactly one connection that is never recycled.
pub async fn connect_in_memory() -> Result<AnyPool, SvcrankError> {
    AnyPoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .map_err(|e| SvcrankError::Config(format!("Failed to open in-memory SQLite: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_strips_scheme() {
        assert_eq!(file_url("sqlite://data/app.db"), "sqlite://data/app.db?mode=rwc");
        assert_eq!(file_url("todo_services.db"), "sqlite://todo_services.db?mode=rwc");
    }

    #[test]
    fn test_placeholders_are_positional() {
        let d = SqliteDialect;
        assert_eq!(d.placeholders(1, 3), "?, ?, ?");
        assert_eq!(d.json_param(4), "?");
    }

    #[test]
    fn test_upsert_keeps_row_identity() {
        let sql = SqliteDialect.upsert(
            "features",
            &["service_id", "feature_name"],
            &["is_available"],
        );
        assert_eq!(
            sql,
            "INSERT INTO features (service_id, feature_name, is_available) VALUES (?, ?, ?) \
             ON CONFLICT (service_id, feature_name) DO UPDATE SET is_available = excluded.is_available"
        );
        assert!(!sql.contains("REPLACE"));
    }
}
