/// Storage abstraction layer
///
/// One connection/transaction contract over two SQL engines: an embedded SQLite
/// file and a pooled PostgreSQL server. Queries are written once, as engine-agnostic
/// text built from the active `Dialect`; nothing above this module branches on the
/// engine.

use std::fmt;
use std::sync::Arc;

use sqlx::any::AnyRow;
use sqlx::{Any, AnyPool, Row, Transaction};

use crate::config::Config;
use crate::errors::SvcrankError;

pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// A transaction scoped to one logical operation.
///
/// Commit is explicit; dropping the guard without committing rolls back, and the
/// connection goes back to the pool on every path.
pub type Tx = Transaction<'static, Any>;

/// SQL syntax that differs between the two engines.
pub trait Dialect: Send + Sync + fmt::Debug {
    /// Engine name, as reported by the health endpoint.
    fn name(&self) -> &'static str;

    /// Parameter token for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Auto-increment primary key column definition.
    fn id_column(&self) -> &'static str;

    /// Column type for structured JSON documents.
    fn json_type(&self) -> &'static str;

    /// Column type for floating point weights and scores.
    fn real_type(&self) -> &'static str;

    /// Column type for integer references and ranks.
    fn int_type(&self) -> &'static str;

    /// Parameter token for a value stored in a `json_type` column.
    fn json_param(&self, index: usize) -> String {
        self.placeholder(index)
    }

    /// Select expression reading a BOOLEAN column as a BIGINT 0/1 (NULL stays NULL).
    ///
    /// The Any driver has no mapping for SQLite's BOOLEAN type, so flags are
    /// always read through this and decoded with `flag_column`.
    fn bool_select(&self, column: &str, alias: &str) -> String {
        format!("CAST(CASE WHEN {column} THEN 1 WHEN NOT {column} THEN 0 END AS BIGINT) AS {alias}")
    }

    /// `count` comma-separated parameter tokens starting at `start`.
    fn placeholders(&self, start: usize, count: usize) -> String {
        (start..start + count)
            .map(|i| self.placeholder(i))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Insert-or-update keyed on the unique `key_columns`.
    ///
    /// Parameters bind keys first, then values, in order.
    fn upsert(&self, table: &str, key_columns: &[&str], value_columns: &[&str]) -> String {
        self.upsert_with_timestamps(table, key_columns, value_columns, &[])
    }

    /// Like `upsert`, additionally setting `timestamp_columns` to CURRENT_TIMESTAMP
    /// on both the insert and the update path.
    ///
    /// Only the listed value and timestamp columns change on conflict; the row id
    /// and every other column keep their stored values.
    fn upsert_with_timestamps(
        &self,
        table: &str,
        key_columns: &[&str],
        value_columns: &[&str],
        timestamp_columns: &[&str],
    ) -> String {
        let bound = key_columns.len() + value_columns.len();
        let columns: Vec<&str> = key_columns
            .iter()
            .chain(value_columns)
            .chain(timestamp_columns)
            .copied()
            .collect();

        let mut values = vec![self.placeholders(1, bound)];
        values.extend(timestamp_columns.iter().map(|_| "CURRENT_TIMESTAMP".to_string()));

        let updates: Vec<String> = value_columns
            .iter()
            .chain(timestamp_columns)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        let action = if updates.is_empty() {
            "DO NOTHING".to_string()
        } else {
            format!("DO UPDATE SET {}", updates.join(", "))
        };

        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            table,
            columns.join(", "),
            values.join(", "),
            key_columns.join(", "),
            action
        )
    }
}

/// Shared storage handle: one pool plus the dialect of the engine behind it.
///
/// Built once at process start and passed by `Arc` to every component.
#[derive(Clone)]
pub struct Storage {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("dialect", &self.dialect.name())
            .finish()
    }
}

impl Storage {
    /// Open the engine selected by configuration: PostgreSQL when database_url is
    /// set, otherwise the SQLite file at db_path.
    pub async fn connect(config: &Config) -> Result<Self, SvcrankError> {
        sqlx::any::install_default_drivers();

        if config.uses_postgres() {
            let pool = postgres::connect(config).await?;
            tracing::info!(engine = "postgres", max_connections = config.pool_max_connections, "Storage connected");
            Ok(Storage::new(pool, Arc::new(PostgresDialect)))
        } else {
            let pool = sqlite::connect(config).await?;
            tracing::info!(engine = "sqlite", db_path = %config.db_path, "Storage connected");
            Ok(Storage::new(pool, Arc::new(SqliteDialect)))
        }
    }

    /// Private single-connection SQLite database with the schema already applied.
    pub async fn in_memory() -> Result<Self, SvcrankError> {
        sqlx::any::install_default_drivers();
        let storage = Storage::new(sqlite::connect_in_memory().await?, Arc::new(SqliteDialect));
        schema::bootstrap(&storage).await?;
        Ok(storage)
    }

    pub fn new(pool: AnyPool, dialect: Arc<dyn Dialect>) -> Self {
        Storage { pool, dialect }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Shorthand for `dialect().placeholder(index)`.
    pub fn placeholder(&self, index: usize) -> String {
        self.dialect.placeholder(index)
    }

    /// Acquire a connection and open a transaction on it.
    ///
    /// Acquisition failure (including the pool's acquire timeout) is returned as a
    /// storage error; there is no retry at this layer.
    pub async fn begin(&self) -> Result<Tx, SvcrankError> {
        self.pool
            .begin()
            .await
            .map_err(|e| SvcrankError::Storage(format!("Failed to open transaction: {}", e)))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Read a column from an AnyRow, mapping decode failures to storage errors.
pub(crate) fn column<'r, T>(row: &'r AnyRow, name: &str) -> Result<T, SvcrankError>
where
    T: sqlx::Decode<'r, Any> + sqlx::Type<Any>,
{
    row.try_get(name)
        .map_err(|e| SvcrankError::Storage(format!("Column '{}': {}", name, e)))
}

/// Read a flag selected through `Dialect::bool_select`; NULL (an outer-join miss) is `None`.
pub(crate) fn flag_column(row: &AnyRow, name: &str) -> Result<Option<bool>, SvcrankError> {
    let raw: Option<i64> = column(row, name)?;
    Ok(raw.map(|v| v != 0))
}

/// Read a JSON document stored as text (SQLite) or JSONB cast to text (PostgreSQL).
pub(crate) fn json_column<T>(row: &AnyRow, name: &str) -> Result<Option<T>, SvcrankError>
where
    T: serde::de::DeserializeOwned,
{
    let raw: Option<String> = column(row, name)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(text) => serde_json::from_str(text)
            .map(Some)
            .map_err(|e| SvcrankError::Storage(format!("Column '{}' holds invalid JSON: {}", name, e))),
    }
}

/// Parse a timestamp column read as text. Both engines render
/// `YYYY-MM-DD HH:MM:SS[.ffffff]` for a TIMESTAMP cast to TEXT.
pub(crate) fn timestamp_column(
    row: &AnyRow,
    name: &str,
) -> Result<Option<chrono::NaiveDateTime>, SvcrankError> {
    let raw: Option<String> = column(row, name)?;
    raw.as_deref()
        .map(|s| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                .map_err(|e| SvcrankError::Storage(format!("Parse {} '{}': {}", name, s, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_without_values_does_nothing_on_conflict() {
        let sql = SqliteDialect.upsert("tags", &["name"], &[]);
        assert_eq!(sql, "INSERT INTO tags (name) VALUES (?) ON CONFLICT (name) DO NOTHING");
    }

    #[test]
    fn test_upsert_with_timestamps_refreshes_them() {
        let sql = PostgresDialect.upsert_with_timestamps(
            "rankings",
            &["context", "service_id"],
            &["rank", "score"],
            &["calculated_at"],
        );
        assert_eq!(
            sql,
            "INSERT INTO rankings (context, service_id, rank, score, calculated_at) \
             VALUES ($1, $2, $3, $4, CURRENT_TIMESTAMP) \
             ON CONFLICT (context, service_id) DO UPDATE SET rank = excluded.rank, \
             score = excluded.score, calculated_at = excluded.calculated_at"
        );
    }

    #[test]
    fn test_bool_select_maps_to_integer_flag() {
        assert_eq!(
            SqliteDialect.bool_select("f.is_available", "available"),
            "CAST(CASE WHEN f.is_available THEN 1 WHEN NOT f.is_available THEN 0 END AS BIGINT) AS available"
        );
    }

    #[tokio::test]
    async fn test_flags_decode_through_outer_join() {
        let storage = Storage::in_memory().await.expect("in-memory storage");
        let d = storage.dialect();
        let mut tx = storage.begin().await.expect("begin");

        sqlx::query(
            "INSERT INTO services (name, url, platforms) VALUES \
             ('Alpha', 'https://a.example', '[]'), ('Beta', 'https://b.example', '[]'), \
             ('Gamma', 'https://c.example', '[]')",
        )
        .execute(&mut *tx)
        .await
        .expect("insert services");
        sqlx::query(
            "INSERT INTO features (service_id, feature_name, is_available) \
             SELECT id, 'free_tier', name = 'Alpha' FROM services WHERE name IN ('Alpha', 'Beta')",
        )
        .execute(&mut *tx)
        .await
        .expect("insert features");

        let rows = sqlx::query(&format!(
            "SELECT s.name, {} FROM services s \
             LEFT JOIN features f ON f.service_id = s.id ORDER BY s.name",
            d.bool_select("f.is_available", "is_available")
        ))
        .fetch_all(&mut *tx)
        .await
        .expect("select");

        let flags: Vec<(String, Option<bool>)> = rows
            .iter()
            .map(|row| (column(row, "name").unwrap(), flag_column(row, "is_available").unwrap()))
            .collect();
        assert_eq!(
            flags,
            vec![
                ("Alpha".to_string(), Some(true)),
                ("Beta".to_string(), Some(false)),
                ("Gamma".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let storage = Storage::in_memory().await.expect("in-memory storage");
        let p = storage.placeholder(1);

        {
            let mut tx = storage.begin().await.expect("begin");
            sqlx::query(&format!(
                "INSERT INTO services (name, url, platforms) VALUES ({p}, 'https://a.example', '[]')"
            ))
            .bind("Abandoned")
            .execute(&mut *tx)
            .await
            .expect("insert");
            // no commit
        }

        let mut tx = storage.begin().await.expect("begin");
        let row = sqlx::query("SELECT COUNT(*) AS n FROM services")
            .fetch_one(&mut *tx)
            .await
            .expect("count");
        let n: i64 = column(&row, "n").expect("n");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_failed_statement_then_drop_leaves_nothing_behind() {
        let storage = Storage::in_memory().await.expect("in-memory storage");
        let p = storage.placeholder(1);

        let result: Result<(), SvcrankError> = async {
            let mut tx = storage.begin().await?;
            sqlx::query(&format!(
                "INSERT INTO services (name, url, platforms) VALUES ({p}, 'https://a.example', '[]')"
            ))
            .bind("Dup")
            .execute(&mut *tx)
            .await?;
            // Unique violation on the second insert.
            sqlx::query(&format!(
                "INSERT INTO services (name, url, platforms) VALUES ({p}, 'https://b.example', '[]')"
            ))
            .bind("Dup")
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(())
        }
        .await;
        assert!(matches!(result, Err(SvcrankError::Storage(_))));

        let mut tx = storage.begin().await.expect("begin");
        let row = sqlx::query("SELECT COUNT(*) AS n FROM services")
            .fetch_one(&mut *tx)
            .await
            .expect("count");
        let n: i64 = column(&row, "n").expect("n");
        assert_eq!(n, 0);
    }
}
