/// Idempotent DDL bootstrap for both engines.
///
/// Safe to run on every process start. Tables are required; indexes are an
/// optimisation, so a failed CREATE INDEX is logged and skipped.

use crate::errors::SvcrankError;
use crate::store::{Dialect, Storage};

pub const TABLES: [&str; 6] = [
    "categories",
    "services",
    "features",
    "additional_features",
    "feature_weights",
    "rankings",
];

pub const INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS idx_services_name ON services(name)",
    "CREATE INDEX IF NOT EXISTS idx_services_category ON services(category_id)",
    "CREATE INDEX IF NOT EXISTS idx_features_service ON features(service_id)",
    "CREATE INDEX IF NOT EXISTS idx_rankings_context ON rankings(context)",
    "CREATE INDEX IF NOT EXISTS idx_categories_slug ON categories(slug)",
];

/// CREATE TABLE statements in dependency order (categories before services,
/// services before everything that references them).
pub fn table_statements(d: &dyn Dialect) -> Vec<String> {
    let id = d.id_column();
    let json = d.json_type();
    let real = d.real_type();
    let int = d.int_type();

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS categories (
                id {id},
                name TEXT UNIQUE NOT NULL,
                slug TEXT UNIQUE NOT NULL,
                description TEXT,
                feature_schema {json},
                ranking_contexts {json},
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS services (
                id {id},
                name TEXT UNIQUE NOT NULL,
                url TEXT NOT NULL,
                pricing TEXT,
                platforms TEXT,
                category_id {int} REFERENCES categories(id),
                scraped_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                last_updated TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS features (
                id {id},
                service_id {int} NOT NULL REFERENCES services(id),
                feature_name TEXT NOT NULL,
                is_available BOOLEAN NOT NULL,
                UNIQUE(service_id, feature_name)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS additional_features (
                id {id},
                service_id {int} NOT NULL REFERENCES services(id),
                feature_name TEXT NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS feature_weights (
                id {id},
                context TEXT NOT NULL,
                feature_name TEXT NOT NULL,
                weight {real} NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(context, feature_name)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS rankings (
                id {id},
                context TEXT NOT NULL,
                service_id {int} NOT NULL REFERENCES services(id),
                rank {int} NOT NULL,
                score {real} NOT NULL,
                calculated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(context, service_id)
            )"
        ),
    ]
}

/// Create all tables and indexes that do not exist yet.
pub async fn bootstrap(storage: &Storage) -> Result<(), SvcrankError> {
    let mut tx = storage.begin().await?;

    for ddl in table_statements(storage.dialect()) {
        sqlx::query(&ddl)
            .execute(&mut *tx)
            .await
            .map_err(|e| SvcrankError::Storage(format!("Schema bootstrap failed: {}", e)))?;
    }
    tx.commit().await?;

    // Each index in its own transaction: on PostgreSQL one failed statement
    // would poison the rest of the transaction.
    for ddl in INDEXES {
        let result = async {
            let mut tx = storage.begin().await?;
            sqlx::query(ddl).execute(&mut *tx).await?;
            tx.commit().await?;
            Ok::<(), SvcrankError>(())
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, statement = ddl, "Index creation skipped");
        }
    }

    tracing::debug!(engine = storage.dialect().name(), "Schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{column, PostgresDialect, SqliteDialect};

    async fn table_names(storage: &Storage) -> Vec<String> {
        let mut tx = storage.begin().await.unwrap();
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&mut *tx)
        .await
        .unwrap();
        rows.iter().map(|r| column::<String>(r, "name").unwrap()).collect()
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let storage = Storage::in_memory().await.unwrap();
        bootstrap(&storage).await.expect("second bootstrap");
        bootstrap(&storage).await.expect("third bootstrap");

        let mut expected: Vec<String> = TABLES.iter().map(|t| t.to_string()).collect();
        expected.sort();
        assert_eq!(table_names(&storage).await, expected);
    }

    #[tokio::test]
    async fn test_bootstrap_creates_indexes() {
        let storage = Storage::in_memory().await.unwrap();
        let mut tx = storage.begin().await.unwrap();
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'")
            .fetch_all(&mut *tx)
            .await
            .unwrap();
        assert_eq!(rows.len(), INDEXES.len());
    }

    #[test]
    fn test_dialects_differ_only_in_types() {
        let sqlite = table_statements(&SqliteDialect);
        let pg = table_statements(&PostgresDialect);
        assert_eq!(sqlite.len(), TABLES.len());
        assert!(sqlite[0].contains("INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sqlite[0].contains("feature_schema TEXT"));
        assert!(pg[0].contains("BIGSERIAL PRIMARY KEY"));
        assert!(pg[0].contains("feature_schema JSONB"));
        assert!(pg[5].contains("score DOUBLE PRECISION"));
    }
}
