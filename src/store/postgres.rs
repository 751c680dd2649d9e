/// PostgreSQL dialect and pool construction for the client/server engine.
///
/// Uses a bounded sqlx pool (1..=20 connections by default) so transactions from
/// concurrent requests run in parallel. Every pooled connection gets a
/// statement_timeout so no query can block indefinitely.

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use sqlx::Executor;

use crate::config::Config;
use crate::errors::SvcrankError;
use crate::store::Dialect;

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn id_column(&self) -> &'static str {
        "BIGSERIAL PRIMARY KEY"
    }

    fn json_type(&self) -> &'static str {
        "JSONB"
    }

    // DOUBLE PRECISION rather than REAL: scores and weights decode as f64 on both engines.
    fn real_type(&self) -> &'static str {
        "DOUBLE PRECISION"
    }

    fn int_type(&self) -> &'static str {
        "BIGINT"
    }

    fn json_param(&self, index: usize) -> String {
        format!("CAST(${} AS JSONB)", index)
    }
}

/// Per-connection `SET statement_timeout` in milliseconds, clamped at `u64::MAX`.
fn statement_timeout_sql(secs: u64) -> String {
    format!("SET statement_timeout = {}", secs.saturating_mul(1000))
}

/// Connect a pool to the PostgreSQL server at config.database_url.
pub async fn connect(config: &Config) -> Result<AnyPool, SvcrankError> {
    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| SvcrankError::Config("database_url is not set".to_string()))?;
    let set_timeout = statement_timeout_sql(config.statement_timeout_secs);

    AnyPoolOptions::new()
        .min_connections(config.pool_min_connections)
        .max_connections(config.pool_max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(300))    // 5 min idle cleanup
        .max_lifetime(Duration::from_secs(1800))   // 30 min max connection age
        .after_connect(move |conn, _meta| {
            let set_timeout = set_timeout.clone();
            Box::pin(async move {
                conn.execute(set_timeout.as_str()).await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
        .map_err(|e| SvcrankError::Config(format!("Failed to connect to PostgreSQL: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_numbered() {
        let d = PostgresDialect;
        assert_eq!(d.placeholder(1), "$1");
        assert_eq!(d.placeholders(3, 2), "$3, $4");
    }

    #[test]
    fn test_statement_timeout_in_milliseconds() {
        assert_eq!(statement_timeout_sql(30), "SET statement_timeout = 30000");
        assert_eq!(statement_timeout_sql(0), "SET statement_timeout = 0");
        assert_eq!(
            statement_timeout_sql(u64::MAX),
            format!("SET statement_timeout = {}", u64::MAX)
        );
    }

    #[test]
    fn test_json_param_casts_to_jsonb() {
        assert_eq!(PostgresDialect.json_param(2), "CAST($2 AS JSONB)");
    }

    #[test]
    fn test_upsert_updates_only_value_columns() {
        let sql = PostgresDialect.upsert(
            "rankings",
            &["context", "service_id"],
            &["rank", "score"],
        );
        assert_eq!(
            sql,
            "INSERT INTO rankings (context, service_id, rank, score) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (context, service_id) DO UPDATE SET rank = excluded.rank, score = excluded.score"
        );
    }
}
