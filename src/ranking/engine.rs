/// Ranking engine: scores every service for a context, assigns dense 1-based
/// ranks, and persists them.
///
/// A calculation is one transaction: weight replacement (when explicit weights
/// are given), the feature scan, and the ranking upserts commit or roll back
/// together. Stored rankings go stale as soon as features or weights change and
/// stay that way until the context is recalculated.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::AnyConnection;

use crate::catalog::FeatureMap;
use crate::errors::SvcrankError;
use crate::ranking::scorer::{score, uniform_weights, WeightVector};
use crate::ranking::{preset_weights, PRESET_CONTEXTS};
use crate::store::{column, flag_column, timestamp_column, Dialect, Storage};

/// One service's position in a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub service_id: i64,
    pub service_name: String,
    pub score: f64,
    pub rank: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculated_at: Option<NaiveDateTime>,
}

/// A service with its features, as loaded for scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub service_id: i64,
    pub service_name: String,
    pub features: FeatureMap,
}

/// Score candidates and order them: score descending, then service name
/// ascending. Ranks are 1..=N in that order.
pub fn assign_ranks(candidates: Vec<Candidate>, weights: &WeightVector) -> Vec<RankingEntry> {
    let mut scored: Vec<RankingEntry> = candidates
        .into_iter()
        .map(|c| RankingEntry {
            score: score(&c.features, weights),
            service_id: c.service_id,
            service_name: c.service_name,
            rank: 0,
            calculated_at: None,
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.service_name.cmp(&b.service_name))
    });
    for (i, entry) in scored.iter_mut().enumerate() {
        entry.rank = i as i64 + 1;
    }
    scored
}

#[derive(Debug, Clone)]
pub struct RankingEngine {
    storage: Storage,
}

impl RankingEngine {
    pub fn new(storage: Storage) -> Self {
        RankingEngine { storage }
    }

    /// Replace the stored weight vector for `context`.
    pub async fn set_feature_weights(&self, context: &str, weights: &WeightVector) -> Result<(), SvcrankError> {
        validate_context(context)?;
        validate_weights(weights)?;
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        replace_weights(&mut tx, d, context, weights).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Stored weight vector for `context`; empty if none is stored.
    pub async fn get_feature_weights(&self, context: &str) -> Result<WeightVector, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let weights = load_weights(&mut tx, d, context).await?;
        tx.commit().await?;
        Ok(weights)
    }

    /// Score every service for `context`, persist the ranking, and return it in rank order.
    ///
    /// Effective weights: `weights` when given and non-empty (and stored as the
    /// context's new vector), else the stored vector, else weight 1.0 on each core
    /// feature.
    pub async fn calculate_rankings(
        &self,
        context: &str,
        weights: Option<&WeightVector>,
    ) -> Result<Vec<RankingEntry>, SvcrankError> {
        validate_context(context)?;
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;

        let effective = match weights.filter(|w| !w.is_empty()) {
            Some(explicit) => {
                validate_weights(explicit)?;
                replace_weights(&mut tx, d, context, explicit).await?;
                explicit.clone()
            }
            None => {
                let stored = load_weights(&mut tx, d, context).await?;
                if stored.is_empty() {
                    tracing::debug!(context, "No stored weights, using uniform core weights");
                    uniform_weights()
                } else {
                    stored
                }
            }
        };

        let candidates = load_candidates(&mut tx, d).await?;
        let ranked = assign_ranks(candidates, &effective);

        let upsert = d.upsert_with_timestamps(
            "rankings",
            &["context", "service_id"],
            &["rank", "score"],
            &["calculated_at"],
        );
        for entry in &ranked {
            sqlx::query(&upsert)
                .bind(context)
                .bind(entry.service_id)
                .bind(entry.rank)
                .bind(entry.score)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        match ranked.first() {
            Some(top) => tracing::info!(
                context,
                services = ranked.len(),
                top = %top.service_name,
                score = top.score,
                "Rankings calculated"
            ),
            None => tracing::info!(context, "Rankings calculated for an empty catalog"),
        }
        Ok(ranked)
    }

    /// Stored ranking for `context` in rank order; empty for an unknown context.
    pub async fn get_rankings(&self, context: &str) -> Result<Vec<RankingEntry>, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let rows = sqlx::query(&format!(
            "SELECT r.service_id, s.name AS service_name, r.rank, r.score, \
             CAST(r.calculated_at AS TEXT) AS calculated_at \
             FROM rankings r JOIN services s ON r.service_id = s.id \
             WHERE r.context = {} ORDER BY r.rank",
            d.placeholder(1)
        ))
        .bind(context)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        rows.iter()
            .map(|row| {
                Ok(RankingEntry {
                    service_id: column(row, "service_id")?,
                    service_name: column(row, "service_name")?,
                    score: column(row, "score")?,
                    rank: column(row, "rank")?,
                    calculated_at: timestamp_column(row, "calculated_at")?,
                })
            })
            .collect()
    }

    /// Contexts that have a stored ranking, sorted.
    pub async fn list_contexts(&self) -> Result<Vec<String>, SvcrankError> {
        let mut tx = self.storage.begin().await?;
        let rows = sqlx::query("SELECT DISTINCT context FROM rankings ORDER BY context")
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(|row| column(row, "context")).collect()
    }

    /// Recalculate every preset context with its preset weights.
    pub async fn generate_all_rankings(&self) -> Result<Vec<(String, Vec<RankingEntry>)>, SvcrankError> {
        let mut results = Vec::with_capacity(PRESET_CONTEXTS.len());
        for context in PRESET_CONTEXTS {
            let weights = preset_weights(context)
                .ok_or_else(|| SvcrankError::Internal(format!("No preset weights for '{}'", context)))?;
            let ranked = self.calculate_rankings(context, Some(&weights)).await?;
            results.push((context.to_string(), ranked));
        }
        Ok(results)
    }
}

fn validate_context(context: &str) -> Result<(), SvcrankError> {
    if context.trim().is_empty() {
        return Err(SvcrankError::validation("context", "Context name cannot be empty"));
    }
    Ok(())
}

fn validate_weights(weights: &WeightVector) -> Result<(), SvcrankError> {
    match weights.iter().find(|(_, w)| !w.is_finite()) {
        Some((feature, w)) => Err(SvcrankError::Validation {
            message: format!("Weight for '{}' must be a finite number, got {}", feature, w),
            field: Some("weights".to_string()),
        }),
        None => Ok(()),
    }
}

async fn replace_weights(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    context: &str,
    weights: &WeightVector,
) -> Result<(), SvcrankError> {
    sqlx::query(&format!("DELETE FROM feature_weights WHERE context = {}", d.placeholder(1)))
        .bind(context)
        .execute(&mut *conn)
        .await?;

    let upsert = d.upsert("feature_weights", &["context", "feature_name"], &["weight"]);
    for (feature, weight) in weights {
        sqlx::query(&upsert)
            .bind(context)
            .bind(feature.as_str())
            .bind(*weight)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn load_weights(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    context: &str,
) -> Result<WeightVector, SvcrankError> {
    let rows = sqlx::query(&format!(
        "SELECT feature_name, weight FROM feature_weights WHERE context = {}",
        d.placeholder(1)
    ))
    .bind(context)
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| Ok((column(row, "feature_name")?, column(row, "weight")?)))
        .collect()
}

/// Every service with its feature map, from one LEFT JOIN so services without
/// feature rows still appear (with an empty map).
async fn load_candidates(conn: &mut AnyConnection, d: &dyn Dialect) -> Result<Vec<Candidate>, SvcrankError> {
    let rows = sqlx::query(&format!(
        "SELECT s.id, s.name, f.feature_name, {} \
         FROM services s LEFT JOIN features f ON s.id = f.service_id \
         ORDER BY s.name, f.feature_name",
        d.bool_select("f.is_available", "is_available")
    ))
    .fetch_all(conn)
    .await?;

    let mut candidates: Vec<Candidate> = Vec::new();
    for row in &rows {
        let service_id: i64 = column(row, "id")?;
        if candidates.last().map(|c| c.service_id) != Some(service_id) {
            candidates.push(Candidate {
                service_id,
                service_name: column(row, "name")?,
                features: FeatureMap::new(),
            });
        }
        let feature: Option<String> = column(row, "feature_name")?;
        let available = flag_column(row, "is_available")?;
        if let (Some(feature), Some(candidate)) = (feature, candidates.last_mut()) {
            candidate.features.insert(feature, available.unwrap_or(false));
        }
    }
    Ok(candidates)
}
