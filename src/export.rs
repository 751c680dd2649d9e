/// JSON export of the catalog and of every stored ranking.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use serde::Serialize;

use crate::catalog::{FeatureRepository, Service};
use crate::comparison::ComparisonMatrix;
use crate::errors::SvcrankError;
use crate::ranking::{RankingEngine, RankingEntry};

/// All services with nested features, plus the full comparison matrix.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogExport {
    pub services: Vec<Service>,
    pub feature_comparison: ComparisonMatrix,
    pub exported_at: NaiveDateTime,
}

/// Every stored context's ranking, plus the full comparison matrix.
#[derive(Debug, Clone, Serialize)]
pub struct RankingsReport {
    pub generated_at: NaiveDateTime,
    pub contexts: BTreeMap<String, Vec<RankingEntry>>,
    pub feature_comparison: ComparisonMatrix,
}

pub async fn export_catalog(repo: &FeatureRepository) -> Result<CatalogExport, SvcrankError> {
    let services = repo.get_all_services(None).await?;
    let feature_comparison = repo.get_feature_comparison(None).await?;
    Ok(CatalogExport {
        services,
        feature_comparison,
        exported_at: Utc::now().naive_utc(),
    })
}

pub async fn rankings_report(
    engine: &RankingEngine,
    repo: &FeatureRepository,
) -> Result<RankingsReport, SvcrankError> {
    let mut contexts = BTreeMap::new();
    for context in engine.list_contexts().await? {
        let entries = engine.get_rankings(&context).await?;
        contexts.insert(context, entries);
    }
    Ok(RankingsReport {
        generated_at: Utc::now().naive_utc(),
        contexts,
        feature_comparison: repo.get_feature_comparison(None).await?,
    })
}

/// Write `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SvcrankError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| SvcrankError::Internal(format!("Create {}: {}", parent.display(), e)))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text)
        .map_err(|e| SvcrankError::Internal(format!("Write {}: {}", path.display(), e)))?;
    tracing::info!(path = %path.display(), "Wrote export");
    Ok(())
}
