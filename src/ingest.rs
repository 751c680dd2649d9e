/// Batch import of extracted feature records.
///
/// Records arrive as a JSON array of `ServiceFeatures`. Each record is saved in
/// its own transaction; a failure is recorded and the batch moves on.

use std::path::Path;

use serde::Serialize;

use crate::catalog::{FeatureRepository, ServiceFeatures};
use crate::errors::SvcrankError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// (service name, service id)
    pub succeeded: Vec<(String, i64)>,
    /// (service name, error message)
    pub failed: Vec<(String, String)>,
}

pub fn load_records(path: &Path) -> Result<Vec<ServiceFeatures>, SvcrankError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| SvcrankError::Internal(format!("Read {}: {}", path.display(), e)))?;
    serde_json::from_str(&text).map_err(|e| SvcrankError::Validation {
        message: format!("{} is not a JSON array of service records: {}", path.display(), e),
        field: None,
    })
}

pub async fn import_records(repo: &FeatureRepository, records: &[ServiceFeatures]) -> ImportReport {
    let mut report = ImportReport::default();
    for record in records {
        match repo.save_service_features(record).await {
            Ok(id) => {
                tracing::debug!(service = %record.name, id, "Imported service");
                report.succeeded.push((record.name.clone(), id));
            }
            Err(e) => {
                tracing::warn!(service = %record.name, error = %e, "Failed to import service");
                report.failed.push((record.name.clone(), e.to_string()));
            }
        }
    }
    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Import finished"
    );
    report
}
