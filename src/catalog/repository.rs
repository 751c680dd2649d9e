/// Durable storage of service feature data.
///
/// Every public operation runs inside one transaction from `Storage::begin`.
/// Lookups on an unknown name or slug return an empty result; write failures
/// roll back and propagate.

use std::collections::{BTreeMap, HashMap};

use sqlx::any::AnyRow;
use sqlx::AnyConnection;

use crate::catalog::categories::category_id_by_slug;
use crate::catalog::{ContextStanding, FeatureMap, Service, ServiceFeatures, ServiceSummary};
use crate::comparison::{build_matrix, ComparisonMatrix};
use crate::errors::SvcrankError;
use crate::store::{column, flag_column, json_column, timestamp_column, Dialect, Storage};

const SERVICE_COLUMNS: &str = "s.id, s.name, s.url, s.pricing, s.platforms, s.category_id, \
     CAST(s.scraped_at AS TEXT) AS scraped_at, CAST(s.last_updated AS TEXT) AS last_updated";

/// Repository over services, their boolean features and free-form extras.
#[derive(Debug, Clone)]
pub struct FeatureRepository {
    pub(crate) storage: Storage,
}

fn row_to_service(row: &AnyRow) -> Result<Service, SvcrankError> {
    Ok(Service {
        id: column(row, "id")?,
        name: column(row, "name")?,
        url: column(row, "url")?,
        pricing: column(row, "pricing")?,
        platforms: json_column(row, "platforms")?.unwrap_or_default(),
        category_id: column(row, "category_id")?,
        scraped_at: timestamp_column(row, "scraped_at")?,
        last_updated: timestamp_column(row, "last_updated")?,
        features: FeatureMap::new(),
        additional_features: Vec::new(),
    })
}

impl FeatureRepository {
    pub fn new(storage: Storage) -> Self {
        FeatureRepository { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Upsert a service by name together with its features, atomically.
    ///
    /// Updates url/pricing/platforms/last_updated on an existing service (the id is
    /// kept), upserts one row per core feature, then replaces the additional
    /// features wholesale. Returns the service id.
    pub async fn save_service_features(&self, record: &ServiceFeatures) -> Result<i64, SvcrankError> {
        if record.name.trim().is_empty() {
            return Err(SvcrankError::validation("name", "Service name cannot be empty"));
        }
        if record.url.trim().is_empty() {
            return Err(SvcrankError::validation("url", "Service url cannot be empty"));
        }

        let d = self.storage.dialect();
        let platforms = serde_json::to_string(&record.platforms)?;
        let mut tx = self.storage.begin().await?;

        let existing = sqlx::query(&format!("SELECT id FROM services WHERE name = {}", d.placeholder(1)))
            .bind(record.name.as_str())
            .fetch_optional(&mut *tx)
            .await?;

        let service_id: i64 = match existing {
            Some(row) => {
                let id: i64 = column(&row, "id")?;
                sqlx::query(&format!(
                    "UPDATE services SET url = {}, pricing = {}, platforms = {}, \
                     last_updated = CURRENT_TIMESTAMP WHERE id = {}",
                    d.placeholder(1),
                    d.placeholder(2),
                    d.placeholder(3),
                    d.placeholder(4)
                ))
                .bind(record.url.as_str())
                .bind(record.pricing.as_deref())
                .bind(platforms.as_str())
                .bind(id)
                .execute(&mut *tx)
                .await?;
                id
            }
            None => {
                let row = sqlx::query(&format!(
                    "INSERT INTO services (name, url, pricing, platforms, last_updated) \
                     VALUES ({}, CURRENT_TIMESTAMP) RETURNING id",
                    d.placeholders(1, 4)
                ))
                .bind(record.name.as_str())
                .bind(record.url.as_str())
                .bind(record.pricing.as_deref())
                .bind(platforms.as_str())
                .fetch_one(&mut *tx)
                .await?;
                column(&row, "id")?
            }
        };

        if let Some(slug) = record.category.as_deref() {
            match category_id_by_slug(&mut tx, d, slug).await? {
                Some(category_id) => set_category(&mut tx, d, service_id, category_id).await?,
                None => tracing::warn!(service = %record.name, category = slug, "Unknown category slug, leaving service unassigned"),
            }
        }

        let upsert = d.upsert("features", &["service_id", "feature_name"], &["is_available"]);
        for (feature_name, is_available) in record.core_flags() {
            sqlx::query(&upsert)
                .bind(service_id)
                .bind(feature_name)
                .bind(is_available)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(&format!("DELETE FROM additional_features WHERE service_id = {}", d.placeholder(1)))
            .bind(service_id)
            .execute(&mut *tx)
            .await?;
        let insert_extra = format!(
            "INSERT INTO additional_features (service_id, feature_name) VALUES ({})",
            d.placeholders(1, 2)
        );
        for extra in &record.additional_features {
            sqlx::query(&insert_extra)
                .bind(service_id)
                .bind(extra.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::debug!(service = %record.name, service_id, "Saved service features");
        Ok(service_id)
    }

    /// Every service ordered by name, each with its feature map and extras.
    ///
    /// With a category slug only that category's services are returned; an
    /// unknown slug yields an empty list.
    pub async fn get_all_services(&self, category_slug: Option<&str>) -> Result<Vec<Service>, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;

        let category_id = match category_slug {
            Some(slug) => match category_id_by_slug(&mut tx, d, slug).await? {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let rows = match category_id {
            Some(id) => {
                sqlx::query(&format!(
                    "SELECT {SERVICE_COLUMNS} FROM services s WHERE s.category_id = {} ORDER BY s.name",
                    d.placeholder(1)
                ))
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
            }
            None => {
                sqlx::query(&format!("SELECT {SERVICE_COLUMNS} FROM services s ORDER BY s.name"))
                    .fetch_all(&mut *tx)
                    .await?
            }
        };
        let mut services = rows.iter().map(row_to_service).collect::<Result<Vec<_>, _>>()?;
        if services.is_empty() {
            return Ok(services);
        }

        let mut features = all_features(&mut tx, d).await?;
        let mut extras = all_additional_features(&mut tx).await?;
        tx.commit().await?;

        for service in &mut services {
            service.features = features.remove(&service.id).unwrap_or_default();
            service.additional_features = extras.remove(&service.id).unwrap_or_default();
        }
        Ok(services)
    }

    /// Look up one service by its unique name, without features.
    pub async fn get_service_by_name(&self, name: &str) -> Result<Option<Service>, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let service = service_by_name(&mut tx, d, name).await?;
        tx.commit().await?;
        Ok(service)
    }

    /// Look up one service by name with its feature map and extras.
    pub async fn get_service_with_features(&self, name: &str) -> Result<Option<Service>, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let Some(mut service) = service_by_name(&mut tx, d, name).await? else {
            return Ok(None);
        };
        service.features = features_for_service(&mut tx, d, service.id).await?;
        service.additional_features = additional_features_for_service(&mut tx, d, service.id).await?;
        tx.commit().await?;
        Ok(Some(service))
    }

    /// The service → feature → bool matrix from one ordered join over all features.
    ///
    /// Only recorded (service, feature) pairs appear. A category slug restricts the
    /// matrix to that category; an unknown slug yields an empty matrix.
    pub async fn get_feature_comparison(&self, category_slug: Option<&str>) -> Result<ComparisonMatrix, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;

        let base = format!(
            "SELECT s.name, f.feature_name, {} FROM services s JOIN features f ON s.id = f.service_id",
            d.bool_select("f.is_available", "is_available")
        );
        let rows = match category_slug {
            Some(slug) => {
                let Some(category_id) = category_id_by_slug(&mut tx, d, slug).await? else {
                    return Ok(ComparisonMatrix::default());
                };
                sqlx::query(&format!(
                    "{base} WHERE s.category_id = {} ORDER BY s.name, f.feature_name",
                    d.placeholder(1)
                ))
                .bind(category_id)
                .fetch_all(&mut *tx)
                .await?
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY s.name, f.feature_name"))
                    .fetch_all(&mut *tx)
                    .await?
            }
        };
        tx.commit().await?;

        let triples = rows
            .iter()
            .map(|row| {
                Ok((
                    column::<String>(row, "name")?,
                    column::<String>(row, "feature_name")?,
                    flag_column(row, "is_available")?.unwrap_or(false),
                ))
            })
            .collect::<Result<Vec<_>, SvcrankError>>()?;
        Ok(build_matrix(triples))
    }

    /// Rank and score of a service in every context it has been ranked in.
    pub async fn get_service_rankings(&self, service_id: i64) -> Result<BTreeMap<String, ContextStanding>, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let rows = sqlx::query(&format!(
            "SELECT context, rank, score FROM rankings WHERE service_id = {}",
            d.placeholder(1)
        ))
        .bind(service_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        rows.iter()
            .map(|row| {
                Ok((
                    column::<String>(row, "context")?,
                    ContextStanding {
                        rank: column(row, "rank")?,
                        score: column(row, "score")?,
                    },
                ))
            })
            .collect()
    }

    /// Service with features, extras and its rankings across contexts.
    pub async fn get_service_summary(&self, name: &str) -> Result<Option<ServiceSummary>, SvcrankError> {
        let Some(service) = self.get_service_with_features(name).await? else {
            return Ok(None);
        };
        let rankings = self.get_service_rankings(service.id).await?;
        Ok(Some(ServiceSummary { service, rankings }))
    }
}

// ---------------------------------------------------------------------------
// Connection-level helpers (run inside the caller's transaction)
// ---------------------------------------------------------------------------

pub(crate) async fn set_category(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    service_id: i64,
    category_id: i64,
) -> Result<(), SvcrankError> {
    sqlx::query(&format!(
        "UPDATE services SET category_id = {} WHERE id = {}",
        d.placeholder(1),
        d.placeholder(2)
    ))
    .bind(category_id)
    .bind(service_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn service_by_name(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    name: &str,
) -> Result<Option<Service>, SvcrankError> {
    let row = sqlx::query(&format!(
        "SELECT {SERVICE_COLUMNS} FROM services s WHERE s.name = {}",
        d.placeholder(1)
    ))
    .bind(name)
    .fetch_optional(conn)
    .await?;
    row.as_ref().map(row_to_service).transpose()
}

async fn features_for_service(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    service_id: i64,
) -> Result<FeatureMap, SvcrankError> {
    let rows = sqlx::query(&format!(
        "SELECT feature_name, {} FROM features WHERE service_id = {}",
        d.bool_select("is_available", "is_available"),
        d.placeholder(1)
    ))
    .bind(service_id)
    .fetch_all(conn)
    .await?;

    rows.iter()
        .map(|row| Ok((column(row, "feature_name")?, flag_column(row, "is_available")?.unwrap_or(false))))
        .collect()
}

async fn additional_features_for_service(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    service_id: i64,
) -> Result<Vec<String>, SvcrankError> {
    let rows = sqlx::query(&format!(
        "SELECT feature_name FROM additional_features WHERE service_id = {} ORDER BY id",
        d.placeholder(1)
    ))
    .bind(service_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(|row| column(row, "feature_name")).collect()
}

async fn all_features(conn: &mut AnyConnection, d: &dyn Dialect) -> Result<HashMap<i64, FeatureMap>, SvcrankError> {
    let rows = sqlx::query(&format!(
        "SELECT service_id, feature_name, {} FROM features",
        d.bool_select("is_available", "is_available")
    ))
    .fetch_all(conn)
    .await?;

    let mut by_service: HashMap<i64, FeatureMap> = HashMap::new();
    for row in &rows {
        by_service
            .entry(column(row, "service_id")?)
            .or_default()
            .insert(column(row, "feature_name")?, flag_column(row, "is_available")?.unwrap_or(false));
    }
    Ok(by_service)
}

async fn all_additional_features(conn: &mut AnyConnection) -> Result<HashMap<i64, Vec<String>>, SvcrankError> {
    let rows = sqlx::query("SELECT service_id, feature_name FROM additional_features ORDER BY id")
        .fetch_all(conn)
        .await?;

    let mut by_service: HashMap<i64, Vec<String>> = HashMap::new();
    for row in &rows {
        by_service
            .entry(column(row, "service_id")?)
            .or_default()
            .push(column(row, "feature_name")?);
    }
    Ok(by_service)
}
