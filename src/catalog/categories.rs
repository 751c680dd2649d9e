/// Category operations. Categories are referenced by services, never owned.

use sqlx::any::AnyRow;
use sqlx::AnyConnection;

use crate::catalog::repository::{set_category, FeatureRepository};
use crate::catalog::{Category, NewCategory};
use crate::errors::SvcrankError;
use crate::store::{column, json_column, timestamp_column, Dialect};

const CATEGORY_COLUMNS: &str = "id, name, slug, description, \
     CAST(feature_schema AS TEXT) AS feature_schema, \
     CAST(ranking_contexts AS TEXT) AS ranking_contexts, \
     CAST(created_at AS TEXT) AS created_at";

fn row_to_category(row: &AnyRow) -> Result<Category, SvcrankError> {
    Ok(Category {
        id: column(row, "id")?,
        name: column(row, "name")?,
        slug: column(row, "slug")?,
        description: column(row, "description")?,
        feature_schema: json_column(row, "feature_schema")?,
        ranking_contexts: json_column(row, "ranking_contexts")?,
        created_at: timestamp_column(row, "created_at")?,
    })
}

/// Resolve a slug to a category id inside the caller's transaction.
pub(crate) async fn category_id_by_slug(
    conn: &mut AnyConnection,
    d: &dyn Dialect,
    slug: &str,
) -> Result<Option<i64>, SvcrankError> {
    let row = sqlx::query(&format!("SELECT id FROM categories WHERE slug = {}", d.placeholder(1)))
        .bind(slug)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(|r| column(r, "id")).transpose()
}

impl FeatureRepository {
    /// Create a category, or replace name/description/documents of the one with
    /// the same slug. The id of an existing category is kept.
    pub async fn add_category(&self, input: &NewCategory) -> Result<i64, SvcrankError> {
        if input.slug.trim().is_empty() {
            return Err(SvcrankError::validation("slug", "Category slug cannot be empty"));
        }

        let d = self.storage.dialect();
        let feature_schema = input.feature_schema.as_ref().map(serde_json::to_string).transpose()?;
        let ranking_contexts = input.ranking_contexts.as_ref().map(serde_json::to_string).transpose()?;

        let mut tx = self.storage.begin().await?;
        let row = sqlx::query(&format!(
            "INSERT INTO categories (name, slug, description, feature_schema, ranking_contexts) \
             VALUES ({}, {}, {}, {}, {}) \
             ON CONFLICT (slug) DO UPDATE SET name = excluded.name, description = excluded.description, \
             feature_schema = excluded.feature_schema, ranking_contexts = excluded.ranking_contexts \
             RETURNING id",
            d.placeholder(1),
            d.placeholder(2),
            d.placeholder(3),
            d.json_param(4),
            d.json_param(5)
        ))
        .bind(input.name.as_str())
        .bind(input.slug.as_str())
        .bind(input.description.as_deref())
        .bind(feature_schema)
        .bind(ranking_contexts)
        .fetch_one(&mut *tx)
        .await?;
        let id: i64 = column(&row, "id")?;
        tx.commit().await?;

        tracing::debug!(slug = %input.slug, id, "Saved category");
        Ok(id)
    }

    /// All categories ordered by name.
    pub async fn get_categories(&self) -> Result<Vec<Category>, SvcrankError> {
        let mut tx = self.storage.begin().await?;
        let rows = sqlx::query(&format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name"))
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        rows.iter().map(row_to_category).collect()
    }

    pub async fn get_category_by_slug(&self, slug: &str) -> Result<Option<Category>, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = {}",
            d.placeholder(1)
        ))
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        row.as_ref().map(row_to_category).transpose()
    }

    pub async fn assign_service_to_category(&self, service_id: i64, category_id: i64) -> Result<(), SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        set_category(&mut tx, d, service_id, category_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// File every service that has no category under `slug`.
    ///
    /// Returns how many services were assigned; an unknown slug assigns none.
    pub async fn assign_uncategorized(&self, slug: &str) -> Result<u64, SvcrankError> {
        let d = self.storage.dialect();
        let mut tx = self.storage.begin().await?;
        let Some(category_id) = category_id_by_slug(&mut tx, d, slug).await? else {
            return Ok(0);
        };
        let result = sqlx::query(&format!(
            "UPDATE services SET category_id = {} WHERE category_id IS NULL",
            d.placeholder(1)
        ))
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
