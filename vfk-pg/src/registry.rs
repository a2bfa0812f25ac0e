//! Schema Namespace Registry
//!
//! Translates between logical (zoning, valid date) identities and physical
//! schemas by scanning the catalog, and owns the two mutations of the
//! import lifecycle: resetting a staging schema and promoting it to active.
//! Schemas are discovered, never centrally catalogued; the discovery and
//! pattern-matching logic lives in pure functions over [`SchemaName`] so it
//! is testable without a live store.

use chrono::NaiveDate;
use deadpool_postgres::Pool;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::pool::DatabaseConfig;
use crate::error::Result;
use crate::schema::{staging_reset_sql, PromotionBatch, SchemaName, ACTIVE_SCHEMA_PATTERN};

/// One imported dataset, derived entirely from a schema name.
#[derive(Debug, Clone, Serialize)]
pub struct CadastralImport {
    /// Zoning identifier (six digits)
    pub zoning_id: String,
    /// Display name from the zoning's own `katuze` table; absent until a
    /// lookup against the imported data succeeds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoning_name: Option<String>,
    /// Date the dataset is authoritative for
    pub valid_date: NaiveDate,
}

/// Registry over a live pool.
pub struct Registry {
    pool: Pool,
    catalog: String,
    owner: String,
}

impl Registry {
    pub fn new(pool: Pool, config: &DatabaseConfig) -> Self {
        Self {
            pool,
            catalog: config.catalog().to_string(),
            owner: config.owner().to_string(),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Active import schemas, ordered by name.
    ///
    /// The order groups zonings together and is chronological within one
    /// zoning. Names are filtered server-side by catalog, owner and the
    /// naming pattern; each one is still parsed client-side, so a name that
    /// defeats the pattern surfaces as a data-integrity error instead of a
    /// silently skipped schema.
    pub async fn list_schemas(&self) -> Result<Vec<SchemaName>> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT schema_name FROM information_schema.schemata \
                 WHERE catalog_name = $1 AND schema_owner = $2 AND schema_name ~ $3 \
                 ORDER BY schema_name",
                &[&self.catalog, &self.owner, &ACTIVE_SCHEMA_PATTERN],
            )
            .await?;

        let mut schemas = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get(0)?;
            schemas.push(SchemaName::parse(&name)?);
        }
        Ok(schemas)
    }

    /// Most recent active schema for a zoning, if any.
    pub async fn schema_for_zoning(&self, zoning_id: &str) -> Result<Option<SchemaName>> {
        Ok(latest_for_zoning(self.list_schemas().await?, zoning_id))
    }

    /// All imports, with display names resolved from each zoning's own data.
    ///
    /// One name lookup per schema: each active schema is a distinct zoning
    /// by the promotion invariant. A schema whose `katuze` lookup fails is
    /// listed without a name rather than failing the whole enumeration.
    pub async fn list_imports(&self) -> Result<Vec<CadastralImport>> {
        let schemas = self.list_schemas().await?;
        let client = self.pool.get().await?;

        let mut imports = Vec::with_capacity(schemas.len());
        for schema in schemas {
            let zoning_name = match zoning_kod(&schema) {
                Some(kod) => {
                    let sql = format!("SELECT nazev FROM {schema}.katuze WHERE kod = $1");
                    match client.query_opt(&sql, &[&kod]).await {
                        Ok(Some(row)) => row.try_get(0).ok(),
                        Ok(None) => None,
                        Err(e) => {
                            warn!(schema = %schema, error = %e, "Zoning name lookup failed");
                            None
                        }
                    }
                }
                None => None,
            };

            imports.push(CadastralImport {
                zoning_id: schema.zoning_id().to_string(),
                zoning_name,
                valid_date: schema.valid_date(),
            });
        }
        Ok(imports)
    }

    /// Drops and recreates the staging schema for an identity.
    ///
    /// Idempotent: a prior failed attempt never contaminates a retry.
    pub async fn ensure_empty_staging(
        &self,
        zoning_id: &str,
        valid_date: NaiveDate,
    ) -> Result<SchemaName> {
        let staging = SchemaName::staging(zoning_id, valid_date)?;
        let client = self.pool.get().await?;
        client.batch_execute(&staging_reset_sql(&staging)).await?;

        info!(schema = %staging, "Staging schema reset");
        Ok(staging)
    }

    /// Atomically promotes the staging schema to the active one for its
    /// zoning, dropping every older active schema.
    ///
    /// This is the sole mutation that changes which schema is active. The
    /// batch runs as one transaction against the store, so readers observe
    /// either the old state or the new one, never a zoning with zero or two
    /// active schemas.
    pub async fn promote_staging(
        &self,
        zoning_id: &str,
        valid_date: NaiveDate,
    ) -> Result<SchemaName> {
        let staging = SchemaName::staging(zoning_id, valid_date)?;
        let existing = all_for_zoning(self.list_schemas().await?, zoning_id);

        let batch = PromotionBatch::new(staging, existing);
        let client = self.pool.get().await?;
        client.batch_execute(&batch.sql()).await?;

        let active = batch.target().clone();
        info!(
            schema = %active,
            dropped = batch.drop_count(),
            "Promoted staging schema to active"
        );
        Ok(active)
    }
}

/// `katuze.kod` of a schema's zoning. Six digits always parse; `None` is
/// unreachable for a name that passed [`SchemaName::parse`].
fn zoning_kod(schema: &SchemaName) -> Option<i32> {
    schema.zoning_id().parse().ok()
}

/// Latest schema for a zoning, relying on lexicographic-equals-chronological
/// ordering of the rendered names.
pub(crate) fn latest_for_zoning(
    schemas: Vec<SchemaName>,
    zoning_id: &str,
) -> Option<SchemaName> {
    schemas
        .into_iter()
        .filter(|s| s.zoning_id() == zoning_id)
        .max_by_key(|s| s.valid_date())
}

/// Every schema for a zoning. At most one exists after any completed
/// import; promotion drops all of them defensively.
pub(crate) fn all_for_zoning(schemas: Vec<SchemaName>, zoning_id: &str) -> Vec<SchemaName> {
    schemas
        .into_iter()
        .filter(|s| s.zoning_id() == zoning_id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schemas(names: &[&str]) -> Vec<SchemaName> {
        names
            .iter()
            .map(|n| SchemaName::parse(n).unwrap())
            .collect()
    }

    #[test]
    fn test_latest_for_zoning_picks_most_recent() {
        let all = schemas(&[
            "ku612065_20240101",
            "ku612065_20250701",
            "ku698001_20250101",
        ]);
        let latest = latest_for_zoning(all, "612065").unwrap();
        assert_eq!(latest.to_string(), "ku612065_20250701");
    }

    #[test]
    fn test_latest_for_zoning_absent_region() {
        assert!(latest_for_zoning(schemas(&["ku612065_20240101"]), "698001").is_none());
        assert!(latest_for_zoning(Vec::new(), "612065").is_none());
    }

    #[test]
    fn test_all_for_zoning_filters_by_id_prefix() {
        let all = schemas(&[
            "ku612065_20240101",
            "ku612065_20250701",
            "ku698001_20250101",
        ]);
        let mine = all_for_zoning(all, "612065");
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|s| s.zoning_id() == "612065"));
    }

    #[test]
    fn test_zoning_kod_parses_six_digits() {
        let schema = SchemaName::parse("ku612065_20250701").unwrap();
        assert_eq!(zoning_kod(&schema), Some(612065));
    }
}
