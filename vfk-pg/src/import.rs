//! Import orchestration: validate, stage, convert, promote
//!
//! One import is a strict sequence. Header validation happens before any
//! store mutation; staging starts from a guaranteed-empty schema; the
//! Conversion Service populates it; promotion is the single irreversible
//! step and is only reached after conversion fully succeeded. A failed
//! conversion leaves the staging schema behind for inspection, and re-running
//! the same import retries cleanly because the staging reset is idempotent.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info};

use vfk::{check_head, read_head};

use crate::convert::Converter;
use crate::error::{Error, Result};
use crate::registry::Registry;

/// Per-zoning mutual exclusion for imports.
///
/// Two interleaved imports for one zoning would race on the shared staging
/// schema and on promotion; imports for different zonings touch disjoint
/// schemas and run concurrently. Queries never consult this registry.
#[derive(Default)]
pub struct RegionLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RegionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for one zoning, created on first use.
    pub fn lock_for(&self, zoning_id: &str) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().expect("region lock registry poisoned");
        map.entry(zoning_id.to_string()).or_default().clone()
    }
}

/// Summary of a successful import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub zoning_id: String,
    pub valid_date: NaiveDate,
    /// Active schema the data now lives in
    pub schema: String,
    pub duration_secs: f64,
}

/// Drives one import end to end, against any [`Converter`].
pub struct Importer<'a, C> {
    registry: &'a Registry,
    converter: &'a C,
    locks: &'a RegionLocks,
}

impl<'a, C: Converter> Importer<'a, C> {
    pub fn new(registry: &'a Registry, converter: &'a C, locks: &'a RegionLocks) -> Self {
        Self {
            registry,
            converter,
            locks,
        }
    }

    /// Imports one extract: replace-not-merge for its zoning.
    ///
    /// Fail-fast on validation, nothing mutated. On conversion failure the
    /// staging schema is retained (deliberate: disk traded for
    /// debuggability, cleanup is the operator's). Promotion only runs after
    /// the converter reported success.
    pub async fn import_extract(&self, path: &Path) -> Result<ImportOutcome> {
        let started = Instant::now();

        let head = read_head(path)?;
        let report = check_head(&head);
        let Some(identity) = report.identity else {
            return Err(Error::Validation(report.problems));
        };

        info!(
            zoning = %identity.zoning_id,
            valid_date = %identity.valid_date,
            path = %path.display(),
            "Extract head valid, starting import"
        );

        // Held across staging + conversion + promotion
        let lock = self.locks.lock_for(&identity.zoning_id);
        let _guard = lock.lock().await;

        let staging = self
            .registry
            .ensure_empty_staging(&identity.zoning_id, identity.valid_date)
            .await?;

        let file_path = path.to_string_lossy();
        if let Err(e) = self
            .converter
            .convert(&file_path, &staging.to_string())
            .await
        {
            error!(
                schema = %staging,
                error = %e,
                "Conversion failed; staging schema retained for inspection"
            );
            return Err(e);
        }

        let active = self
            .registry
            .promote_staging(&identity.zoning_id, identity.valid_date)
            .await?;

        let outcome = ImportOutcome {
            zoning_id: identity.zoning_id,
            valid_date: identity.valid_date,
            schema: active.to_string(),
            duration_secs: started.elapsed().as_secs_f64(),
        };
        info!(
            schema = %outcome.schema,
            secs = outcome.duration_secs,
            "Import complete"
        );
        Ok(outcome)
    }
}
