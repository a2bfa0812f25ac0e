//! Schema naming: the only durable encoding of import identity.
//!
//! An imported dataset lives in a PostgreSQL schema named
//! `ku<zoning_id>_<YYYYMMDD>`, with a `_tmp` suffix while an import is in
//! flight. There is no metadata table; which imports exist is derived
//! entirely from the schema names present in the catalog. This trades a
//! little pattern matching on every lookup for never having a metadata/data
//! consistency problem.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{Error, Result};

/// Pattern for active import schemas: six-digit zoning id, eight-digit
/// date. The catalog query applies the same expression server-side.
pub const ACTIVE_SCHEMA_PATTERN: &str = r"^ku\d{6}_\d{8}$";

/// Date component format of a schema name.
const SCHEMA_DATE_FORMAT: &str = "%Y%m%d";

static ACTIVE_SCHEMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ACTIVE_SCHEMA_PATTERN).expect("pattern compiles"));

/// Name of one import schema, active or staging.
///
/// Lexicographic order of the rendered names is chronological within one
/// zoning and groups zonings together, since the id prefix sorts first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaName {
    zoning_id: String,
    valid_date: NaiveDate,
    tmp: bool,
}

impl SchemaName {
    /// Active schema name for an identity.
    pub fn active(zoning_id: &str, valid_date: NaiveDate) -> Result<Self> {
        Self::new(zoning_id, valid_date, false)
    }

    /// Staging (`_tmp`) schema name for an identity.
    pub fn staging(zoning_id: &str, valid_date: NaiveDate) -> Result<Self> {
        Self::new(zoning_id, valid_date, true)
    }

    fn new(zoning_id: &str, valid_date: NaiveDate, tmp: bool) -> Result<Self> {
        if zoning_id.len() != 6 || !zoning_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Validation(vec![format!(
                "Zoning id '{zoning_id}' is not a six-digit code"
            )]));
        }
        Ok(Self {
            zoning_id: zoning_id.to_string(),
            valid_date,
            tmp,
        })
    }

    /// Parses an active schema name back into its identity.
    ///
    /// Inverse of the `Display` rendering for non-tmp names. A name that
    /// does not match the convention is a [`Error::DataIntegrity`]: the
    /// catalog should never contain one that got past the server-side
    /// filter.
    pub fn parse(name: &str) -> Result<Self> {
        if !ACTIVE_SCHEMA_RE.is_match(name) {
            return Err(Error::integrity(format!(
                "schema name '{name}' does not match ku<zoning>_<date>"
            )));
        }

        // Shape is guaranteed by the pattern: ku + 6 digits + '_' + 8 digits
        let zoning_id = &name[2..8];
        let date_str = &name[9..17];
        let valid_date = NaiveDate::parse_from_str(date_str, SCHEMA_DATE_FORMAT)
            .map_err(|_| {
                Error::integrity(format!("schema name '{name}' has an invalid date part"))
            })?;

        Ok(Self {
            zoning_id: zoning_id.to_string(),
            valid_date,
            tmp: false,
        })
    }

    pub fn zoning_id(&self) -> &str {
        &self.zoning_id
    }

    pub fn valid_date(&self) -> NaiveDate {
        self.valid_date
    }

    pub fn is_tmp(&self) -> bool {
        self.tmp
    }

    /// The active counterpart of this name (identity unchanged).
    pub fn as_active(&self) -> Self {
        Self {
            zoning_id: self.zoning_id.clone(),
            valid_date: self.valid_date,
            tmp: false,
        }
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ku{}_{}{}",
            self.zoning_id,
            self.valid_date.format(SCHEMA_DATE_FORMAT),
            if self.tmp { "_tmp" } else { "" }
        )
    }
}

/// DDL batch that guarantees an empty staging schema.
///
/// Drop-if-exists then create: leftovers from a previous failed attempt
/// never contaminate a retry, and running it twice leaves the same state
/// as running it once.
pub fn staging_reset_sql(staging: &SchemaName) -> String {
    format!("DROP SCHEMA IF EXISTS {staging} CASCADE;\nCREATE SCHEMA {staging};")
}

/// Fixed-shape DDL batch that atomically makes a staging schema the active
/// one for its zoning.
///
/// Every pre-existing active schema for the zoning is dropped (there should
/// be at most one; more are tolerated), then the staging schema is renamed
/// to the final active name. The batch executes as one transaction: a crash
/// mid-promotion can never leave the zoning with no active schema while a
/// tmp one sits unpromoted, nor with two active schemas.
#[derive(Debug)]
pub struct PromotionBatch {
    staging: SchemaName,
    target: SchemaName,
    drops: Vec<SchemaName>,
}

impl PromotionBatch {
    /// `existing` are the active schemas currently present for the zoning.
    pub fn new(staging: SchemaName, existing: Vec<SchemaName>) -> Self {
        let target = staging.as_active();
        Self {
            staging,
            target,
            drops: existing,
        }
    }

    pub fn target(&self) -> &SchemaName {
        &self.target
    }

    pub fn drop_count(&self) -> usize {
        self.drops.len()
    }

    /// Renders the batch as a single multi-statement string for
    /// `batch_execute`. The explicit BEGIN/COMMIT makes the all-or-nothing
    /// contract visible in the statement text itself.
    pub fn sql(&self) -> String {
        let mut sql = String::from("BEGIN;\n");
        for old in &self.drops {
            sql.push_str(&format!("DROP SCHEMA IF EXISTS {old} CASCADE;\n"));
        }
        sql.push_str(&format!(
            "ALTER SCHEMA {} RENAME TO {};\n",
            self.staging, self.target
        ));
        sql.push_str("COMMIT;");
        sql
    }
}
