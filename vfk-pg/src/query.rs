//! Read-side queries against the active schema of a zoning
//!
//! Queries never mutate schema state and resolve the active schema fresh
//! on every call, so a promotion is visible to new queries immediately.
//! Rows are mapped into typed projection structs by an explicit step; a
//! row whose shape does not match is a data-integrity error, never a
//! silently coerced value.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use futures::try_join;
use serde::Serialize;
use tokio_postgres::types::FromSql;
use tokio_postgres::Row;
use tracing::error;

use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::schema::SchemaName;

/// Parcel numbering scheme (`par.druh_cislovani_par`).
///
/// Only meaningful for zonings running more than one numbering series;
/// for single-series zonings the classifier stays absent by design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParcelNumberingType {
    #[serde(rename = "Stavební parcela")]
    Building,
    #[serde(rename = "Pozemková parcela")]
    Land,
}

impl ParcelNumberingType {
    fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(Self::Building),
            2 => Ok(Self::Land),
            other => Err(Error::integrity(format!(
                "unknown parcel numbering code {other}"
            ))),
        }
    }
}

/// One parcel of a title deed (`par`, with its `zdpaze` source lookup).
#[derive(Debug, Clone, Serialize)]
pub struct Parcel {
    pub id: i64,
    pub zoning_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_zoning_code: Option<i32>,
    /// PKN (current registry) or PZE (simplified legacy registry)
    #[serde(rename = "type")]
    pub par_type: String,
    /// Legacy-registry source name, populated for PZE parcels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplified_registry_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numbering_type: Option<ParcelNumberingType>,
    pub root_number: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subdivision_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<i32>,
}

/// Owner of an ownership entry (`opsub`, with its `charos` category).
#[derive(Debug, Clone, Serialize)]
pub struct LegalPerson {
    /// Anonymised identifier
    pub id: String,
    /// OFO (natural person), BSM (marital property), OPO (legal entity)
    pub type_group: String,
    pub type_code: i32,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ico: Option<i64>,
}

/// One ownership entry of a title deed (`vla`, with its `typrav` lookup).
#[derive(Debug, Clone, Serialize)]
pub struct Ownership {
    pub id: i64,
    pub legal_relationship_type: String,
    pub owner: LegalPerson,
}

/// Full title deed detail (`tel` with its zoning metadata).
#[derive(Debug, Clone, Serialize)]
pub struct TitleDeed {
    pub id: i64,
    pub number: i32,
    pub zoning_code: i32,
    pub zoning_name: String,
    pub parcels: Vec<Parcel>,
    pub ownership: Vec<Ownership>,
}

/// Result of a title-deed lookup. A missing deed is a normal absent value,
/// not an error; the valid date of the dataset is reported either way.
#[derive(Debug, Clone, Serialize)]
pub struct TitleDeedLookup {
    pub valid_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_deed: Option<TitleDeed>,
}

/// Distinct owner-type descriptor of an overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerType {
    pub type_code: i32,
    pub type_group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_ico: Option<i64>,
}

/// Ownership overview of one title deed.
#[derive(Debug, Clone, Serialize)]
pub struct TitleDeedOwnerOverview {
    pub zoning_code: i32,
    pub title_deed_id: i64,
    pub title_deed_number: i32,
    /// Number of distinct owning legal persons
    pub owners_count: i64,
    /// Distinct owner-type descriptors, in row order
    pub owner_types: Vec<OwnerType>,
}

/// Read-only query layer over the registry's pool.
pub struct Queries<'a> {
    registry: &'a Registry,
}

impl<'a> Queries<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Active schema for a zoning code, or `ZoningNotFound`.
    async fn resolve_schema(&self, zoning_code: i32) -> Result<SchemaName> {
        let zoning_id = format!("{zoning_code:06}");
        self.registry
            .schema_for_zoning(&zoning_id)
            .await?
            .ok_or(Error::ZoningNotFound(zoning_code))
    }

    /// Ownership overview for a set of title deed numbers of one zoning.
    ///
    /// Numbers without a matching deed simply yield no overview; an empty
    /// result is not an error. Only a zoning without any imported dataset
    /// is.
    pub async fn ownership_overview(
        &self,
        zoning_code: i32,
        title_deed_numbers: &[i32],
    ) -> Result<Vec<TitleDeedOwnerOverview>> {
        let schema = self.resolve_schema(zoning_code).await?;
        let client = self.registry.pool().get().await?;

        let sql = format!(
            "SELECT t.id, t.cislo_tel, k.kod, o.id, c.kod, o.opsub_type, o.owner_ico \
             FROM {schema}.tel t \
             JOIN {schema}.katuze k ON k.kod = t.katuze_kod \
             JOIN {schema}.vla v ON v.tel_id = t.id \
             JOIN {schema}.opsub o ON o.id = v.opsub_id \
             JOIN {schema}.charos c ON c.kod = o.charos_kod \
             WHERE k.kod = $1 AND t.cislo_tel = ANY($2) \
             ORDER BY t.cislo_tel, v.id"
        );
        let rows = client
            .query(&sql, &[&zoning_code, &title_deed_numbers])
            .await?;

        let mut mapped = Vec::with_capacity(rows.len());
        for row in &rows {
            mapped.push(map_overview_row(row)?);
        }
        Ok(fold_overview_rows(&mapped))
    }

    /// Full detail of one title deed.
    ///
    /// Zero matching rows is an absent deed. More than one root row for the
    /// `(zoning, number)` key must never happen for well-formed data and is
    /// surfaced as an integrity error, never resolved by picking one.
    pub async fn title_deed(&self, zoning_code: i32, number: i32) -> Result<TitleDeedLookup> {
        let schema = self.resolve_schema(zoning_code).await?;
        let valid_date = schema.valid_date();
        let client = self.registry.pool().get().await?;

        let root_sql = format!(
            "SELECT t.id, t.cislo_tel, k.kod, k.nazev, k.ciselna_rada \
             FROM {schema}.tel t \
             JOIN {schema}.katuze k ON k.kod = t.katuze_kod \
             WHERE k.kod = $1 AND t.cislo_tel = $2"
        );
        let roots = client.query(&root_sql, &[&zoning_code, &number]).await?;

        let root = match roots.as_slice() {
            [] => {
                return Ok(TitleDeedLookup {
                    valid_date,
                    title_deed: None,
                })
            }
            [row] => row,
            rows => {
                error!(
                    zoning_code,
                    number,
                    count = rows.len(),
                    "Title deed key resolved to multiple rows"
                );
                return Err(Error::MultipleTitleDeeds {
                    zoning_code,
                    number,
                    count: rows.len(),
                });
            }
        };

        let tel_id: i64 = col(root, 0)?;
        let deed_number: i32 = col(root, 1)?;
        let kod: i32 = col(root, 2)?;
        let zoning_name: String = col(root, 3)?;
        let ciselna_rada: Option<i32> = col(root, 4)?;
        let multiple_series = has_multiple_numbering_series(ciselna_rada);

        // Independent child queries on separate pool connections
        let (parcels, ownership) = try_join!(
            self.parcels_of(&schema, tel_id, multiple_series),
            self.ownership_of(&schema, tel_id),
        )?;

        Ok(TitleDeedLookup {
            valid_date,
            title_deed: Some(TitleDeed {
                id: tel_id,
                number: deed_number,
                zoning_code: kod,
                zoning_name,
                parcels,
                ownership,
            }),
        })
    }

    async fn parcels_of(
        &self,
        schema: &SchemaName,
        tel_id: i64,
        multiple_series: bool,
    ) -> Result<Vec<Parcel>> {
        let client = self.registry.pool().get().await?;
        let sql = format!(
            "SELECT p.id, p.katuze_kod, p.katuze_kod_puv, p.par_type, z.nazev, \
                    p.druh_cislovani_par, p.kmenove_cislo_par, p.poddeleni_cisla_par, \
                    p.dil_parcely \
             FROM {schema}.par p \
             LEFT JOIN {schema}.zdpaze z ON z.kod = p.zdpaze_kod \
             WHERE p.tel_id = $1 \
             ORDER BY p.kmenove_cislo_par, p.poddeleni_cisla_par"
        );
        let rows = client.query(&sql, &[&tel_id]).await?;

        let mut parcels = Vec::with_capacity(rows.len());
        for row in &rows {
            parcels.push(map_parcel_row(row, multiple_series)?);
        }
        Ok(parcels)
    }

    async fn ownership_of(&self, schema: &SchemaName, tel_id: i64) -> Result<Vec<Ownership>> {
        let client = self.registry.pool().get().await?;
        let sql = format!(
            "SELECT v.id, tp.nazev, o.id, o.opsub_type, o.charos_kod, c.nazev, o.owner_ico \
             FROM {schema}.vla v \
             JOIN {schema}.typrav tp ON tp.kod = v.typrav_kod \
             JOIN {schema}.opsub o ON o.id = v.opsub_id \
             JOIN {schema}.charos c ON c.kod = o.charos_kod \
             WHERE v.tel_id = $1 \
             ORDER BY v.id"
        );
        let rows = client.query(&sql, &[&tel_id]).await?;

        let mut ownership = Vec::with_capacity(rows.len());
        for row in &rows {
            ownership.push(map_ownership_row(row)?);
        }
        Ok(ownership)
    }
}

/// `try_get` with the shape-mismatch error the whole query layer uses.
fn col<'r, T>(row: &'r Row, idx: usize) -> Result<T>
where
    T: FromSql<'r>,
{
    row.try_get(idx)
        .map_err(|e| Error::integrity(format!("row shape mismatch at column {idx}: {e}")))
}

/// Series code 1 is the single-series case; anything else means the zoning
/// numbers buildings and land separately and parcels carry the classifier.
fn has_multiple_numbering_series(ciselna_rada: Option<i32>) -> bool {
    matches!(ciselna_rada, Some(code) if code != 1)
}

fn map_parcel_row(row: &Row, multiple_series: bool) -> Result<Parcel> {
    let numbering_code: Option<i32> = col(row, 5)?;
    let numbering_type = if multiple_series {
        numbering_code.map(ParcelNumberingType::from_code).transpose()?
    } else {
        None
    };

    Ok(Parcel {
        id: col(row, 0)?,
        zoning_code: col(row, 1)?,
        original_zoning_code: col(row, 2)?,
        par_type: col(row, 3)?,
        simplified_registry_source: col(row, 4)?,
        numbering_type,
        root_number: col(row, 6)?,
        subdivision_number: col(row, 7)?,
        part: col(row, 8)?,
    })
}

fn map_ownership_row(row: &Row) -> Result<Ownership> {
    Ok(Ownership {
        id: col(row, 0)?,
        legal_relationship_type: col(row, 1)?,
        owner: LegalPerson {
            id: col(row, 2)?,
            type_group: col(row, 3)?,
            type_code: col(row, 4)?,
            type_name: col(row, 5)?,
            ico: col(row, 6)?,
        },
    })
}

/// One flattened join row of the overview query.
#[derive(Debug, Clone)]
struct OverviewRow {
    title_deed_id: i64,
    title_deed_number: i32,
    zoning_code: i32,
    owner_id: String,
    owner_type: OwnerType,
}

fn map_overview_row(row: &Row) -> Result<OverviewRow> {
    Ok(OverviewRow {
        title_deed_id: col(row, 0)?,
        title_deed_number: col(row, 1)?,
        zoning_code: col(row, 2)?,
        owner_id: col(row, 3)?,
        owner_type: OwnerType {
            type_code: col(row, 4)?,
            type_group: col(row, 5)?,
            owner_ico: col(row, 6)?,
        },
    })
}

/// Folds join rows into one overview per title deed: distinct owner count
/// and distinct owner-type descriptors, preserving row order.
fn fold_overview_rows(rows: &[OverviewRow]) -> Vec<TitleDeedOwnerOverview> {
    let mut order: Vec<i64> = Vec::new();
    let mut by_deed: BTreeMap<i64, (TitleDeedOwnerOverview, HashSet<&str>)> = BTreeMap::new();

    for row in rows {
        let entry = by_deed.entry(row.title_deed_id).or_insert_with(|| {
            order.push(row.title_deed_id);
            (
                TitleDeedOwnerOverview {
                    zoning_code: row.zoning_code,
                    title_deed_id: row.title_deed_id,
                    title_deed_number: row.title_deed_number,
                    owners_count: 0,
                    owner_types: Vec::new(),
                },
                HashSet::new(),
            )
        });

        entry.1.insert(row.owner_id.as_str());
        if !entry.0.owner_types.contains(&row.owner_type) {
            entry.0.owner_types.push(row.owner_type.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|id| by_deed.remove(&id))
        .map(|(mut overview, owners)| {
            overview.owners_count = owners.len() as i64;
            overview
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview_row(
        deed_id: i64,
        number: i32,
        owner_id: &str,
        type_code: i32,
        type_group: &str,
        ico: Option<i64>,
    ) -> OverviewRow {
        OverviewRow {
            title_deed_id: deed_id,
            title_deed_number: number,
            zoning_code: 612065,
            owner_id: owner_id.to_string(),
            owner_type: OwnerType {
                type_code,
                type_group: type_group.to_string(),
                owner_ico: ico,
            },
        }
    }

    #[test]
    fn test_fold_counts_distinct_owners() {
        let rows = vec![
            overview_row(1, 51, "owner-a", 2, "OFO", None),
            overview_row(1, 51, "owner-b", 2, "OFO", None),
            overview_row(1, 51, "owner-a", 2, "OFO", None),
        ];
        let overviews = fold_overview_rows(&rows);
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].owners_count, 2);
        // Same descriptor for all three rows
        assert_eq!(overviews[0].owner_types.len(), 1);
    }

    #[test]
    fn test_fold_keeps_distinct_owner_types() {
        let rows = vec![
            overview_row(1, 51, "owner-a", 1, "BSM", None),
            overview_row(1, 51, "owner-b", 2, "OFO", None),
            overview_row(1, 51, "owner-c", 2, "OPO", Some(1)),
        ];
        let overviews = fold_overview_rows(&rows);
        assert_eq!(overviews[0].owner_types.len(), 3);
        assert_eq!(overviews[0].owners_count, 3);
    }

    #[test]
    fn test_fold_ico_distinguishes_owner_types() {
        // Same code and group but different organisation id are distinct
        let rows = vec![
            overview_row(1, 51, "owner-a", 2, "OPO", Some(1)),
            overview_row(1, 51, "owner-b", 2, "OPO", Some(70890013)),
        ];
        let overviews = fold_overview_rows(&rows);
        assert_eq!(overviews[0].owner_types.len(), 2);
    }

    #[test]
    fn test_fold_groups_per_title_deed_in_row_order() {
        let rows = vec![
            overview_row(10, 417, "owner-a", 2, "OFO", None),
            overview_row(20, 1299, "owner-a", 2, "OFO", None),
            overview_row(10, 417, "owner-b", 1, "BSM", None),
        ];
        let overviews = fold_overview_rows(&rows);
        assert_eq!(overviews.len(), 2);
        assert_eq!(overviews[0].title_deed_number, 417);
        assert_eq!(overviews[0].owners_count, 2);
        assert_eq!(overviews[1].title_deed_number, 1299);
        assert_eq!(overviews[1].owners_count, 1);
    }

    #[test]
    fn test_fold_empty_rows() {
        assert!(fold_overview_rows(&[]).is_empty());
    }

    #[test]
    fn test_numbering_series_indicator() {
        assert!(!has_multiple_numbering_series(None));
        assert!(!has_multiple_numbering_series(Some(1)));
        assert!(has_multiple_numbering_series(Some(2)));
    }

    #[test]
    fn test_numbering_type_codes() {
        assert_eq!(
            ParcelNumberingType::from_code(1).unwrap(),
            ParcelNumberingType::Building
        );
        assert_eq!(
            ParcelNumberingType::from_code(2).unwrap(),
            ParcelNumberingType::Land
        );
        assert!(matches!(
            ParcelNumberingType::from_code(9),
            Err(Error::DataIntegrity(_))
        ));
    }

    #[test]
    fn test_numbering_type_serialises_with_display_labels() {
        let json = serde_json::to_string(&ParcelNumberingType::Building).unwrap();
        assert_eq!(json, "\"Stavební parcela\"");
        let json = serde_json::to_string(&ParcelNumberingType::Land).unwrap();
        assert_eq!(json, "\"Pozemková parcela\"");
    }

    #[test]
    fn test_absent_lookup_serialises_without_deed() {
        let lookup = TitleDeedLookup {
            valid_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
            title_deed: None,
        };
        let json = serde_json::to_value(&lookup).unwrap();
        assert_eq!(json["valid_date"], "2025-07-01");
        assert!(json.get("title_deed").is_none());
    }
}
