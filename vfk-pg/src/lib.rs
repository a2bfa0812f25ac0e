//! Import and query engine for VFK cadastral extracts over PostgreSQL
//!
//! Each imported dataset lives in its own schema named after the zoning and
//! the extract's valid date (`ku612065_20250701`); importing is
//! replace-not-merge per zoning, with an atomic schema rename as the only
//! visible switch. Queries always run against the most recent active schema
//! of a zoning.

pub mod config;
pub mod convert;
pub mod db;
pub mod error;
pub mod import;
pub mod query;
pub mod registry;
pub mod schema;

pub use config::{ConversionConfig, DatabaseConfig, SslMode};
pub use convert::{ConversionClient, Converter};
pub use error::{Error, Result};
pub use import::{ImportOutcome, Importer, RegionLocks};
pub use query::Queries;
pub use registry::{CadastralImport, Registry};
pub use schema::SchemaName;
