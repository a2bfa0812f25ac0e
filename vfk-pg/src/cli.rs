//! CLI command definitions and handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use vfk_pg::config::{ConversionConfig, DatabaseConfig};
use vfk_pg::db::pool::{create_pool, test_connection};
use vfk_pg::{ConversionClient, Error, Importer, Queries, RegionLocks, Registry};

#[derive(Subcommand)]
pub enum Commands {
    /// List imported datasets (zoning, name, valid date)
    Imports {
        #[command(flatten)]
        db: DbArgs,
    },

    /// Validate a VFK extract head without touching the database
    Validate {
        /// Path to the VFK extract
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Import a VFK extract, replacing any previous dataset of its zoning
    Import {
        /// Path to the VFK extract
        #[arg(short, long)]
        path: PathBuf,

        /// Conversion service base URL (default: env CONVERT_URL)
        #[arg(long)]
        convert_url: Option<String>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Ownership overview for title deeds of a zoning
    Ownership {
        /// Zoning code (e.g. 612065)
        #[arg(short, long)]
        zoning: i32,

        /// Title deed numbers
        #[arg(short, long, required = true, num_args = 1..)]
        deeds: Vec<i32>,

        #[command(flatten)]
        db: DbArgs,
    },

    /// Full detail of one title deed
    TitleDeed {
        /// Zoning code (e.g. 612065)
        #[arg(short, long)]
        zoning: i32,

        /// Title deed number
        #[arg(short, long)]
        number: i32,

        #[command(flatten)]
        db: DbArgs,
    },
}

/// Database overrides on top of the environment
#[derive(Args)]
pub struct DbArgs {
    /// PostgreSQL host (default: env PGHOST / localhost)
    #[arg(long)]
    host: Option<String>,

    /// PostgreSQL database name (default: env PGDATABASE / vfk)
    #[arg(long)]
    database: Option<String>,

    /// PostgreSQL user (default: env PGUSER / postgres)
    #[arg(long)]
    user: Option<String>,

    /// PostgreSQL password (default: env PGPASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// PostgreSQL port (default: env PGPORT / 5432)
    #[arg(long)]
    port: Option<u16>,

    /// SSL mode: disable, prefer, require (default: env PGSSLMODE / disable)
    #[arg(long)]
    ssl: Option<String>,
}

impl DbArgs {
    fn into_config(self) -> DatabaseConfig {
        let mut config = DatabaseConfig::from_env();
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(database) = self.database {
            config.dbname = database;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if let Some(password) = self.password {
            config.password = Some(password);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ssl) = self.ssl {
            if let Ok(mode) = ssl.parse() {
                config.ssl_mode = mode;
            }
        }
        config
    }
}

async fn connect(db: DbArgs) -> Result<Registry> {
    let config = db.into_config();
    info!(
        host = config.host.as_str(),
        port = config.port,
        dbname = config.dbname.as_str(),
        "Connecting to PostgreSQL"
    );
    let pool = create_pool(&config).await?;
    test_connection(&pool).await?;
    Ok(Registry::new(pool, &config))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Lists the imported datasets
pub async fn cmd_imports(db: DbArgs) -> Result<()> {
    let registry = connect(db).await?;
    let imports = registry.list_imports().await?;
    print_json(&imports)
}

/// Validates an extract head without a database
pub async fn cmd_validate(path: &Path) -> Result<()> {
    let head = vfk::read_head(path)?;
    let report = vfk::check_head(&head);

    match report.identity {
        Some(identity) => {
            println!(
                "Valid extract: zoning {} as of {}",
                identity.zoning_id, identity.valid_date
            );
            Ok(())
        }
        None => {
            for problem in &report.problems {
                eprintln!("- {problem}");
            }
            anyhow::bail!("Extract head is not valid ({} problems)", report.problems.len());
        }
    }
}

/// Imports a VFK extract
pub async fn cmd_import(path: &Path, convert_url: Option<String>, db: DbArgs) -> Result<()> {
    let registry = connect(db).await?;

    let mut convert_config = ConversionConfig::from_env();
    if let Some(url) = convert_url {
        convert_config.base_url = url;
    }
    let converter = ConversionClient::new(&convert_config)?;
    let locks = RegionLocks::new();

    let importer = Importer::new(&registry, &converter, &locks);
    let outcome = importer
        .import_extract(path)
        .await
        .with_context(|| format!("Import failed for {}", path.display()))?;
    print_json(&outcome)
}

/// Ownership overview for title deeds
pub async fn cmd_ownership(zoning: i32, deeds: &[i32], db: DbArgs) -> Result<()> {
    let registry = connect(db).await?;
    let queries = Queries::new(&registry);
    let overviews = queries.ownership_overview(zoning, deeds).await?;
    print_json(&overviews)
}

/// Detail of one title deed
pub async fn cmd_title_deed(zoning: i32, number: i32, db: DbArgs) -> Result<()> {
    let registry = connect(db).await?;
    let queries = Queries::new(&registry);

    match queries.title_deed(zoning, number).await {
        Ok(lookup) => {
            if lookup.title_deed.is_none() {
                info!(zoning, number, "Title deed not found");
            }
            print_json(&lookup)
        }
        Err(Error::ZoningNotFound(code)) => {
            anyhow::bail!("No imported dataset for zoning {code}");
        }
        Err(e) => Err(e.into()),
    }
}
