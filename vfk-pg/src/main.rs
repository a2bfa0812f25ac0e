//! CLI entry point for vfk-pg

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// Load .env at startup
fn load_env() {
    // Look in the current directory first
    if dotenvy::dotenv().is_err() {
        // Fall back to the binary's directory
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Import and query VFK cadastral extracts in PostgreSQL
#[derive(Parser)]
#[command(name = "vfk-pg")]
#[command(author, version)]
#[command(about = "Import and query VFK cadastral extracts in PostgreSQL")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything else
    load_env();

    let cli = Cli::parse();

    // Configure logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Imports { db } => cli::cmd_imports(db).await?,
        Commands::Validate { path } => cli::cmd_validate(&path).await?,
        Commands::Import {
            path,
            convert_url,
            db,
        } => cli::cmd_import(&path, convert_url, db).await?,
        Commands::Ownership { zoning, deeds, db } => {
            cli::cmd_ownership(zoning, &deeds, db).await?
        }
        Commands::TitleDeed { zoning, number, db } => {
            cli::cmd_title_deed(zoning, number, db).await?
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
