//! Salestage CLI - staged sales-transaction imports
//!
//! # Main Commands
//!
//! ```bash
//! salestage serve                      # Start HTTP server (port 3000)
//! salestage check input.csv --company us   # Dry-run parse + validate a file
//! salestage batches                    # List import batches in the store
//! ```

use clap::{Parser, Subcommand};
use salestage::{parse_upload, BatchQueries, ImportConfig, StagingStore};
use std::path::PathBuf;

const DEFAULT_DB_URL: &str = "sqlite://salestage.db";

#[derive(Parser)]
#[command(name = "salestage")]
#[command(about = "Staged import, review and commit for sales transactions", long_about = None)]
struct Cli {
    /// Path to a TOML config file (defaults to built-in company registry)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// SQLite database URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DB_URL)]
        db: String,
    },

    /// Parse and validate a file without staging anything
    Check {
        /// Input file
        input: PathBuf,

        /// Source company code
        #[arg(short, long)]
        company: String,

        /// Reject the whole batch if any row is invalid
        #[arg(long)]
        strict: bool,
    },

    /// List import batches in the store
    Batches {
        /// SQLite database URL
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DB_URL)]
        db: String,

        /// Only show batches for this company code
        #[arg(short, long)]
        company: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "salestage=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve { port, db } => cmd_serve(port, &db, config).await,
        Commands::Check { input, company, strict } => cmd_check(&input, &company, strict, &config),
        Commands::Batches { db, company } => cmd_batches(&db, company.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ImportConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ImportConfig::from_path(path)?),
        None => Ok(ImportConfig::default()),
    }
}

async fn cmd_serve(
    port: u16,
    db: &str,
    config: ImportConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = StagingStore::open(db).await?;
    let state = salestage::server::AppState::new(store, config);
    salestage::server::start_server(port, state).await?;
    Ok(())
}

fn cmd_check(
    input: &std::path::Path,
    company: &str,
    strict: bool,
    config: &ImportConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = std::fs::read(input)?;
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv");

    let outcome = parse_upload(&bytes, file_name, company, "cli", strict, config)?;
    let batch = &outcome.batch;

    eprintln!("File:      {}", input.display());
    eprintln!("Encoding:  {}", outcome.encoding);
    eprintln!(
        "Delimiter: '{}'",
        match outcome.delimiter {
            '\t' => "\\t".to_string(),
            c => c.to_string(),
        }
    );
    eprintln!("Status:    {}", batch.status);
    eprintln!(
        "Rows:      {} total, {} valid, {} invalid",
        batch.total_rows, batch.valid_rows, batch.error_rows
    );

    let errors = outcome.row_errors();
    for (row_number, row_errors) in errors.iter().take(10) {
        eprintln!("\nRow {}:", row_number);
        for error in row_errors {
            eprintln!("  - {}", error);
        }
    }
    if errors.len() > 10 {
        eprintln!("\n... and {} more rows with errors", errors.len() - 10);
    }

    if batch.error_rows > 0 {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_batches(db: &str, company: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let store = StagingStore::open(db).await?;
    let queries = BatchQueries::new(&store);
    let summaries = queries.list(company).await?;

    if summaries.is_empty() {
        eprintln!("No import batches found.");
        return Ok(());
    }

    for s in summaries {
        println!("{} [{}] {}", s.id, s.status, s.file_name);
        println!(
            "    company: {}  uploaded: {} by {}",
            s.source_company,
            s.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
            s.uploaded_by
        );
        println!(
            "    rows: {} total, {} valid, {} invalid",
            s.total_rows, s.valid_rows, s.error_rows
        );
        if let (Some(at), Some(by)) = (&s.committed_at, &s.committed_by) {
            println!("    committed: {} by {}", at.format("%Y-%m-%d %H:%M:%S"), by);
        }
        println!();
    }

    Ok(())
}
