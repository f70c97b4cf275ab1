mod commands;
mod config;
mod price_client;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{AddArgs, EditArgs, cmd_add, cmd_cost, cmd_edit, cmd_list, cmd_status, cmd_sync};
use crate::config::Config;
use bakecost_core::service::CatalogService;

#[derive(Parser)]
#[command(
    name = "bakecost",
    version,
    about = "Bakery ingredient price catalog with online price sync"
)]
struct Cli {
    /// Catalog file (default: $BAKECOST_CATALOG or the data directory)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,
    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh prices of external ingredients from the shop
    Sync {
        /// Fetch and merge, but do not write the catalog
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List ingredients in the catalog
    List {
        /// Filter by name
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an ingredient by hand
    Add {
        /// Ingredient name
        name: String,
        /// Package price
        #[arg(long)]
        price: f64,
        /// Package size as a number, in the ingredient's unit (e.g. 500)
        #[arg(long)]
        size: String,
        /// Unit: g, ml or ks
        #[arg(short, long, default_value = "g")]
        unit: String,
        /// Category (default: Vlastní)
        #[arg(short, long)]
        category: Option<String>,
        /// Shop product ID, makes the ingredient syncable
        #[arg(long, conflicts_with = "url")]
        external_id: Option<String>,
        /// Shop product URL to take the product ID from
        #[arg(long)]
        url: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit an ingredient and recompute its unit price
    Edit {
        /// Ingredient ID
        id: String,
        /// New package price
        #[arg(long)]
        price: Option<f64>,
        /// New package size (number only, keeps the unit)
        #[arg(long)]
        size: Option<f64>,
        /// New unit: g, ml or ks
        #[arg(short, long)]
        unit: Option<String>,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New category
        #[arg(short, long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the sync health of external ingredients
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Cost a saved recipe against current catalog prices
    Cost {
        /// Recipe JSON file ({name, portions, items: [{id, quantity}]})
        file: PathBuf,
        /// Override the recipe's portion count
        #[arg(short, long)]
        portions: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?.with_catalog(cli.catalog);
    tracing::debug!(catalog = %config.catalog_path.display(), "using catalog");
    let service = CatalogService::open(&config.catalog_path);

    match cli.command {
        Commands::Sync { dry_run, json } => cmd_sync(&config, dry_run, json).await,
        Commands::List { search, json } => cmd_list(&service, search.as_deref(), json),
        Commands::Add {
            name,
            price,
            size,
            unit,
            category,
            external_id,
            url,
            json,
        } => cmd_add(
            &service,
            AddArgs {
                name,
                price,
                size,
                unit,
                category,
                external_id,
                url,
            },
            json,
        ),
        Commands::Edit {
            id,
            price,
            size,
            unit,
            name,
            category,
            json,
        } => cmd_edit(
            &service,
            &id,
            EditArgs {
                price,
                size,
                unit,
                name,
                category,
            },
            json,
        ),
        Commands::Status { json } => cmd_status(&service, json),
        Commands::Cost {
            file,
            portions,
            json,
        } => cmd_cost(&service, &file, portions, json),
    }
}
