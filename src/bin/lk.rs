use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use lorekeeper::catalog::{sync_catalog, RavensburgerCatalog};
use lorekeeper::images::ImageSink;
use lorekeeper::normalization::matching::strategy_by_name;
use lorekeeper::prices::{reconcile_prices, TcgCsvFeed};
use lorekeeper::store::legacy::export_legacy;
use lorekeeper::store::CardStore;
use lorekeeper::util::env;
use lorekeeper::util::tracing::init_tracing;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "lk", version, about = "Card catalog and price sync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Download the card catalog, resolve variants, and store the result
    SyncCatalog {
        /// SQLite database path
        #[arg(long, default_value = "cards.db")]
        db: PathBuf,
        /// Comma-separated language codes to fetch
        #[arg(long, value_delimiter = ',', default_values_t = ["de".to_string(), "en".to_string(), "fr".to_string(), "it".to_string()])]
        languages: Vec<String>,
        /// Also download card images under this directory
        #[arg(long)]
        images_dir: Option<PathBuf>,
        /// Also dump every fetched card as a pretty JSON file under this directory
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
    /// Download the price feed and update matched catalog rows
    SyncPrices {
        /// SQLite database path
        #[arg(long, default_value = "cards.db")]
        db: PathBuf,
        /// Matching strategy name
        #[arg(long, default_value = "token-normalized")]
        strategy: String,
        /// Optional override for the price feed base URL
        #[arg(long)]
        feed_url: Option<String>,
    },
    /// Export the store into a second database in the legacy column layout
    ExportLegacy {
        /// SQLite database path
        #[arg(long, default_value = "cards.db")]
        db: PathBuf,
        /// Destination database path
        #[arg(long, default_value = "cards_legacy.db")]
        dest: PathBuf,
    },
    /// Print row counts for the card store
    DbCounts {
        /// SQLite database path
        #[arg(long, default_value = "cards.db")]
        db: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("lk");
    init_tracing("info")?;

    let cli = Cli::parse();

    match cli.command {
        Commands::SyncCatalog {
            db,
            languages,
            images_dir,
            dump_dir,
        } => {
            let store = CardStore::open(&db)?;
            let mut source = RavensburgerCatalog::connect().await?;
            if let Some(dir) = dump_dir {
                source = source.with_dump_dir(dir);
            }
            let sink = match images_dir {
                Some(dir) => Some(ImageSink::new(dir)?),
                None => None,
            };
            let report = sync_catalog(&source, &store, sink.as_ref(), &languages).await?;
            info!(
                fetched = report.fetched,
                kept = report.resolve.kept,
                dropped = report.resolve.dropped,
                malformed = report.resolve.malformed,
                stored = report.stored,
                "sync-catalog: completed"
            );
            println!(
                "catalog sync: {} fetched, {} kept, {} dropped, {} stored",
                report.fetched, report.resolve.kept, report.resolve.dropped, report.stored
            );
            if let Some(images) = report.images {
                println!(
                    "images: {} written, {} already present, {} failed",
                    images.written, images.skipped_existing, images.failed
                );
            }
        }
        Commands::SyncPrices {
            db,
            strategy,
            feed_url,
        } => {
            let store = CardStore::open(&db)?;
            let feed = TcgCsvFeed::new(feed_url)?;
            let strategy = strategy_by_name(&strategy)
                .ok_or_else(|| anyhow!("unknown matching strategy: {strategy}"))?;
            let report = reconcile_prices(&store, &feed, strategy.as_ref()).await?;
            println!(
                "price sync: {} groups, {} rows, {} updated, {} skipped (subtype), {} unmatched",
                report.groups,
                report.rows,
                report.updated,
                report.skipped_subtype,
                report.unmatched
            );
            if !report.unmatched_sample.is_empty() {
                println!("unmatched sample: {}", report.unmatched_sample.join(", "));
            }
        }
        Commands::ExportLegacy { db, dest } => {
            let store = CardStore::open(&db)?;
            let count = export_legacy(&store, &dest)?;
            println!("legacy export: {count} rows written to {}", dest.display());
        }
        Commands::DbCounts { db } => {
            let store = CardStore::open(&db)?;
            println!("cards: {}", store.count_cards()?);
        }
    }

    Ok(())
}
