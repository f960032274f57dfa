//! Clinic Crawler CLI
//!
//! Extracts store locations from a site and saves them as CSV.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clinic_crawler::{
    error::{AppError, Result},
    export,
    models::Config,
    services::{ImageCollector, ProgressEvent, StoreCrawler},
    utils::http,
};
use tokio::sync::mpsc;

/// Clinic Crawler - store location extractor
#[derive(Parser, Debug)]
#[command(
    name = "clinic-crawler",
    version,
    about = "Extract clinic and store locations from business websites"
)]
struct Cli {
    /// Path to storage directory containing config.toml
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a store page or store listing and export the records as CSV
    Scrape {
        url: String,

        /// Output CSV file (default: a timestamped file in output.dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List store images of a site
    Images {
        url: String,

        /// Download the images into the output directory
        #[arg(long)]
        download: bool,
    },

    /// Print the extracted record and link candidates of one page as JSON
    Inspect { url: String },

    /// Validate configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn log_progress(event: &ProgressEvent) {
    match event {
        ProgressEvent::PageLoaded { url } => log::info!("Page loaded: {}", url),
        ProgressEvent::ListingDetected { total } => {
            log::info!("Listing detected, {} store pages to visit", total)
        }
        ProgressEvent::DetailStarted {
            index, total, label, ..
        } => log::info!("Processing {}/{}: {}", index, total, label),
        ProgressEvent::DetailFailed { url, error } => log::warn!("Failed {}: {}", url, error),
        ProgressEvent::RecordAdded { count } => log::debug!("{} records", count),
        ProgressEvent::Finished { records } => log::info!("Finished with {} records", records),
    }
}

fn report(error: &AppError) {
    if error.is_timeout() {
        log::error!("Timed out: {}", error);
    } else if error.is_fetch_error() {
        log::error!("Could not load page: {}", error);
    } else {
        log::error!("Processing failed: {}", error);
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Command::Scrape { url, output } => {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let progress = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    log_progress(&event);
                }
            });

            let crawler = StoreCrawler::new(&config.crawler)?.with_progress(tx);
            let outcome = crawler.crawl(&url).await;
            drop(crawler);
            let _ = progress.await;
            let outcome = outcome?;

            if outcome.records.is_empty() {
                log::warn!("No store information found on {}", url);
                return Ok(());
            }

            for record in &outcome.records {
                log::info!(
                    "{} | {} | {} ({}%)",
                    record.name,
                    record.address,
                    record.access,
                    record.overall_confidence().round()
                );
            }

            match output {
                Some(path) => export::write_file(&path, &outcome.records)?,
                None => {
                    export::save_records(&config.output.dir, &outcome.records, &url)?;
                }
            }
        }

        Command::Images { url, download } => {
            let collector = ImageCollector::new(&config.crawler)?;
            let images = collector.collect(&url).await?;
            if images.is_empty() {
                log::warn!("No store images found on {}", url);
                return Ok(());
            }
            for image in &images {
                println!("{}", image);
            }

            if download {
                let dir = PathBuf::from(&config.output.dir);
                let report = collector.download(&images, &dir, &url).await?;
                log::info!(
                    "Saved {} images to {} ({} failed)",
                    report.saved.len(),
                    report.directory.display(),
                    report.failed
                );
            }
        }

        Command::Inspect { url } => {
            let client = http::create_async_client(&config.crawler)?;
            let body = http::fetch_html(&client, &url).await?;
            let crawler = StoreCrawler::new(&config.crawler)?;
            let (record, links) = crawler.analyze_page(&body, &url);
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "record": record,
                "links": links,
            }))?;
            println!("{}", json);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    if let Err(e) = run(cli, config).await {
        report(&e);
        return Err(e);
    }

    Ok(())
}
