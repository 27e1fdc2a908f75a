//! Update Scanner CLI
//!
//! Track web pages and report the ones that changed since they were last
//! acknowledged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use update_scanner::{
    error::Result,
    models::{Config, Page, SnapshotSlot, StorageBackend},
    pipeline::{Autoscanner, ScanOutcome, ScanReport, Scanner, now_ms},
    services::HttpFetcher,
    storage::{KeyValueStore, LocalStorage, PageStore},
    utils::normalize_url,
};

/// Web page update scanner
#[derive(Parser, Debug)]
#[command(
    name = "update-scanner",
    version,
    about = "Watch web pages for meaningful changes"
)]
struct Cli {
    /// Path to storage directory holding config.toml and page data
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
    /// Start tracking a page
    Add {
        url: String,

        /// Display title (default: the URL)
        #[arg(long)]
        title: Option<String>,

        /// Changed characters needed for a major change
        #[arg(long)]
        threshold: Option<u32>,

        /// Minutes between autoscans, 0 for manual only
        #[arg(long)]
        scan_rate: Option<u32>,

        /// Ignore changes that only touch digits
        #[arg(long)]
        ignore_numbers: Option<bool>,

        /// Fetch with POST using these form parameters
        #[arg(long)]
        post: Option<String>,

        /// Charset label, or "auto"
        #[arg(long)]
        encoding: Option<String>,
    },

    /// List tracked pages
    List,

    /// Show one page record
    Show { id: String },

    /// Stop tracking a page
    Remove { id: String },

    /// Acknowledge a changed page
    Ack { id: String },

    /// Scan the given pages, or all pages
    Scan { ids: Vec<String> },

    /// Scan every page whose scan rate has elapsed
    Autoscan,

    /// Run autoscan until interrupted
    ///
    /// Stop the watcher before running `ack`: the watcher saves the page
    /// records it loaded, so an acknowledgment made while it runs can be
    /// overwritten by its next scan of that page.
    Watch,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_store(config: &Config, storage_dir: &Path) -> Result<Arc<dyn KeyValueStore>> {
    match config.storage.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::new(storage_dir))),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Arc::new(
            update_scanner::storage::S3Storage::from_env().await?,
        )),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(update_scanner::error::AppError::config(
            "storage.backend = \"s3\" requires the s3 feature",
        )),
    }
}

fn build_scanner(config: &Config, pages: PageStore) -> Result<Scanner> {
    let fetcher = HttpFetcher::new(&config.scanner)?;
    Ok(Scanner::new(Arc::new(fetcher), pages, config.scanner.clone()))
}

fn print_report(report: &ScanReport) {
    for (id, outcome) in &report.outcomes {
        match outcome {
            ScanOutcome::Classified(category) => println!("{id:>4}  {category}"),
            ScanOutcome::Failed(message) => println!("{id:>4}  error: {message}"),
        }
    }
    println!(
        "{} scanned, {} newly changed, {} failed",
        report.scanned(),
        report.newly_changed.len(),
        report.failures()
    );
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let loaded = Config::load(&config_path);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = match loaded {
        Ok(config) => {
            log::debug!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                config_path.display(),
                e
            );
            Config::default()
        }
    };

    if let Command::Validate = cli.command {
        log::info!("Validating configuration...");
        if let Err(e) = config.validate() {
            log::error!("Config validation failed: {}", e);
            return Err(e);
        }
        log::info!("Config OK");
        return Ok(());
    }
    config.validate()?;

    let pages = PageStore::new(open_store(&config, &cli.storage_dir).await?);

    match cli.command {
        Command::Add {
            url,
            title,
            threshold,
            scan_rate,
            ignore_numbers,
            post,
            encoding,
        } => {
            let url = normalize_url(&url)?;
            let mut defaults = config.defaults.clone();
            if let Some(threshold) = threshold {
                defaults.change_threshold = threshold;
            }
            if let Some(rate) = scan_rate {
                defaults.scan_rate_minutes = rate;
            }
            if let Some(ignore) = ignore_numbers {
                defaults.ignore_numbers = ignore;
            }
            if let Some(encoding) = encoding {
                defaults.encoding = encoding;
            }

            let mut page = pages.create_page(&url, &defaults).await?;
            if title.is_some() || post.is_some() {
                if let Some(title) = title {
                    page.title = title;
                }
                if let Some(params) = post {
                    page.do_post = true;
                    page.post_params = params;
                }
                pages.save_page(&page).await;
            }
            println!("{}  {}", page.id, page.title);
        }

        Command::List => {
            let all = pages.load_all().await?;
            if all.is_empty() {
                log::info!("No pages tracked yet.");
            }
            for page in &all {
                println!(
                    "{:>4}  {:<9}  {:<5}  {}",
                    page.id,
                    page.state.to_string(),
                    if page.is_error() { "error" } else { "" },
                    page.title
                );
            }
        }

        Command::Show { id } => {
            let page = pages.require_page(&id).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
            for slot in [SnapshotSlot::Old, SnapshotSlot::New] {
                match pages.load_snapshot(&id, slot).await? {
                    Some(body) => println!("{} snapshot: {} bytes", slot.as_str(), body.len()),
                    None => println!("{} snapshot: none", slot.as_str()),
                }
            }
        }

        Command::Remove { id } => {
            pages.require_page(&id).await?;
            pages.delete_page(&id).await;
        }

        Command::Ack { id } => {
            let mut page = pages.require_page(&id).await?;
            if page.is_changed() {
                page.acknowledge();
                pages.save_page(&page).await;
                log::info!("Acknowledged page {}", id);
            } else {
                log::info!("Page {} has no unacknowledged change", id);
            }
        }

        Command::Scan { ids } => {
            let mut batch: Vec<Page> = if ids.is_empty() {
                pages.load_all().await?
            } else {
                let mut batch = Vec::with_capacity(ids.len());
                for id in &ids {
                    batch.push(pages.require_page(id).await?);
                }
                batch
            };

            let scanner = build_scanner(&config, pages)?;
            let report = scanner.scan_all(&mut batch).await;
            scanner.shutdown().await;
            print_report(&report);
        }

        Command::Autoscan => {
            let autoscanner = Autoscanner::new(build_scanner(&config, pages)?, &config.autoscan);
            let report = autoscanner.run_once(now_ms()).await;
            autoscanner.into_scanner().shutdown().await;
            print_report(&report?);
        }

        Command::Watch => {
            let autoscanner = Autoscanner::new(build_scanner(&config, pages)?, &config.autoscan);
            log::info!(
                "Watching pages every {}s, press Ctrl-C to stop",
                config.autoscan.poll_interval_secs
            );
            autoscanner
                .run_forever(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        log::error!("Failed to listen for Ctrl-C: {}", e);
                    }
                })
                .await;
            autoscanner.into_scanner().shutdown().await;
        }

        Command::Validate => {}
    }

    Ok(())
}
