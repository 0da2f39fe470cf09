//! polydown - batch downloader for Poly Haven HDRIs, textures and models

mod display;

use anyhow::Result;
use clap::Parser;
use polydown::catalog::{CategoryFilter, HdriFormat, DEFAULT_API_URL};
use polydown::download::{Cancellation, DEFAULT_CONCURRENCY};
use polydown::runner::{RunConfig, RunOutcome, RunSummary, Runner, DEFAULT_METADATA_CONCURRENCY};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use display::Display;

#[derive(Parser, Debug)]
#[command(name = "polydown")]
#[command(version)]
#[command(about = "Batch downloader for Poly Haven assets")]
struct Cli {
    /// Asset type: hdris, textures or models
    asset_type: String,

    /// Download folder (created if missing)
    #[arg(short, long, default_value = ".")]
    folder: PathBuf,

    /// Category to download; pass -c without a value to list the categories
    #[arg(short, long, num_args = 0..=1, default_missing_value = "")]
    category: Option<String>,

    /// Sizes to download, e.g. -s 1k 2k (default: all)
    #[arg(short, long, num_args = 1..)]
    sizes: Vec<String>,

    /// Maximum number of assets to process
    #[arg(long)]
    iters: Option<usize>,

    /// HDRI file format (default: both, exr first)
    #[arg(long, value_enum)]
    format: Option<HdriFormat>,

    /// Re-download files that already exist
    #[arg(short, long)]
    overwrite: bool,

    /// Also download the 8K tonemapped JPG (hdris only)
    #[arg(short, long)]
    tone: bool,

    /// Skip preview and render images
    #[arg(long)]
    noimgs: bool,

    /// Maximum concurrent downloads
    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrent: usize,

    /// Maximum concurrent metadata requests
    #[arg(long, default_value_t = DEFAULT_METADATA_CONCURRENCY)]
    metadata_concurrency: usize,

    /// Catalog API base URL
    #[arg(long, env = "POLYDOWN_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            asset_type: self.asset_type,
            category: CategoryFilter::from_arg(self.category),
            output_dir: self.folder,
            sizes: self.sizes,
            max_assets: self.iters,
            format: self.format,
            overwrite: self.overwrite,
            tonemapped: self.tone,
            include_images: !self.noimgs,
            concurrency: self.concurrent,
            metadata_concurrency: self.metadata_concurrency,
            api_url: self.api_url,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(if cli.verbose { "polydown=debug".parse()? } else { "polydown=warn".parse()? }),
            )
            .init();
    }

    let started = Instant::now();
    let config = cli.into_config();

    let (cancel_handle, cancel) = Cancellation::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_handle.cancel();
            // A second Ctrl-C stops waiting for a graceful shutdown
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nAborted.");
                std::process::exit(130);
            }
        }
    });

    let runner = Runner::new(config)?;
    let display = Display::new();
    let outcome = runner
        .with_events(display.callback())
        .with_cancellation(cancel)
        .run()
        .await;
    display.finish();

    match outcome? {
        RunOutcome::Categories {
            asset_type,
            categories,
        } => {
            println!("There are {} available categories for {}:", categories.len(), asset_type);
            for category in &categories {
                println!("  {}", category);
            }
        }
        RunOutcome::Cancelled => {
            println!("\nOperation cancelled by user.");
            println!("Total runtime: {:.1?}", started.elapsed());
        }
        RunOutcome::Finished(summary) => print_summary(&summary, started.elapsed()),
    }

    Ok(())
}

fn print_summary(summary: &RunSummary, elapsed: Duration) {
    let result = &summary.result;

    if summary.tasks == 0 && !summary.cancelled() {
        println!("No files to download matching criteria.");
    }

    println!("\n=== Summary ===");
    println!("Assets:     {} ({})", summary.assets, summary.asset_type);
    println!("Downloaded: {}", result.downloaded);
    println!("Existing:   {}", result.existing);
    println!("Failed:     {}", result.failed);

    if result.corrupted > 0 {
        println!("\nCorrupted (unverified): {}", result.corrupted);
        for filename in &result.corrupted_files {
            println!("  {} (MD5 mismatch)", filename);
        }
        if result.failed > 0 {
            println!("  {} failed downloads, listed below", result.failed);
        }
    }

    if !result.failed_files.is_empty() {
        println!("\nFailed downloads:");
        for failed in &result.failed_files {
            println!("  {} - {}", failed.filename, failed.error);
        }
    }

    if !summary.metadata_failures.is_empty() {
        println!("\nAssets with unavailable metadata:");
        for failure in &summary.metadata_failures {
            println!("  {} - {}", failure.asset_id, failure.error);
        }
    }

    if summary.cancelled() {
        println!("\nOperation cancelled by user. {} files not downloaded.", result.not_run);
    }

    println!("\nFiles saved to {}", summary.output_dir.display());
    println!("Total runtime: {:.1?}", elapsed);
}
