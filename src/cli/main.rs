mod display;

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use geolocator::config;
use geolocator::coordinator::Coordinator;
use geolocator::progress::BatchControl;
use geolocator::record::ImageRecord;

use display::{
    display_coordinates, display_date, display_name, display_neighborhood, display_place,
    display_status,
};

#[derive(Parser, Debug)]
#[command(
    name = "geolocator",
    version,
    about = "Reverse-geocode photo GPS positions and write country, state, city and neighborhood into IPTC"
)]
struct Cli {
    /// Image files, directories or memory cards to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Preview changes without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Geocoder to use: 0 = local gazetteer, 1 = Google (overrides config)
    #[arg(short, long, value_name = "N")]
    geocoder: Option<usize>,

    /// Reverse geocode only; do not write anything back
    #[arg(long)]
    no_write: bool,

    /// Print a table of the processed images
    #[arg(long)]
    show: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    // Load config and apply CLI overrides
    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if let Some(index) = cli.geocoder {
        config.geocoder.active = index;
    }

    let mut coordinator = Coordinator::from_config(&config)?;

    let total = coordinator.open(&cli.paths).await?;
    if total == 0 {
        anyhow::bail!("No readable image files found in the specified paths.");
    }
    log::info!("Found {total} image(s) to process");
    if config.output.dry_run {
        log::info!("DRY RUN: no files will be modified");
    }

    // Ctrl-C stops dispatching new lookups; in-flight ones finish.
    let control = BatchControl::new();
    let on_interrupt = control.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling remaining lookups");
            on_interrupt.cancel();
        }
    });

    let show_progress = !cli.json && total >= coordinator.geocoder().show_activity_count();
    let geocoded = coordinator
        .reverse_geocode(&control, |p| {
            if show_progress {
                print_progress(p.completed, p.total, &p.message);
            } else {
                log::info!("[{}/{}] {}", p.completed, p.total, p.message);
            }
        })
        .await?;
    interrupt.abort();
    if show_progress {
        println!();
    }

    log::info!(
        "Geocoded: {} resolved, {} skipped, {} failed, {} cancelled out of {}",
        geocoded.resolved,
        geocoded.skipped,
        geocoded.failed,
        geocoded.cancelled,
        geocoded.total
    );

    let written = if cli.no_write || control.is_cancelled() {
        if control.is_cancelled() {
            log::warn!("Batch was cancelled, nothing written");
        }
        None
    } else {
        let summary = coordinator.write_images().await?;
        log::info!(
            "Done: {} written, {} skipped, {} failed",
            summary.written,
            summary.skipped,
            summary.failed
        );
        Some(summary)
    };

    if cli.show {
        print_table(coordinator.images());
    }

    // JSON output
    if cli.json {
        let output = serde_json::json!({
            "geocode": geocoded,
            "write": written,
            "images": coordinator.images(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Rewrite the current terminal line with a progress bar.
fn print_progress(completed: usize, total: usize, message: &str) {
    const WIDTH: usize = 30;
    let filled = if total == 0 { WIDTH } else { completed * WIDTH / total };
    let message: String = message.chars().take(48).collect();
    print!(
        "\r  {GREEN}{}{RESET}{DIM}{}{RESET} {completed}/{total} {message:<48}",
        "█".repeat(filled),
        "░".repeat(WIDTH - filled)
    );
    let _ = std::io::stdout().flush();
}

/// Print every image in the working set with its location.
fn print_table(images: &[ImageRecord]) {
    for image in images {
        println!();
        println!("{BOLD}File:{RESET} {}", image.path.display());
        println!("  {DIM}{}{RESET}", "─".repeat(70));
        print_row("FileName", &display_name(image));
        print_row("DateTimeOriginal", &display_date(image));
        print_row("GPSStatus", &display_status(image));
        print_row("Coordinates", &display_coordinates(image));
        print_row("Place", &display_place(&image.place));
        print_row("Sub-location", &display_neighborhood(&image.place));
        if let Some(route) = image.place.route.as_deref() {
            print_row("Keywords", route);
        }
    }
    println!();
}

/// Print a single row in the display table.
fn print_row(tag: &str, val: &str) {
    println!("  {:<22} : {val}", tag);
}
