use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use image_sorter_core::config::LogLevel;
use image_sorter_core::logging::{init_logger, LOG_LEVEL_ENV};
use image_sorter_core::{Config, ImageSorter, IndexStage};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "image-sorter")]
#[command(about = "Browse a directory of images by visual similarity")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs to rotating files in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash the images of a directory and rebuild the similarity index
    Index {
        /// Directory containing the images
        directory: PathBuf,

        /// Number of hash workers (0 = one per CPU core)
        #[arg(short, long)]
        workers: Option<usize>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// List the images most similar to one image
    Similar {
        /// Directory containing the images
        directory: PathBuf,

        /// File name of the image to look up
        file_name: String,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Load a directory into the image cache and report its memory use
    Cache {
        /// Directory containing the images
        directory: PathBuf,

        /// Decode every image at full resolution, not just the first
        #[arg(long)]
        full: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "image-sorter.json")]
        path: PathBuf,
    },
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Index {
            directory,
            workers,
            common,
        } => {
            let mut config = load_config(&common)?;
            if let Some(workers) = workers {
                config.hash_workers = workers;
            }
            run_index(config, &directory)
        }

        Commands::Similar {
            directory,
            file_name,
            common,
        } => run_similar(load_config(&common)?, &directory, &file_name),

        Commands::Cache {
            directory,
            full,
            common,
        } => run_cache(load_config(&common)?, &directory, full),

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}

/// Read the configuration, apply command line overrides and set up logging
fn load_config(common: &CommonArgs) -> anyhow::Result<Config> {
    let mut config = match &common.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    // Set log level based on verbosity
    config.log_level = match common.verbose {
        0 => config.log_level,
        1 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };
    if common.log_dir.is_some() {
        config.log_dir = common.log_dir.clone();
    }

    config.validate()?;

    let level = config.log_level.to_level_filter();
    match &config.log_dir {
        Some(log_dir) => init_logger(log_dir, level).map_err(|e| anyhow!("{}", e))?,
        None => env_logger::Builder::new()
            .filter_level(level)
            .parse_env(LOG_LEVEL_ENV)
            .init(),
    }

    Ok(config)
}

fn progress_bar(len: u64) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{eta}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")?
            .progress_chars("##-"),
    );
    Ok(bar)
}

fn run_index(config: Config, directory: &Path) -> anyhow::Result<()> {
    let mut sorter = ImageSorter::new(config)?;
    let count = sorter.open_directory(directory)?.len();
    if count == 0 {
        println!("No images found in {}", directory.display());
        return Ok(());
    }

    // Ctrl-C stops the hash workers; hashes computed so far are kept
    let calculator = sorter.hash_calculator();
    ctrlc::set_handler(move || calculator.stop_hashes())?;

    let bar = progress_bar(count as u64)?;
    let mut current = None;
    let outcome = sorter.index_similar_images(|stage, done, total| {
        if current != Some(stage) {
            current = Some(stage);
            bar.set_length(total as u64);
            bar.set_message(match stage {
                IndexStage::Hashing => "Computing image hashes...",
                IndexStage::Indexing => "Writing similarity index...",
            });
        }
        bar.set_position(done as u64);
    })?;
    bar.finish_and_clear();

    if outcome.is_cancelled() {
        warn!("Indexing interrupted");
        println!(
            "Interrupted after hashing {} of {} images; the previous index was kept",
            outcome.hashes().len(),
            count
        );
    } else {
        info!("Indexing complete");
        println!(
            "Indexed {} of {} images ({} similarity edges)",
            outcome.hashes().len(),
            count,
            sorter.database().similar_image_count()?
        );
    }
    Ok(())
}

fn run_similar(config: Config, directory: &Path, file_name: &str) -> anyhow::Result<()> {
    let mut sorter = ImageSorter::new(config)?;
    sorter.open_directory(directory)?;

    let image = sorter
        .find_image(file_name)
        .ok_or_else(|| anyhow!("{} is not an image in {}", file_name, directory.display()))?;

    let similar = sorter.similar_images(image.id)?;
    if similar.is_empty() {
        println!("No similar images recorded for {}; run `index` first", file_name);
        return Ok(());
    }

    let edges = sorter.database().get_similar_image_edges(image.id)?;
    for (similar_image, edge) in similar.iter().zip(&edges) {
        println!(
            "{:>3}  {:>2}  {}",
            edge.rank + 1,
            edge.distance,
            similar_image.path().display()
        );
    }
    Ok(())
}

fn run_cache(config: Config, directory: &Path, full: bool) -> anyhow::Result<()> {
    let mut sorter = ImageSorter::new(config)?;
    let images = sorter.open_directory(directory)?.to_vec();
    let cache = sorter.cache();

    println!(
        "{} images, thumbnails use {:.1}MB",
        cache.len(),
        cache.get_size_in_mb()
    );

    // Every image with --full, otherwise just the first one
    let targets = if full { &images[..] } else { &images[..images.len().min(1)] };

    let bar = progress_bar(targets.len() as u64)?;
    bar.set_message("Decoding full images...");
    let mut failed = 0usize;
    for image in targets {
        if cache.get_full(image).is_err() {
            failed += 1;
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "{} full images use {:.1}MB ({} failed to decode)",
        targets.len(),
        cache.get_size_in_mb(),
        failed
    );
    cache.purge();
    println!("After purge: {:.1}MB", cache.get_size_in_mb());
    Ok(())
}
