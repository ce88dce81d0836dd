mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ccdcal", about = "CCD dark-current, hot-pixel and cosmic-ray masking")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show FITS header metadata, or summarize a directory of frames
    Info(commands::info::InfoArgs),
    /// Combine dark frames per exposure time
    CombineDarks(commands::combine_darks::CombineDarksArgs),
    /// Derive a hot-pixel mask from a short and a long dark
    HotPixels(commands::hot_pixels::HotPixelArgs),
    /// OR defect masks together, optionally removing known defects
    CombineMasks(commands::masks::CombineMasksArgs),
    /// Detect cosmic rays and group them into events
    CosmicRays(commands::cosmic_rays::CosmicRayArgs),
    /// Print a template pipeline config
    Config(commands::config::ConfigArgs),
    /// Run the full pipeline from a config file
    Run(commands::pipeline::RunArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::CombineDarks(args) => commands::combine_darks::run(args),
        Commands::HotPixels(args) => commands::hot_pixels::run(args),
        Commands::CombineMasks(args) => commands::masks::run(args),
        Commands::CosmicRays(args) => commands::cosmic_rays::run(args, cli.verbose),
        Commands::Config(args) => commands::config::run(args),
        Commands::Run(args) => commands::pipeline::run(args),
    }
}
