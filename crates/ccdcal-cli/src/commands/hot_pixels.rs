use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdcal_core::io::fits::{load_frame, save_mask};
use ccdcal_core::io::naming::MASK_FROM_DARK_CURRENT;
use ccdcal_core::mask::{classify_hot_pixels, HotPixelConfig};
use clap::Args;

use crate::summary::print_hot_pixels;

#[derive(Args)]
pub struct HotPixelArgs {
    /// Combined dark with the shorter exposure
    #[arg(long)]
    pub short: PathBuf,

    /// Combined dark with the longer exposure
    #[arg(long)]
    pub long: PathBuf,

    /// Long-exposure dark current (e-/s) above which a pixel is a candidate
    #[arg(long)]
    pub long_threshold: f64,

    /// Short-exposure dark current (e-/s) above which a candidate is bad
    #[arg(long)]
    pub short_threshold: f64,

    /// Output mask path
    #[arg(short, long, default_value = MASK_FROM_DARK_CURRENT)]
    pub output: PathBuf,
}

pub fn run(args: &HotPixelArgs) -> Result<()> {
    let short = load_frame(&args.short)
        .with_context(|| format!("Failed to read {}", args.short.display()))?;
    let long = load_frame(&args.long)
        .with_context(|| format!("Failed to read {}", args.long.display()))?;

    let config = HotPixelConfig {
        long_threshold: args.long_threshold,
        short_threshold: args.short_threshold,
    };
    let result = classify_hot_pixels(&short, &long, &config)?;

    save_mask(&result.hot, &args.output)?;
    print_hot_pixels(&config, &result);
    println!("Mask saved to {}", args.output.display());
    Ok(())
}
