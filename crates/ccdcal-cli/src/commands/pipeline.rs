use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use ccdcal_core::pipeline::config::PipelineConfig;
use ccdcal_core::pipeline::run_pipeline_reported;
use clap::Args;
use tracing::info;

use crate::progress::BarReporter;
use crate::summary::{
    print_combined_darks, print_cosmic_rays, print_hot_pixels, print_pipeline_summary,
};

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline config file (TOML)
    pub config: PathBuf,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let config: PipelineConfig = toml::from_str(&contents).context("Invalid pipeline config")?;
    info!(path = %args.config.display(), "Pipeline config loaded");

    print_pipeline_summary(&config);

    let reporter = Arc::new(BarReporter::new());
    let output = run_pipeline_reported(&config, reporter.clone())?;
    reporter.finish();

    print_combined_darks(&output.combined_darks);
    if let (Some(hot_config), Some(hot)) = (&config.hot_pixels, &output.hot_pixels) {
        print_hot_pixels(&hot_config.thresholds, hot);
    }
    if let Some(ref mask) = output.defect_mask {
        println!("  Defect mask: {} pixels flagged", mask.count());
        println!();
    }
    if let (Some(cr_config), Some(review)) = (&config.cosmic_rays, &output.cosmic_rays) {
        print_cosmic_rays(&cr_config.label, review);
    }

    println!("Outputs written to {}", config.darks.output_dir.display());
    Ok(())
}
