use std::path::PathBuf;

use anyhow::Result;
use ccdcal_core::pipeline::combine_darks;
use ccdcal_core::pipeline::config::DarkConfig;
use ccdcal_core::stack::{ClipCenter, ClipDeviation, CombineConfig, CombineMethod};
use clap::{Args, ValueEnum};

use crate::progress::BarReporter;
use crate::summary::print_combined_darks;

#[derive(Clone, ValueEnum)]
pub enum CombineMethodArg {
    Average,
    Median,
}

#[derive(Clone, ValueEnum)]
pub enum ClipCenterArg {
    Median,
    Mean,
}

#[derive(Clone, ValueEnum)]
pub enum ClipDeviationArg {
    Std,
    MadStd,
}

/// Sigma-clipped combination options shared by commands that combine frames.
#[derive(Args)]
pub struct CombineArgs {
    /// Combination method
    #[arg(long, value_enum, default_value = "average")]
    pub method: CombineMethodArg,

    /// Lower clipping bound in deviations
    #[arg(long, default_value = "5.0")]
    pub clip_low: f64,

    /// Upper clipping bound in deviations
    #[arg(long, default_value = "5.0")]
    pub clip_high: f64,

    /// Clipping center
    #[arg(long, value_enum, default_value = "median")]
    pub clip_center: ClipCenterArg,

    /// Clipping deviation estimate
    #[arg(long, value_enum, default_value = "mad-std")]
    pub clip_deviation: ClipDeviationArg,

    /// Clipping passes (0 disables clipping)
    #[arg(long, default_value = "1")]
    pub clip_iterations: usize,

    /// Memory budget per chunk in MB
    #[arg(long, default_value = "350")]
    pub mem_limit_mb: usize,
}

impl CombineArgs {
    pub fn to_config(&self) -> CombineConfig {
        CombineConfig {
            method: match self.method {
                CombineMethodArg::Average => CombineMethod::Average,
                CombineMethodArg::Median => CombineMethod::Median,
            },
            clip_low: self.clip_low,
            clip_high: self.clip_high,
            clip_center: match self.clip_center {
                ClipCenterArg::Median => ClipCenter::Median,
                ClipCenterArg::Mean => ClipCenter::Mean,
            },
            clip_deviation: match self.clip_deviation {
                ClipDeviationArg::Std => ClipDeviation::Std,
                ClipDeviationArg::MadStd => ClipDeviation::MadStd,
            },
            iterations: self.clip_iterations,
            memory_limit_bytes: self.mem_limit_mb.saturating_mul(1_000_000),
        }
    }
}

#[derive(Args)]
pub struct CombineDarksArgs {
    /// Directory containing raw dark frames
    pub input: PathBuf,

    /// Directory for combined darks
    #[arg(short, long, default_value = "combined")]
    pub output: PathBuf,

    #[command(flatten)]
    pub combine: CombineArgs,
}

pub fn run(args: &CombineDarksArgs) -> Result<()> {
    let config = DarkConfig {
        input_dir: args.input.clone(),
        output_dir: args.output.clone(),
        combine: args.combine.to_config(),
    };

    let reporter = BarReporter::new();
    let combined = combine_darks(&config, &reporter)?;
    reporter.finish();

    print_combined_darks(&combined);
    Ok(())
}
