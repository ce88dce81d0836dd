use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdcal_core::cosmic::{Connectivity, LaCosmicParams, LabelConfig};
use ccdcal_core::io::fits::{load_mask, save_frame, save_mask};
use ccdcal_core::io::naming::COSMIC_RAY_MASK;
use ccdcal_core::pipeline::config::CosmicRayConfig;
use ccdcal_core::pipeline::find_cosmic_rays;
use clap::{Args, ValueEnum};

use crate::progress::BarReporter;
use crate::summary::print_cosmic_rays;

#[derive(Clone, ValueEnum)]
pub enum ConnectivityArg {
    Four,
    Eight,
}

#[derive(Args)]
pub struct CosmicRayArgs {
    /// Science frame
    pub file: PathBuf,

    /// Defect masks to apply before detection (repeatable)
    #[arg(long = "mask")]
    pub masks: Vec<PathBuf>,

    /// Detector gain in e-/ADU
    #[arg(long)]
    pub gain: f64,

    /// Read noise in electrons
    #[arg(long)]
    pub read_noise: f64,

    /// Detection limit in sigma
    #[arg(long, default_value = "4.5")]
    pub sigma_clip: f64,

    /// Neighbour growth limit as a fraction of the detection limit
    #[arg(long, default_value = "0.3")]
    pub sigma_frac: f64,

    /// Minimum Laplacian to fine-structure contrast
    #[arg(long, default_value = "5.0")]
    pub obj_lim: f64,

    /// Maximum detection passes
    #[arg(long, default_value = "4")]
    pub iterations: usize,

    /// Pixel neighbourhood used to group events
    #[arg(long, value_enum, default_value = "eight")]
    pub connectivity: ConnectivityArg,

    /// Minimum event size in pixels
    #[arg(long, default_value = "1")]
    pub min_pixels: usize,

    /// Cosmic-ray-only mask output path
    #[arg(short, long, default_value = COSMIC_RAY_MASK)]
    pub output: PathBuf,

    /// Also write the cleaned frame here
    #[arg(long)]
    pub cleaned: Option<PathBuf>,
}

pub fn run(args: &CosmicRayArgs, verbose: bool) -> Result<()> {
    let masks = args
        .masks
        .iter()
        .map(|p| load_mask(p).with_context(|| format!("Failed to read {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<_> = masks.iter().collect();
    let defect = if refs.is_empty() {
        None
    } else {
        Some(ccdcal_core::mask::combine(&refs)?)
    };

    let config = CosmicRayConfig {
        science: args.file.clone(),
        lacosmic: LaCosmicParams {
            gain: args.gain,
            read_noise: args.read_noise,
            sigma_clip: args.sigma_clip,
            sigma_frac: args.sigma_frac,
            obj_lim: args.obj_lim,
            iterations: args.iterations,
            verbose,
        },
        label: LabelConfig {
            connectivity: match args.connectivity {
                ConnectivityArg::Four => Connectivity::Four,
                ConnectivityArg::Eight => Connectivity::Eight,
            },
            min_pixels: args.min_pixels,
            ..Default::default()
        },
    };

    let reporter = BarReporter::new();
    let (cleaned, review) = find_cosmic_rays(&config, defect.as_ref(), &reporter)?;
    reporter.finish();

    save_mask(&review.mask, &args.output)?;
    if let Some(ref path) = args.cleaned {
        save_frame(&cleaned, path)?;
        println!("Cleaned frame saved to {}", path.display());
    }

    print_cosmic_rays(&config.label, &review);
    println!("Mask saved to {}", args.output.display());
    Ok(())
}
