use std::path::PathBuf;

use anyhow::{Context, Result};
use ccdcal_core::cosmic::{LaCosmicParams, LabelConfig};
use ccdcal_core::mask::HotPixelConfig;
use ccdcal_core::pipeline::config::{
    CosmicRayConfig, DarkConfig, HotPixelStageConfig, MaskConfig, PipelineConfig,
};
use ccdcal_core::stack::CombineConfig;
use clap::Args;

#[derive(Args)]
pub struct ConfigArgs {
    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Template config. Thresholds are placeholders to be read off a plot of
/// short- vs long-exposure dark current for the camera at hand.
pub fn template_config() -> PipelineConfig {
    PipelineConfig {
        darks: DarkConfig {
            input_dir: PathBuf::from("raw_darks"),
            output_dir: PathBuf::from("reduced"),
            combine: CombineConfig::default(),
        },
        hot_pixels: Some(HotPixelStageConfig {
            short_exposure: None,
            long_exposure: None,
            thresholds: HotPixelConfig {
                long_threshold: 1.0,
                short_threshold: 4.0,
            },
        }),
        masks: MaskConfig::default(),
        cosmic_rays: Some(CosmicRayConfig {
            science: PathBuf::from("science.fits"),
            lacosmic: LaCosmicParams::default(),
            label: LabelConfig::default(),
        }),
    }
}

/// Print or save a template PipelineConfig as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = toml::to_string_pretty(&template_config())?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Template config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}
