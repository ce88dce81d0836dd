use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use ccdcal_core::frame::DefectMask;
use ccdcal_core::io::fits::{load_mask, save_mask};
use ccdcal_core::mask::{combine, subtract};
use clap::Args;

#[derive(Args)]
pub struct CombineMasksArgs {
    /// Mask files to OR together
    #[arg(required = true)]
    pub masks: Vec<PathBuf>,

    /// Remove pixels already flagged in this mask from the result
    #[arg(long)]
    pub known: Option<PathBuf>,

    /// Output mask path
    #[arg(short, long, default_value = "combined_mask.fits")]
    pub output: PathBuf,
}

pub fn run(args: &CombineMasksArgs) -> Result<()> {
    if args.masks.is_empty() {
        bail!("at least one mask is required");
    }
    let loaded = args
        .masks
        .iter()
        .map(|p| load_mask(p).with_context(|| format!("Failed to read {}", p.display())))
        .collect::<Result<Vec<DefectMask>>>()?;
    let refs: Vec<&DefectMask> = loaded.iter().collect();
    let mut mask = combine(&refs)?;
    println!("Combined {} mask(s): {} pixels flagged", refs.len(), mask.count());

    if let Some(ref known_path) = args.known {
        let known = load_mask(known_path)
            .with_context(|| format!("Failed to read {}", known_path.display()))?;
        mask = subtract(&mask, &known)?;
        println!("Not in {}: {} pixels", known_path.display(), mask.count());
    }

    save_mask(&mask, &args.output)?;
    println!("Mask saved to {}", args.output.display());
    Ok(())
}
