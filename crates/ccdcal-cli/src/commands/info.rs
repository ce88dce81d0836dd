use std::path::{Path, PathBuf};

use anyhow::Result;
use ccdcal_core::collection::FrameCollection;
use ccdcal_core::frame::ImageType;
use ccdcal_core::io::fits::load_frame;
use clap::Args;

#[derive(Args)]
pub struct InfoArgs {
    /// FITS file or directory of FITS files
    pub path: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    if args.path.is_dir() {
        summarize_directory(&args.path)
    } else {
        describe_file(&args.path)
    }
}

fn describe_file(path: &Path) -> Result<()> {
    let frame = load_frame(path)?;
    let metadata = &frame.metadata;

    println!("File:        {}", path.display());
    println!("Dimensions:  {}x{}", frame.width(), frame.height());
    match metadata.image_type {
        Some(t) => println!("Image type:  {t}"),
        None => println!("Image type:  unknown"),
    }
    if let Some(exposure) = metadata.exposure_time {
        println!("Exposure:    {exposure} s");
    }
    if let Some(gain) = metadata.gain {
        println!("Gain:        {gain} e-/ADU");
    }
    if metadata.combined {
        println!("Combined:    yes");
    }
    if let Some(ref mask) = frame.mask {
        println!("Masked:      {} pixels", mask.count());
    }
    Ok(())
}

fn summarize_directory(dir: &Path) -> Result<()> {
    let collection = FrameCollection::from_directory(dir)?;
    println!("Directory:   {}", dir.display());
    println!("FITS files:  {}", collection.len());

    for image_type in [
        ImageType::Bias,
        ImageType::Dark,
        ImageType::Flat,
        ImageType::Light,
    ] {
        let groups = collection.group_by_exposure(image_type);
        if groups.is_empty() {
            continue;
        }
        println!();
        println!("{image_type}");
        for group in groups {
            println!(
                "  {:>10} s  {} frame(s)",
                group.exposure_time,
                group.paths.len()
            );
        }
    }

    let untyped = collection
        .entries()
        .iter()
        .filter(|e| e.image_type.is_none())
        .count();
    if untyped > 0 {
        println!();
        println!("Untyped:     {untyped} file(s)");
    }
    Ok(())
}
