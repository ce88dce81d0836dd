use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::collection::{same_exposure, FrameCollection};
use crate::cosmic::{detect_cosmic_rays, post_filter_frame, CosmicRayReview};
use crate::error::{CcdError, Result};
use crate::frame::{DefectMask, Frame, ImageType};
use crate::io::fits::{load_frame, load_mask, save_frame, save_mask};
use crate::io::naming::{combined_dark_file_name, COSMIC_RAY_MASK, MASK_FROM_DARK_CURRENT};
use crate::mask::{apply_mask, classify_hot_pixels, combine, HotPixelClassification};
use crate::stack::combine_files;

use super::config::{CosmicRayConfig, DarkConfig, HotPixelStageConfig, PipelineConfig};
use super::types::{CombinedDark, NoOpReporter, PipelineOutput, PipelineStage, ProgressReporter};

/// Group raw darks by exposure time, combine each group and write
/// `combined_dark_<exptime>.fit` into the output directory.
///
/// Groups are processed in ascending exposure order.
pub fn combine_darks(
    config: &DarkConfig,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<CombinedDark>> {
    reporter.begin_stage(PipelineStage::Collecting, None);
    let collection = FrameCollection::from_directory(&config.input_dir)?;
    let groups = collection.group_by_exposure(ImageType::Dark);
    reporter.finish_stage();

    if groups.is_empty() {
        return Err(CcdError::MissingInput(format!(
            "no DARK frames in {}",
            config.input_dir.display()
        )));
    }
    info!(
        files = collection.len(),
        exposure_groups = groups.len(),
        "Dark frames collected"
    );

    std::fs::create_dir_all(&config.output_dir)?;
    reporter.begin_stage(PipelineStage::CombiningDarks, Some(groups.len()));

    let mut combined = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let frame = combine_files(&group.paths, &config.combine)?;

        let path = config
            .output_dir
            .join(combined_dark_file_name(group.exposure_time));
        save_frame(&frame, &path)?;
        info!(
            exposure_time = group.exposure_time,
            sources = group.paths.len(),
            output = %path.display(),
            "Combined dark saved"
        );

        combined.push(CombinedDark {
            exposure_time: group.exposure_time,
            source_count: group.paths.len(),
            path,
            frame,
        });
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    Ok(combined)
}

/// Compare a short and a long combined dark.
///
/// Unset exposures default to the shortest and longest available. A
/// requested exposure with no combined dark is a `MissingInput` error.
pub fn derive_hot_pixel_mask(
    darks: &[CombinedDark],
    config: &HotPixelStageConfig,
) -> Result<HotPixelClassification> {
    let shortest = darks
        .iter()
        .map(|d| d.exposure_time)
        .min_by(f64::total_cmp)
        .ok_or_else(|| CcdError::MissingInput("no combined darks available".into()))?;
    let longest = darks
        .iter()
        .map(|d| d.exposure_time)
        .max_by(f64::total_cmp)
        .unwrap_or(shortest);

    let short = find_dark(darks, config.short_exposure.unwrap_or(shortest))?;
    let long = find_dark(darks, config.long_exposure.unwrap_or(longest))?;
    classify_hot_pixels(&short.frame, &long.frame, &config.thresholds)
}

fn find_dark(darks: &[CombinedDark], exposure_time: f64) -> Result<&CombinedDark> {
    darks
        .iter()
        .find(|d| same_exposure(d.exposure_time, exposure_time))
        .ok_or_else(|| {
            CcdError::MissingInput(format!(
                "no combined dark with exposure time {exposure_time} s"
            ))
        })
}

/// OR the base mask with masks loaded from `extra`. `None` when there is
/// nothing to combine.
pub fn build_defect_mask(
    base: Option<&DefectMask>,
    extra: &[PathBuf],
) -> Result<Option<DefectMask>> {
    let loaded = extra
        .iter()
        .map(|p| load_mask(p))
        .collect::<Result<Vec<DefectMask>>>()?;

    let mut all: Vec<&DefectMask> = base.into_iter().collect();
    all.extend(loaded.iter());
    if all.is_empty() {
        return Ok(None);
    }

    let mask = combine(&all)?;
    info!(
        sources = all.len(),
        flagged = mask.count(),
        "Defect masks combined"
    );
    Ok(Some(mask))
}

/// Clean cosmic rays from the science frame with `defect` applied, then
/// isolate and group the newly flagged pixels.
///
/// Returns the cleaned frame and the review of cosmic-ray-only events.
pub fn find_cosmic_rays(
    config: &CosmicRayConfig,
    defect: Option<&DefectMask>,
    reporter: &dyn ProgressReporter,
) -> Result<(Frame, CosmicRayReview)> {
    let science = load_frame(&config.science)?;
    let science = match defect {
        Some(mask) => apply_mask(&science, mask)?,
        None => science,
    };
    let applied = science
        .mask
        .clone()
        .unwrap_or_else(|| DefectMask::empty(science.shape()));

    reporter.begin_stage(PipelineStage::DetectingCosmicRays, None);
    let cleaned = detect_cosmic_rays(&science, &config.lacosmic)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::GroupingEvents, None);
    let review = post_filter_frame(&cleaned, &applied, &config.label)?;
    reporter.finish_stage();

    Ok((cleaned, review))
}

/// Run the full calibration pipeline with a thread-safe progress reporter.
pub fn run_pipeline_reported(
    config: &PipelineConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PipelineOutput> {
    config.validate()?;
    let reporter = reporter.as_ref();
    let output_dir = &config.darks.output_dir;

    let combined_darks = combine_darks(&config.darks, reporter)?;

    let hot_pixels = match config.hot_pixels {
        Some(ref hot_config) => {
            reporter.begin_stage(PipelineStage::ClassifyingHotPixels, None);
            let result = derive_hot_pixel_mask(&combined_darks, hot_config)?;
            save_mask(&result.hot, &output_dir.join(MASK_FROM_DARK_CURRENT))?;
            reporter.finish_stage();
            Some(result)
        }
        None => None,
    };

    reporter.begin_stage(PipelineStage::CombiningMasks, None);
    let defect_mask = build_defect_mask(hot_pixels.as_ref().map(|h| &h.hot), &config.masks.extra)?;
    reporter.finish_stage();

    let cosmic_rays = match config.cosmic_rays {
        Some(ref cr_config) => {
            let (_, review) = find_cosmic_rays(cr_config, defect_mask.as_ref(), reporter)?;
            let path = output_dir.join(COSMIC_RAY_MASK);
            save_mask(&review.mask, &path)?;
            info!(
                events = review.events.len(),
                output = %path.display(),
                "Cosmic ray mask saved"
            );
            Some(review)
        }
        None => None,
    };

    Ok(PipelineOutput {
        combined_darks,
        hot_pixels,
        defect_mask,
        cosmic_rays,
    })
}

/// Run the full calibration pipeline.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutput> {
    run_pipeline_reported(config, Arc::new(NoOpReporter))
}
