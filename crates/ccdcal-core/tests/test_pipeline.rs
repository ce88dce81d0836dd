mod common;

use std::path::Path;
use std::sync::{Arc, Mutex};

use ndarray::Array2;

use ccdcal_core::cosmic::{LaCosmicParams, LabelConfig};
use ccdcal_core::error::CcdError;
use ccdcal_core::frame::DefectMask;
use ccdcal_core::io::fits::{load_frame, load_mask, save_frame, save_mask};
use ccdcal_core::io::naming::{COSMIC_RAY_MASK, MASK_FROM_DARK_CURRENT};
use ccdcal_core::mask::HotPixelConfig;
use ccdcal_core::pipeline::config::{
    CosmicRayConfig, DarkConfig, HotPixelStageConfig, MaskConfig, PipelineConfig,
};
use ccdcal_core::pipeline::{
    build_defect_mask, combine_darks, run_pipeline, run_pipeline_reported, PipelineStage,
    ProgressReporter,
};
use ccdcal_core::stack::CombineConfig;

use common::{science_frame, write_dark, write_dark_data};

const HOT: (usize, usize) = (3, 4);

/// Three long and three short darks sharing one hot pixel.
fn write_dark_set(dir: &Path) {
    for i in 0..3 {
        let mut long = Array2::from_elem((21, 21), 10.0 + i as f64);
        long[HOT] = 95_000.0;
        write_dark_data(dir, &format!("long_{i}.fit"), long, 1000.0, 1.5);

        let mut short = Array2::from_elem((21, 21), 1.0);
        short[HOT] = 500.0;
        write_dark_data(dir, &format!("short_{i}.fit"), short, 90.0, 1.5);
    }
}

fn dark_config(root: &Path) -> DarkConfig {
    DarkConfig {
        input_dir: root.join("raw"),
        output_dir: root.join("out"),
        combine: CombineConfig::default(),
    }
}

fn full_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        darks: dark_config(root),
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
            science: root.join("science.fit"),
            lacosmic: LaCosmicParams::default(),
            label: LabelConfig::default(),
        }),
    }
}

fn setup() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let raw = root.path().join("raw");
    std::fs::create_dir(&raw).unwrap();
    write_dark_set(&raw);
    // The hot pixel also looks like a spike in the science frame.
    let science = science_frame((21, 21), 100.0, &[HOT, (15, 12)]);
    save_frame(&science, &root.path().join("science.fit")).unwrap();
    root
}

#[test]
fn test_combine_darks_writes_one_file_per_exposure() {
    let root = setup();
    let config = dark_config(root.path());
    let darks = combine_darks(&config, &Recorder::default()).unwrap();

    assert_eq!(darks.len(), 2);
    assert_eq!(darks[0].exposure_time, 90.0);
    assert_eq!(darks[1].exposure_time, 1000.0);
    assert!(darks.iter().all(|d| d.source_count == 3));

    let long_path = root.path().join("out").join("combined_dark_1000.0.fit");
    assert_eq!(darks[1].path, long_path);
    let reloaded = load_frame(&long_path).unwrap();
    assert!(reloaded.metadata.combined);
    assert_eq!(reloaded.data[[0, 0]], 11.0);
    assert_eq!(reloaded.data[HOT], 95_000.0);
}

#[test]
fn test_combine_darks_without_darks_fails() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("raw")).unwrap();
    let result = combine_darks(&dark_config(root.path()), &Recorder::default());
    assert!(matches!(result, Err(CcdError::MissingInput(_))));
}

#[test]
fn test_full_pipeline_end_to_end() {
    let root = setup();
    let output = run_pipeline(&full_config(root.path())).unwrap();

    let hot = output.hot_pixels.unwrap();
    assert_eq!(hot.hot.positions(), vec![HOT]);

    let saved_hot = load_mask(&root.path().join("out").join(MASK_FROM_DARK_CURRENT)).unwrap();
    assert_eq!(saved_hot, hot.hot);
    assert_eq!(output.defect_mask.unwrap(), hot.hot);

    // The known hot pixel is excluded; only the real spike is an event.
    let review = output.cosmic_rays.unwrap();
    assert_eq!(review.mask.positions(), vec![(15, 12)]);
    assert_eq!(review.events.len(), 1);

    let saved_cr = load_mask(&root.path().join("out").join(COSMIC_RAY_MASK)).unwrap();
    assert_eq!(saved_cr, review.mask);
}

#[test]
fn test_pipeline_without_optional_stages() {
    let root = setup();
    let mut config = full_config(root.path());
    config.hot_pixels = None;
    config.cosmic_rays = None;

    let output = run_pipeline(&config).unwrap();
    assert_eq!(output.combined_darks.len(), 2);
    assert!(output.hot_pixels.is_none());
    assert!(output.defect_mask.is_none());
    assert!(!root.path().join("out").join(MASK_FROM_DARK_CURRENT).exists());
}

#[test]
fn test_requested_exposure_must_exist() {
    let root = setup();
    let mut config = full_config(root.path());
    if let Some(ref mut hot) = config.hot_pixels {
        hot.short_exposure = Some(45.0);
    }
    assert!(matches!(
        run_pipeline(&config),
        Err(CcdError::MissingInput(_))
    ));
}

#[test]
fn test_invalid_config_rejected_before_io() {
    let root = tempfile::tempdir().unwrap();
    let mut config = full_config(root.path());
    if let Some(ref mut cr) = config.cosmic_rays {
        cr.label.min_pixels = 0;
    }
    assert!(matches!(
        run_pipeline(&config),
        Err(CcdError::InvalidParameter(_))
    ));
    assert!(!root.path().join("out").exists());
}

#[test]
fn test_build_defect_mask_merges_extra_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut extra = Array2::from_elem((4, 4), false);
    extra[[3, 3]] = true;
    let extra_path = dir.path().join("ccdmask.fits");
    save_mask(&DefectMask::new(extra), &extra_path).unwrap();

    let mut base = Array2::from_elem((4, 4), false);
    base[[0, 0]] = true;
    let base = DefectMask::new(base);

    let merged = build_defect_mask(Some(&base), &[extra_path]).unwrap().unwrap();
    assert_eq!(merged.positions(), vec![(0, 0), (3, 3)]);
    assert!(build_defect_mask(None, &[]).unwrap().is_none());
}

#[test]
fn test_reporter_sees_stages_in_order() {
    let root = setup();
    let recorder = Arc::new(Recorder::default());
    run_pipeline_reported(&full_config(root.path()), recorder.clone()).unwrap();

    let stages = recorder.stages.lock().unwrap().clone();
    assert_eq!(
        stages,
        vec![
            PipelineStage::Collecting,
            PipelineStage::CombiningDarks,
            PipelineStage::ClassifyingHotPixels,
            PipelineStage::CombiningMasks,
            PipelineStage::DetectingCosmicRays,
            PipelineStage::GroupingEvents,
        ]
    );
}

#[test]
fn test_skips_non_dark_frames() {
    let root = setup();
    let raw = root.path().join("raw");
    save_frame(&science_frame((21, 21), 5.0, &[]), &raw.join("light.fit")).unwrap();
    write_dark(&raw, "odd_size.fit", 1.0, 30.0, 1.5);

    // The 30 s group has one 8x8 frame and combines on its own.
    let darks = combine_darks(&dark_config(root.path()), &Recorder::default()).unwrap();
    let times: Vec<f64> = darks.iter().map(|d| d.exposure_time).collect();
    assert_eq!(times, vec![30.0, 90.0, 1000.0]);
}

#[test]
fn test_config_defaults_fill_missing_sections() {
    let json = r#"{
        "darks": { "input_dir": "raw", "output_dir": "out" },
        "hot_pixels": { "long_threshold": 1.0, "short_threshold": 4.0, "long_exposure": 1000.0 },
        "cosmic_rays": { "science": "sci.fit", "label": { "connectivity": "Four" } }
    }"#;
    let config: PipelineConfig = serde_json::from_str(json).unwrap();
    config.validate().unwrap();

    assert_eq!(config.darks.combine, CombineConfig::default());
    let hot = config.hot_pixels.unwrap();
    assert_eq!(hot.short_exposure, None);
    assert_eq!(hot.long_exposure, Some(1000.0));
    assert!(config.masks.extra.is_empty());
    let cr = config.cosmic_rays.unwrap();
    assert_eq!(cr.lacosmic, LaCosmicParams::default());
    assert_eq!(cr.label.min_pixels, 1);
    assert_eq!(cr.label.connectivity, ccdcal_core::cosmic::Connectivity::Four);
}

#[test]
fn test_config_hot_thresholds_required() {
    let json = r#"{
        "darks": { "input_dir": "raw", "output_dir": "out" },
        "hot_pixels": { "long_threshold": 1.0 }
    }"#;
    assert!(serde_json::from_str::<PipelineConfig>(json).is_err());
}

#[derive(Default)]
struct Recorder {
    stages: Mutex<Vec<PipelineStage>>,
}

impl ProgressReporter for Recorder {
    fn begin_stage(&self, stage: PipelineStage, _total_items: Option<usize>) {
        self.stages.lock().unwrap().push(stage);
    }
}
