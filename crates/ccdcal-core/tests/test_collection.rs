mod common;

use std::path::PathBuf;

use ccdcal_core::collection::{FrameCollection, FrameSummary};
use ccdcal_core::error::CcdError;
use ccdcal_core::frame::ImageType;

use common::write_dark;

fn summary(name: &str, image_type: Option<ImageType>, exposure: Option<f64>) -> FrameSummary {
    FrameSummary {
        path: PathBuf::from(name),
        image_type,
        exposure_time: exposure,
    }
}

fn sample_collection() -> FrameCollection {
    FrameCollection::new(vec![
        summary("d1.fit", Some(ImageType::Dark), Some(1000.0)),
        summary("d2.fit", Some(ImageType::Dark), Some(90.0)),
        summary("d3.fit", Some(ImageType::Dark), Some(1000.0)),
        summary("d4.fit", Some(ImageType::Dark), Some(90.0 + 1e-9)),
        summary("b1.fit", Some(ImageType::Bias), Some(0.0)),
        summary("l1.fit", Some(ImageType::Light), Some(300.0)),
        summary("x1.fit", None, Some(90.0)),
        summary("d5.fit", Some(ImageType::Dark), None),
    ])
}

#[test]
fn test_exposure_times_sorted_and_unique() {
    let times = sample_collection().exposure_times(ImageType::Dark);
    assert_eq!(times, vec![90.0, 1000.0]);
}

#[test]
fn test_exposure_times_empty_when_type_absent() {
    assert!(sample_collection().exposure_times(ImageType::Flat).is_empty());
    assert!(FrameCollection::default().exposure_times(ImageType::Dark).is_empty());
}

#[test]
fn test_files_filtered_matches_type_and_exposure() {
    let files = sample_collection().files_filtered(ImageType::Dark, 90.0);
    assert_eq!(files, vec![PathBuf::from("d2.fit"), PathBuf::from("d4.fit")]);
}

#[test]
fn test_files_filtered_empty_selection() {
    let collection = sample_collection();
    assert!(collection.files_filtered(ImageType::Dark, 45.0).is_empty());
    assert!(matches!(
        collection.require_files(ImageType::Dark, 45.0),
        Err(CcdError::MissingInput(_))
    ));
}

#[test]
fn test_group_by_exposure_ascending() {
    let groups = sample_collection().group_by_exposure(ImageType::Dark);
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].exposure_time, 90.0);
    assert_eq!(groups[0].paths.len(), 2);
    assert_eq!(groups[1].exposure_time, 1000.0);
    assert_eq!(
        groups[1].paths,
        vec![PathBuf::from("d1.fit"), PathBuf::from("d3.fit")]
    );
}

#[test]
fn test_from_directory_reads_headers() {
    let dir = tempfile::tempdir().unwrap();
    write_dark(dir.path(), "b.fits", 10.0, 1000.0, 1.5);
    write_dark(dir.path(), "a.fit", 10.0, 90.0, 1.5);
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
    std::fs::write(dir.path().join("broken.fit"), b"garbage").unwrap();

    let collection = FrameCollection::from_directory(dir.path()).unwrap();
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.entries()[0].path, dir.path().join("a.fit"));
    assert_eq!(collection.exposure_times(ImageType::Dark), vec![90.0, 1000.0]);
}

#[test]
fn test_from_directory_missing_dir() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        FrameCollection::from_directory(&missing),
        Err(CcdError::MissingInput(_))
    ));
}
