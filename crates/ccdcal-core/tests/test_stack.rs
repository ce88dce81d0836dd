mod common;

use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use ccdcal_core::error::CcdError;
use ccdcal_core::frame::{DefectMask, Frame};
use ccdcal_core::io::fits::{load_frame, save_frame};
use ccdcal_core::stack::{
    combine_files, combine_frames, ClipDeviation, CombineConfig, CombineMethod,
};

use common::write_dark;

fn dark_stack() -> Vec<Frame> {
    let levels = [9.0, 10.0, 11.0, 10.0, 10.0];
    let mut frames: Vec<Frame> = levels
        .iter()
        .map(|&v| Frame::dark(Array2::from_elem((6, 5), v), 90.0, 1.5))
        .collect();
    // Cosmic ray hit in one frame.
    frames[4].data[[2, 2]] = 1000.0;
    frames
}

#[test]
fn test_outlier_rejected() {
    let result = combine_frames(&dark_stack(), &CombineConfig::default()).unwrap();
    assert_abs_diff_eq!(result.data[[2, 2]], 10.0, epsilon = 1e-12);
    assert_abs_diff_eq!(result.data[[0, 0]], 10.0, epsilon = 1e-12);
    assert!(result.mask.is_none());
}

#[test]
fn test_zero_deviation_still_clips() {
    let frames: Vec<Frame> = [100.0, 100.0, 100.0, 101.0, 5000.0]
        .iter()
        .map(|&v| Frame::dark(Array2::from_elem((2, 2), v), 90.0, 1.5))
        .collect();
    // MAD is zero, so only values equal to the median survive.
    let result = combine_frames(&frames, &CombineConfig::default()).unwrap();
    assert_eq!(result.data[[0, 0]], 100.0);
    assert_eq!(result.data[[1, 1]], 100.0);
    assert!(result.mask.is_none());
}

#[test]
fn test_no_clipping_keeps_outlier() {
    let config = CombineConfig {
        iterations: 0,
        ..Default::default()
    };
    let result = combine_frames(&dark_stack(), &config).unwrap();
    assert_abs_diff_eq!(result.data[[2, 2]], (9.0 + 10.0 + 11.0 + 10.0 + 1000.0) / 5.0);
}

#[test]
fn test_median_method() {
    let config = CombineConfig {
        method: CombineMethod::Median,
        clip_deviation: ClipDeviation::Std,
        ..Default::default()
    };
    let result = combine_frames(&dark_stack(), &config).unwrap();
    assert_eq!(result.data[[2, 2]], 10.0);
}

#[test]
fn test_chunked_matches_single_pass() {
    let frames: Vec<Frame> = (0..4)
        .map(|i| {
            Frame::new(Array2::from_shape_fn((13, 11), |(r, c)| {
                ((r * 31 + c * 17 + i * 7) % 23) as f64
            }))
        })
        .collect();

    let whole = combine_frames(&frames, &CombineConfig::default()).unwrap();
    let chunked = combine_frames(
        &frames,
        &CombineConfig {
            memory_limit_bytes: 1,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(whole.data, chunked.data);
}

#[test]
fn test_masked_inputs_ignored() {
    let mut frames = dark_stack();
    let mut mask = Array2::from_elem((6, 5), false);
    mask[[2, 2]] = true;
    frames[4].mask = Some(DefectMask::new(mask));

    let config = CombineConfig {
        iterations: 0,
        ..Default::default()
    };
    let result = combine_frames(&frames, &config).unwrap();
    assert_abs_diff_eq!(result.data[[2, 2]], 10.0);
}

#[test]
fn test_fully_masked_pixel_becomes_nan_and_masked() {
    let mut frames = dark_stack();
    for frame in &mut frames {
        let mut mask = Array2::from_elem((6, 5), false);
        mask[[0, 1]] = true;
        frame.mask = Some(DefectMask::new(mask));
    }
    let result = combine_frames(&frames, &CombineConfig::default()).unwrap();

    assert!(result.data[[0, 1]].is_nan());
    let mask = result.mask.unwrap();
    assert_eq!(mask.positions(), vec![(0, 1)]);
}

#[test]
fn test_result_metadata() {
    let result = combine_frames(&dark_stack(), &CombineConfig::default()).unwrap();
    assert!(result.metadata.combined);
    assert_eq!(result.metadata.exposure_time, Some(90.0));
    assert_eq!(result.metadata.gain, Some(1.5));
}

#[test]
fn test_empty_stack_rejected() {
    assert!(matches!(
        combine_frames(&[], &CombineConfig::default()),
        Err(CcdError::MissingInput(_))
    ));
}

#[test]
fn test_mismatched_frames_rejected() {
    let frames = vec![
        Frame::new(Array2::zeros((4, 4))),
        Frame::new(Array2::zeros((4, 5))),
    ];
    assert!(matches!(
        combine_frames(&frames, &CombineConfig::default()),
        Err(CcdError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_invalid_clip_rejected() {
    let config = CombineConfig {
        clip_high: 0.0,
        ..Default::default()
    };
    assert!(matches!(
        combine_frames(&dark_stack(), &config),
        Err(CcdError::InvalidParameter(_))
    ));
}

fn textured_frames() -> Vec<Frame> {
    (0..4)
        .map(|i| {
            let data = Array2::from_shape_fn((13, 11), |(r, c)| {
                ((r * 31 + c * 17 + i * 7) % 23) as f64
            });
            let mut mask = Array2::from_elem((13, 11), false);
            mask[[i, i + 1]] = true;
            Frame::dark(data, 90.0, 1.5)
                .with_mask(DefectMask::new(mask))
                .unwrap()
        })
        .collect()
}

#[test]
fn test_combine_files_matches_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let frames = textured_frames();
    let paths: Vec<PathBuf> = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let path = dir.path().join(format!("dark_{i}.fit"));
            save_frame(frame, &path).unwrap();
            path
        })
        .collect();

    let expected = combine_frames(&frames, &CombineConfig::default()).unwrap();
    // One row per band: nothing beyond a single row of each file is decoded.
    let streamed = combine_files(
        &paths,
        &CombineConfig {
            memory_limit_bytes: 1,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(streamed.data, expected.data);
    assert!(streamed.metadata.combined);
    assert_eq!(streamed.metadata.exposure_time, Some(90.0));
    assert_eq!(streamed.metadata.gain, Some(1.5));
}

#[test]
fn test_combine_files_honours_file_masks() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for (i, level) in [10.0, 10.0, 1000.0].iter().enumerate() {
        let mut frame = Frame::dark(Array2::from_elem((3, 3), *level), 90.0, 1.5);
        if i == 2 {
            frame = frame
                .with_mask(DefectMask::new(Array2::from_elem((3, 3), true)))
                .unwrap();
        }
        let path = dir.path().join(format!("dark_{i}.fit"));
        save_frame(&frame, &path).unwrap();
        paths.push(path);
    }

    let config = CombineConfig {
        iterations: 0,
        ..Default::default()
    };
    let result = combine_files(&paths, &config).unwrap();
    assert!(result.data.iter().all(|&v| v == 10.0));
    assert_eq!(load_frame(&paths[0]).unwrap().data[[1, 1]], 10.0);
}

#[test]
fn test_combine_files_rejects_mismatched_shapes() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_dark(dir.path(), "a.fit", 1.0, 90.0, 1.5);
    let b = dir.path().join("b.fit");
    save_frame(&Frame::dark(Array2::zeros((4, 8)), 90.0, 1.5), &b).unwrap();

    assert!(matches!(
        combine_files(&[a, b], &CombineConfig::default()),
        Err(CcdError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        combine_files(&[], &CombineConfig::default()),
        Err(CcdError::MissingInput(_))
    ));
}
