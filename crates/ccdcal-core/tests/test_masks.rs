use ndarray::Array2;

use ccdcal_core::error::CcdError;
use ccdcal_core::frame::{DefectMask, Frame};
use ccdcal_core::mask::{apply_mask, combine, subtract};

fn mask_from(shape: (usize, usize), set: &[(usize, usize)]) -> DefectMask {
    let mut data = Array2::from_elem(shape, false);
    for &(r, c) in set {
        data[[r, c]] = true;
    }
    DefectMask::new(data)
}

fn patterned(shape: (usize, usize), modulus: usize, offset: usize) -> DefectMask {
    DefectMask::new(Array2::from_shape_fn(shape, |(r, c)| {
        (r * shape.1 + c + offset) % modulus == 0
    }))
}

#[test]
fn test_combine_all_zero_masks() {
    let a = DefectMask::empty((10, 10));
    let b = DefectMask::empty((10, 10));
    let c = DefectMask::empty((10, 10));
    let result = combine(&[&a, &b, &c]).unwrap();
    assert_eq!(result.shape(), (10, 10));
    assert!(result.is_clear());
}

#[test]
fn test_combine_single_mask_is_identity() {
    let m = patterned((7, 9), 4, 1);
    assert_eq!(combine(&[&m]).unwrap(), m);
}

#[test]
fn test_combine_is_order_independent() {
    let a = patterned((6, 6), 3, 0);
    let b = patterned((6, 6), 5, 2);
    let c = mask_from((6, 6), &[(5, 5), (0, 1)]);

    let abc = combine(&[&a, &b, &c]).unwrap();
    assert_eq!(combine(&[&c, &a, &b]).unwrap(), abc);
    assert_eq!(combine(&[&b, &c, &a]).unwrap(), abc);

    let ab = combine(&[&a, &b]).unwrap();
    let nested = combine(&[&ab, &c]).unwrap();
    assert_eq!(nested, abc);
}

#[test]
fn test_combine_is_union() {
    let a = mask_from((3, 3), &[(0, 0)]);
    let b = mask_from((3, 3), &[(2, 2), (0, 0)]);
    let result = combine(&[&a, &b]).unwrap();
    assert_eq!(result.positions(), vec![(0, 0), (2, 2)]);
}

#[test]
fn test_combine_empty_input_is_error() {
    assert!(matches!(combine(&[]), Err(CcdError::MissingInput(_))));
}

#[test]
fn test_combine_shape_mismatch() {
    let a = DefectMask::empty((4, 4));
    let b = DefectMask::empty((4, 3));
    match combine(&[&a, &b]) {
        Err(CcdError::ShapeMismatch { expected, found }) => {
            assert_eq!(expected, (4, 4));
            assert_eq!(found, (4, 3));
        }
        other => panic!("expected shape mismatch, got {other:?}"),
    }
}

#[test]
fn test_subtract_self_is_empty() {
    let m = patterned((8, 8), 3, 1);
    assert!(subtract(&m, &m).unwrap().is_clear());
}

#[test]
fn test_subtract_keeps_new_pixels_only() {
    let raw = mask_from((4, 4), &[(0, 0), (1, 1), (3, 2)]);
    let known = mask_from((4, 4), &[(1, 1), (2, 2)]);
    assert_eq!(subtract(&raw, &known).unwrap().positions(), vec![(0, 0), (3, 2)]);
}

#[test]
fn test_apply_mask_leaves_source_untouched() {
    let frame = Frame::new(Array2::from_elem((3, 3), 1.0));
    let mask = mask_from((3, 3), &[(1, 1)]);
    let derived = apply_mask(&frame, &mask).unwrap();

    assert!(frame.mask.is_none());
    assert_eq!(derived.mask.as_ref().unwrap(), &mask);
    assert_eq!(derived.data, frame.data);
}

#[test]
fn test_apply_mask_merges_existing() {
    let frame = Frame::new(Array2::zeros((3, 3)))
        .with_mask(mask_from((3, 3), &[(0, 0)]))
        .unwrap();
    let derived = apply_mask(&frame, &mask_from((3, 3), &[(2, 1)])).unwrap();
    assert_eq!(derived.mask.unwrap().positions(), vec![(0, 0), (2, 1)]);
}

#[test]
fn test_with_mask_rejects_wrong_shape() {
    let result = Frame::new(Array2::zeros((3, 3))).with_mask(DefectMask::empty((2, 3)));
    assert!(matches!(result, Err(CcdError::ShapeMismatch { .. })));
}
