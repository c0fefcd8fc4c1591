use std::f64::consts::FRAC_PI_2;

use crate::geom::{CsTransform, Point3, TransformError, TransformKind};
use crate::params::{Parameter, ParameterSet};

fn assert_point(actual: Point3, expected: [f64; 3]) {
    for (a, b) in actual.to_array().iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-9, "{actual:?} != {expected:?}");
    }
}

#[test]
fn post_multiplied_operations_apply_in_call_order() {
    let mut transform = CsTransform::new();
    transform.translate([1.0, 0.0, 0.0], true).expect("translate");
    transform.rotate_z(FRAC_PI_2, true).expect("rotate");

    let moved = transform.transform(Point3::ORIGIN);
    assert_point(moved, [0.0, 1.0, 0.0]);
    assert_point(transform.invert_transform(moved), [0.0, 0.0, 0.0]);
}

#[test]
fn pre_multiplied_operations_apply_in_reverse_order() {
    let mut transform = CsTransform::new();
    transform.set_post_multiply(false);
    transform.translate([1.0, 0.0, 0.0], true).expect("translate");
    transform.rotate_z(FRAC_PI_2, true).expect("rotate");

    assert_point(transform.transform(Point3::ORIGIN), [1.0, 0.0, 0.0]);
}

#[test]
fn non_concatenated_operation_replaces_the_log() {
    let mut transform = CsTransform::new();
    transform.translate([1.0, 2.0, 3.0], true).expect("translate");
    transform.scale(2.0, false).expect("scale");

    assert_eq!(transform.operations().len(), 1);
    assert_eq!(transform.operations()[0].kind, TransformKind::Scale);
    assert_point(transform.transform(Point3::new(1.0, 1.0, 1.0)), [2.0, 2.0, 2.0]);
}

#[test]
fn degrees_flag_converts_angles() {
    let mut transform = CsTransform::new();
    transform.set_angles_in_degrees(true);
    transform.rotate_origin([0.0, 0.0, 1.0], 90.0, true).expect("rotate");
    assert_point(transform.transform(Point3::new(1.0, 0.0, 0.0)), [0.0, 1.0, 0.0]);
}

#[test]
fn degenerate_operations_are_rejected() {
    let mut transform = CsTransform::new();
    assert!(matches!(
        transform.rotate_origin([0.0; 3], 1.0, true),
        Err(TransformError::ZeroAxis)
    ));
    assert!(matches!(transform.scale(0.0, true), Err(TransformError::Singular)));
    assert!(!transform.has_transform());
}

#[test]
fn formula_arguments_follow_parameter_changes() {
    let mut params = ParameterSet::new();
    params.link_parameter(Parameter::constant("d", 2.0));

    let mut transform = CsTransform::new();
    transform
        .transform_by_string("Translate", "d, 0, d*2", true, &params)
        .expect("translate");
    assert_point(transform.transform(Point3::ORIGIN), [2.0, 0.0, 4.0]);
    assert_eq!(transform.operations()[0].argument_string(), "d,0,d*2");

    params.set_value("d", 5.0);
    transform.replay(&params).expect("replay");
    assert_point(transform.transform(Point3::ORIGIN), [5.0, 0.0, 10.0]);
}

#[test]
fn inversion_is_kept_by_replay() {
    let params = ParameterSet::new();
    let mut transform = CsTransform::new();
    transform.translate([10.0, 0.0, 0.0], true).expect("translate");
    transform.invert();
    assert!(transform.operations()[0].inverts());
    transform.replay(&params).expect("replay");
    assert_point(transform.transform(Point3::ORIGIN), [-10.0, 0.0, 0.0]);

    transform.translate([0.0, 1.0, 0.0], true).expect("translate");
    transform.replay(&params).expect("replay");
    assert_point(transform.transform(Point3::ORIGIN), [-10.0, 1.0, 0.0]);

    transform.invert();
    transform.invert();
    transform.replay(&params).expect("replay");
    assert_point(transform.transform(Point3::ORIGIN), [-10.0, 1.0, 0.0]);
    assert_point(transform.invert_transform(Point3::new(-10.0, 1.0, 0.0)), [0.0, 0.0, 0.0]);
}

#[test]
fn replay_keeps_the_order_and_units_of_each_operation() {
    let mut params = ParameterSet::new();
    params.link_parameter(Parameter::constant("a", 90.0));

    let mut transform = CsTransform::new();
    transform.translate([1.0, 0.0, 0.0], true).expect("translate");
    transform.set_post_multiply(false);
    transform.rotate_z(FRAC_PI_2, true).expect("rotate");
    transform.set_angles_in_degrees(true);
    transform.set_post_multiply(true);
    transform
        .transform_by_string("Rotate_X", "a", true, &params)
        .expect("rotate");

    let points = [Point3::ORIGIN, Point3::new(1.0, 2.0, 3.0), Point3::new(-4.0, 0.5, 2.0)];
    let before: Vec<Point3> = points.iter().map(|p| transform.transform(*p)).collect();
    assert_point(before[0], [1.0, 0.0, 0.0]);

    transform.set_post_multiply(false);
    transform.set_angles_in_degrees(false);
    transform.replay(&params).expect("replay");
    for (p, expected) in points.iter().zip(&before) {
        assert_point(transform.transform(*p), expected.to_array());
    }

    params.set_value("a", 0.0);
    transform.replay(&params).expect("replay");
    assert_point(transform.transform(Point3::new(0.0, 1.0, 0.0)), [0.0, 0.0, 0.0]);
}

#[test]
fn string_arguments_are_validated() {
    let params = ParameterSet::new();
    let mut transform = CsTransform::new();

    assert!(matches!(
        transform.transform_by_string("Shear", "1", true, &params),
        Err(TransformError::UnknownOperation(_))
    ));
    assert!(matches!(
        transform.transform_by_string("Translate", "1,2", true, &params),
        Err(TransformError::ArgumentCount { expected: 3, found: 2, .. })
    ));
    assert!(matches!(
        transform.transform_by_string("Rotate_X", "missing", true, &params),
        Err(TransformError::Argument { index: 0, .. })
    ));

    transform
        .transform_by_string("Scale", "1,2,3", true, &params)
        .expect("three scale factors");
    assert_eq!(transform.operations()[0].kind, TransformKind::Scale3);
}
