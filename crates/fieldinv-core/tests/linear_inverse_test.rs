use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use fieldinv_core::spatial::{Direction2, Direction3, Vector2, Vector3};
use fieldinv_core::transform::linear::{rotation_2d, rotation_3d};
use fieldinv_core::{LinearKind, LinearTransform, Transform};
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn assert_round_trip_3d(t: &LinearTransform<3>, p: [f64; 3], tolerance: f64) -> Result<(), TestCaseError> {
    let inverse = t.inverse().unwrap();
    prop_assert_eq!(inverse.kind(), t.kind());
    let q = inverse.transform_point(&t.transform_point(&p));
    for a in 0..3 {
        prop_assert!((q[a] - p[a]).abs() < tolerance, "axis {}: got {}, expected {}", a, q[a], p[a]);
    }
    Ok(())
}

proptest! {
    #[test]
    fn test_translation_inverse(
        tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        px in -100.0f64..100.0, py in -100.0f64..100.0, pz in -100.0f64..100.0
    ) {
        let t = LinearTransform::<3>::translation(Vector3::new(tx, ty, tz));
        assert_round_trip_3d(&t, [px, py, pz], 1e-9)?;
    }

    #[test]
    fn test_translation_scaling_inverse(
        sx in 0.1f64..4.0, sy in 0.1f64..4.0, sz in 0.1f64..4.0,
        tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        px in -100.0f64..100.0, py in -100.0f64..100.0, pz in -100.0f64..100.0
    ) {
        let t = LinearTransform::<3>::translation_scaling(Vector3::new(sx, sy, sz), Vector3::new(tx, ty, tz));
        assert_round_trip_3d(&t, [px, py, pz], 1e-8)?;
    }

    #[test]
    fn test_rigid_inverse(
        ax in -3.14f64..3.14, ay in -3.14f64..3.14, az in -3.14f64..3.14,
        tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        px in -100.0f64..100.0, py in -100.0f64..100.0, pz in -100.0f64..100.0
    ) {
        let t = LinearTransform::<3>::rigid(rotation_3d(ax, ay, az), Vector3::new(tx, ty, tz));
        assert_round_trip_3d(&t, [px, py, pz], 1e-8)?;
    }

    #[test]
    fn test_similitude_inverse(
        s in 0.2f64..5.0, az in -3.14f64..3.14,
        tx in -50.0f64..50.0, ty in -50.0f64..50.0, tz in -50.0f64..50.0,
        px in -100.0f64..100.0, py in -100.0f64..100.0, pz in -100.0f64..100.0
    ) {
        let t = LinearTransform::<3>::similitude(s, rotation_3d(0.1, -0.2, az), Vector3::new(tx, ty, tz));
        assert_round_trip_3d(&t, [px, py, pz], 1e-8)?;
    }

    #[test]
    fn test_affine_inverse(
        a in 0.5f64..2.0, b in -0.4f64..0.4, c in -0.4f64..0.4, d in 0.5f64..2.0,
        tx in -50.0f64..50.0, ty in -50.0f64..50.0,
        px in -100.0f64..100.0, py in -100.0f64..100.0
    ) {
        let linear = Direction3::new(a, b, 0.1, c, d, 0.0, 0.0, 0.2, 1.5);
        let t = LinearTransform::<3>::affine(linear, Vector3::new(tx, ty, 1.0));
        assert_round_trip_3d(&t, [px, py, 3.0], 1e-8)?;
    }
}

#[test]
fn test_rigid_2d_inverse_within_tolerance() {
    let t = LinearTransform::<2>::rigid(rotation_2d(0.7), Vector2::new(12.5, -3.25));
    let inverse = t.inverse().unwrap();
    for p in [[0.0, 0.0], [10.0, -4.0], [-31.5, 17.25]] {
        let q = inverse.transform_point(&t.transform_point(&p));
        assert!((q[0] - p[0]).abs() < 1e-6, "X mismatch: got {}, expected {}", q[0], p[0]);
        assert!((q[1] - p[1]).abs() < 1e-6, "Y mismatch: got {}, expected {}", q[1], p[1]);
    }
}

#[test]
fn test_singular_affine_is_rejected() {
    let t = LinearTransform::<2>::affine(Direction2::new(1.0, 2.0, 2.0, 4.0), Vector2::zeros());
    assert!(t.inverse().is_err());
}

#[test]
fn test_compose_with_inverse_is_identity() {
    let t = LinearTransform::<3>::similitude(1.5, rotation_3d(0.3, 0.2, -0.1), Vector3::new(1.0, 2.0, 3.0));
    let composed = t.compose(&t.inverse().unwrap()).unwrap();
    assert_eq!(composed.kind(), LinearKind::Similitude);
    let identity = LinearTransform::<3>::identity();
    assert!((composed.matrix() - identity.matrix()).amax() < 1e-12);
}

#[test]
fn test_transform_points_batch() {
    let device = Default::default();
    let t = LinearTransform::<2>::translation(Vector2::new(1.0, -2.0));
    let points = Tensor::<Backend, 2>::from_data(TensorData::new(vec![0.0f32, 0.0, 3.0, 4.0], [2, 2]), &device);
    let moved = t.transform_points(points).unwrap();
    let values = moved.into_data().to_vec::<f32>().unwrap();
    assert_eq!(values, vec![1.0, -2.0, 4.0, 2.0]);
}
