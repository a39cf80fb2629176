use std::f32::consts::PI;

use burn_ndarray::NdArray;
use fieldinv_core::interpolation::{Interpolator, LinearInterpolator};
use fieldinv_core::transform::HostField;
use fieldinv_core::{DisplacementField, Geometry, Grid, GridIndex, Transformation, Unit};
use fieldinv_inversion::{invert, invert_vector_field, InversionConfig};

type Backend = NdArray<f32>;

/// `T_x = a·sin(2πy/L)`, `T_y = a·sin(2πx/L)`.
fn sine_field_2d(size: [usize; 2], amplitude: f32, period: f32) -> HostField<2> {
    let grid = Grid::new(size).unwrap();
    let mut values = Vec::with_capacity(grid.len() * 2);
    for k in 0..grid.len() {
        let [x, y] = grid.unflatten(k).0;
        values.push(amplitude * (2.0 * PI * y as f32 / period).sin());
        values.push(amplitude * (2.0 * PI * x as f32 / period).sin());
    }
    HostField::new(grid, values).unwrap()
}

/// Cyclic 3D version: x depends on y, y on z, z on x.
fn sine_field_3d(size: [usize; 3], amplitude: f32, period: f32) -> HostField<3> {
    let grid = Grid::new(size).unwrap();
    let mut values = Vec::with_capacity(grid.len() * 3);
    for k in 0..grid.len() {
        let [x, y, z] = grid.unflatten(k).0;
        values.push(amplitude * (2.0 * PI * y as f32 / period).sin());
        values.push(amplitude * (2.0 * PI * z as f32 / period).sin());
        values.push(amplitude * (2.0 * PI * x as f32 / period).sin());
    }
    HostField::new(grid, values).unwrap()
}

/// `|I(y) + T(y + I(y))|₁` at inverse voxel `index`.
fn round_trip_error<const D: usize>(forward: &HostField<D>, inverse: &HostField<D>, index: &GridIndex<D>) -> f64 {
    let offset = inverse.grid().flatten(index);
    let estimate = inverse.vector(offset);
    let mut p = index.to_coords();
    for a in 0..D {
        p[a] += estimate[a];
    }
    let stencil = LinearInterpolator::new().stencil(forward.grid(), &p);
    let t = forward.sample(&stencil);
    (0..D).map(|a| (estimate[a] + t[a]).abs()).sum()
}

fn interior<const D: usize>(grid: &Grid<D>, margin: usize) -> Vec<GridIndex<D>> {
    let size = grid.size();
    grid.indices(0, grid.len() - 1)
        .filter(|index| (0..D).all(|a| index.0[a] >= margin && index.0[a] + margin < size[a]))
        .collect()
}

#[test]
fn test_round_trip_2d() {
    let device = Default::default();
    let host = sine_field_2d([32, 32], 1.0, 32.0);
    let forward = DisplacementField::<Backend, 2>::from_host(&host, Geometry::identity(), Unit::Voxel, &device).unwrap();
    let config = InversionConfig::default().with_max_iterations(20);

    let (inverse, report) = invert_vector_field(&forward, &forward, &config).unwrap();
    assert_eq!(inverse.unit(), Unit::Voxel);
    assert_eq!(report.voxel_count, 32 * 32);
    assert_eq!(report.singular_count, 0);

    let inverse_host = inverse.to_host().unwrap();
    for index in interior(host.grid(), 4) {
        let error = round_trip_error(&host, &inverse_host, &index);
        assert!(
            error <= config.error_max + 1e-4,
            "round trip error {} at {:?} exceeds {}",
            error,
            index,
            config.error_max
        );
    }
}

#[test]
fn test_round_trip_3d() {
    let device = Default::default();
    let host = sine_field_3d([16, 16, 16], 0.5, 16.0);
    let forward = DisplacementField::<Backend, 3>::from_host(&host, Geometry::identity(), Unit::Voxel, &device).unwrap();
    let config = InversionConfig::default().with_max_iterations(20);

    let (inverse, report) = invert_vector_field(&forward, &forward, &config).unwrap();
    assert_eq!(report.voxel_count, 16 * 16 * 16);

    let inverse_host = inverse.to_host().unwrap();
    for index in interior(host.grid(), 4) {
        let error = round_trip_error(&host, &inverse_host, &index);
        assert!(error <= config.error_max + 1e-4, "round trip error {} at {:?}", error, index);
    }
}

#[test]
fn test_identity_law() {
    let device = Default::default();
    let forward: Transformation<Backend, 2> =
        DisplacementField::zeros([12, 10], Geometry::identity(), Unit::Voxel, &device).unwrap().into();
    let mut output: Transformation<Backend, 2> =
        DisplacementField::zeros([12, 10], Geometry::identity(), Unit::Voxel, &device).unwrap().into();

    let report = invert(&forward, &mut output, &InversionConfig::default().with_error_mask()).unwrap();
    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.evaluation_count, report.voxel_count);
    assert_eq!(report.error_mask.as_ref().map(|m| m.flagged_count()), Some(0));

    let inverse = output.as_vector_field().unwrap().to_host().unwrap();
    assert!(inverse.values().iter().all(|&v| v == 0.0));
}

#[test]
fn test_inverse_on_a_different_grid() {
    let device = Default::default();
    let host = sine_field_2d([32, 32], 1.0, 32.0);
    let forward = DisplacementField::<Backend, 2>::from_host(&host, Geometry::identity(), Unit::Voxel, &device).unwrap();
    let template = DisplacementField::<Backend, 2>::zeros([24, 28], Geometry::identity(), Unit::Voxel, &device).unwrap();
    let config = InversionConfig::default().with_max_iterations(20);

    let (inverse, report) = invert_vector_field(&forward, &template, &config).unwrap();
    assert_eq!(inverse.size(), [24, 28]);
    assert_eq!(report.voxel_count, 24 * 28);

    let inverse_host = inverse.to_host().unwrap();
    for index in interior(inverse_host.grid(), 4) {
        let error = round_trip_error(&host, &inverse_host, &index);
        assert!(error <= config.error_max + 1e-4, "round trip error {} at {:?}", error, index);
    }
}

#[test]
fn test_worker_count_does_not_change_result() {
    let device = Default::default();
    let host = sine_field_2d([24, 20], 1.0, 16.0);
    let forward = DisplacementField::<Backend, 2>::from_host(&host, Geometry::identity(), Unit::Voxel, &device).unwrap();

    let run = |workers: usize| {
        let config = InversionConfig::default().with_error_mask().with_workers(workers);
        let (inverse, report) = invert_vector_field(&forward, &forward, &config).unwrap();
        (inverse.to_host().unwrap(), report)
    };

    let (single, single_report) = run(1);
    for workers in [2, 3, 7] {
        let (parallel, parallel_report) = run(workers);
        assert_eq!(single.values(), parallel.values(), "fields differ with {} workers", workers);
        assert_eq!(single_report, parallel_report, "reports differ with {} workers", workers);
    }
}
