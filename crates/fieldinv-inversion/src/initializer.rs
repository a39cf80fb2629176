//! Starting estimates for the Newton pass.
//!
//! Forward splatting pushes `−T(p)` onto the inverse-grid cells around
//! `p + T(p)` with linear weights, smooths both the accumulated field and
//! the weights, and normalises. Cells whose smoothed weight does not exceed
//! [`HOLE_WEIGHT`] are holes and start at zero.

use burn::tensor::backend::Backend;
use fieldinv_core::filter::SeparableFilter;
use fieldinv_core::transform::HostField;
use fieldinv_core::{Geometry, Grid, Image};

use crate::buffer::try_filled;
use crate::error::Result;
use crate::mapping::GridMapping;

/// Smoothed weight at or below which a cell is left at zero.
pub const HOLE_WEIGHT: f64 = 0.01;

/// The all-zero starting estimate.
pub fn zero_estimate<const D: usize>(grid: Grid<D>) -> Result<HostField<D>> {
    let values = try_filled(grid.len() * D, 0.0f32, "inverse estimate")?;
    Ok(HostField::new(grid, values)?)
}

/// Splat taps along one axis: up to two `(index, weight)` pairs.
fn splat_window(x: f64, dim: usize) -> Option<([(usize, f64); 2], usize)> {
    // Also rejects NaN.
    if !(x >= -1.0) {
        return None;
    }
    if x < 0.0 {
        return Some(([(0, 1.0), (0, 0.0)], 1));
    }
    let floor = x.floor();
    let d = x - floor;
    let idx = floor as usize;
    if idx + 1 < dim {
        Some(([(idx, 1.0 - d), (idx + 1, d)], 2))
    } else if idx + 1 == dim {
        Some(([(idx, 1.0), (0, 0.0)], 1))
    } else {
        None
    }
}

/// Initial inverse estimate by forward splatting.
///
/// `forward` is the host copy of `T` on its own grid; the result lives on
/// `inverse_grid`. Smoothing uses `sigma` voxels of the inverse grid and is
/// skipped when `sigma` is zero.
pub fn forward_splatting<B: Backend, const D: usize>(
    forward: &HostField<D>,
    mapping: &GridMapping<D>,
    inverse_grid: Grid<D>,
    inverse_geometry: Geometry<D>,
    sigma: f64,
    device: &B::Device,
) -> Result<HostField<D>> {
    let n = inverse_grid.len();
    let size = inverse_grid.size();
    let strides = inverse_grid.strides();
    let mut accumulated = try_filled(n * D, 0.0f64, "splatted field")?;
    let mut weights = try_filled(n, 0.0f64, "splat weights")?;

    let forward_grid = forward.grid();
    for (k, index) in forward_grid.indices(0, forward_grid.len() - 1).enumerate() {
        let t = forward.vector(k);
        let q = mapping.forward_to_inverse(&index.to_coords(), &t);

        let mut windows = [([(0usize, 0.0f64); 2], 0usize); D];
        let mut outside = false;
        for a in 0..D {
            match splat_window(q[a], size[a]) {
                Some(window) => windows[a] = window,
                None => {
                    outside = true;
                    break;
                }
            }
        }
        if outside {
            continue;
        }

        let corners: usize = windows.iter().map(|(_, count)| count).product();
        for corner in 0..corners {
            let mut rest = corner;
            let mut offset = 0;
            let mut weight = 1.0;
            for (a, (taps, count)) in windows.iter().enumerate() {
                let (i, w) = taps[rest % count];
                rest /= count;
                offset += i * strides[a];
                weight *= w;
            }
            for a in 0..D {
                accumulated[offset * D + a] -= weight * t[a];
            }
            weights[offset] += weight;
        }
    }

    if sigma > 0.0 {
        let filter = SeparableFilter::<B>::new();
        let smooth = |values: Vec<f32>| -> Result<Vec<f32>> {
            let image = Image::<B, D>::from_vec(values, size, inverse_geometry, device)?;
            Ok(filter.smooth(&image, sigma).to_vec()?)
        };
        for a in 0..D {
            let component = accumulated.iter().skip(a).step_by(D).map(|&v| v as f32).collect();
            for (k, v) in smooth(component)?.into_iter().enumerate() {
                accumulated[k * D + a] = v as f64;
            }
        }
        let smoothed = smooth(weights.iter().map(|&w| w as f32).collect())?;
        for (w, s) in weights.iter_mut().zip(smoothed) {
            *w = s as f64;
        }
    }

    let mut values = try_filled(n * D, 0.0f32, "inverse estimate")?;
    for (k, &w) in weights.iter().enumerate() {
        if w > HOLE_WEIGHT {
            for a in 0..D {
                values[k * D + a] = (accumulated[k * D + a] / w) as f32;
            }
        }
    }
    Ok(HostField::new(inverse_grid, values)?)
}
