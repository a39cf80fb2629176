//! Linear interpolation (bilinear for 2D, trilinear for 3D).

use super::trait_::{Interpolator, Stencil};
use crate::image::Grid;

/// Linear interpolator with a clamped sampling window.
///
/// Per axis the lower corner is clamped to `[0, dim − 2]` before the
/// fractional weight is computed, so coordinates outside the grid take the
/// value of the nearest border cell and nothing is extrapolated. An axis of
/// length one always samples index 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

/// Lower corner, upper corner and fractional weight along one axis.
fn axis_window(x: f64, dim: usize) -> (usize, usize, f64) {
    if dim < 2 {
        return (0, 0, 0.0);
    }
    // Also catches NaN.
    if !(x >= 0.0) {
        return (0, 1, 0.0);
    }
    let ix = x.floor();
    if ix >= (dim - 1) as f64 {
        return (dim - 2, dim - 1, 1.0);
    }
    let i = ix as usize;
    (i, i + 1, x - ix)
}

impl Interpolator for LinearInterpolator {
    fn stencil<const D: usize>(&self, grid: &Grid<D>, point: &[f64; D]) -> Stencil {
        let size = grid.size();
        let strides = grid.strides();
        let mut windows = [(0usize, 0usize, 0.0f64); D];
        for a in 0..D {
            windows[a] = axis_window(point[a], size[a]);
        }

        let mut stencil = Stencil::new();
        for corner in 0..(1usize << D) {
            let mut offset = 0;
            let mut weight = 1.0;
            for (a, &(lo, hi, frac)) in windows.iter().enumerate() {
                if corner & (1 << a) == 0 {
                    offset += lo * strides[a];
                    weight *= 1.0 - frac;
                } else {
                    offset += hi * strides[a];
                    weight *= frac;
                }
            }
            stencil.push(offset, weight);
        }
        stencil
    }
}
