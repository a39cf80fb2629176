//! Interpolator trait for sampling values at continuous coordinates.

use crate::image::Grid;

/// Maximum number of taps of a stencil (trilinear).
pub const MAX_TAPS: usize = 8;

/// Weighted buffer offsets resolved for one continuous coordinate.
#[derive(Debug, Clone, Copy)]
pub struct Stencil {
    taps: [(usize, f64); MAX_TAPS],
    len: usize,
}

impl Stencil {
    pub fn new() -> Self {
        Self {
            taps: [(0, 0.0); MAX_TAPS],
            len: 0,
        }
    }

    pub fn push(&mut self, offset: usize, weight: f64) {
        self.taps[self.len] = (offset, weight);
        self.len += 1;
    }

    /// `(offset, weight)` pairs, including zero-weight taps.
    pub fn taps(&self) -> &[(usize, f64)] {
        &self.taps[..self.len]
    }

    /// Offsets of the taps that carry a non-zero weight.
    pub fn contributing(&self) -> impl Iterator<Item = usize> + '_ {
        self.taps().iter().filter(|(_, w)| *w != 0.0).map(|(o, _)| *o)
    }

    /// Weighted sum over a scalar buffer.
    pub fn apply(&self, values: &[f32]) -> f64 {
        self.taps().iter().map(|&(o, w)| w * values[o] as f64).sum()
    }

    /// Weighted sum over an interleaved buffer holding `stride` values per
    /// voxel, reading component `component`.
    pub fn apply_strided(&self, values: &[f32], stride: usize, component: usize) -> f64 {
        self.taps()
            .iter()
            .map(|&(o, w)| w * values[o * stride + component] as f64)
            .sum()
    }
}

impl Default for Stencil {
    fn default() -> Self {
        Self::new()
    }
}

/// Interpolator trait for sampling host buffers at continuous coordinates.
///
/// Coordinates are continuous voxel indices, x first.
pub trait Interpolator {
    /// Resolve the taps used to sample `grid` at `point`.
    fn stencil<const D: usize>(&self, grid: &Grid<D>, point: &[f64; D]) -> Stencil;

    /// Sample a scalar buffer laid out on `grid`.
    fn sample<const D: usize>(&self, values: &[f32], grid: &Grid<D>, point: &[f64; D]) -> f64 {
        self.stencil(grid, point).apply(values)
    }
}
